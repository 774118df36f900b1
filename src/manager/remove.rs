// src/manager/remove.rs

//! Ordinary and early removal

use super::Driver;
use crate::error::{Error, Result};
use crate::graph::PackageId;
use crate::observer::OrderEvent;
use crate::order::OrderFlags;
use tracing::warn;

impl Driver<'_> {
    /// Remove a package ahead of its position to clear a conflict
    ///
    /// Returns `Ok(false)` when the package is not in the order list: it
    /// would never be reinstalled, so the caller cannot rely on removing it.
    /// Essential packages, and packages an essential package depends on,
    /// are only removed when loop breaking is forced.
    pub(super) fn early_remove(&mut self, pkg: PackageId) -> Result<bool> {
        if !self.list.is_now(pkg) || self.list.is_flag(pkg, OrderFlags::REMOVED) {
            return Ok(true);
        }
        if !self.list.is_flag(pkg, OrderFlags::IN_LIST) {
            return Ok(false);
        }

        let graph = self.graph;
        let package = graph.package(pkg);
        let essential = package.essential
            || (package.current_version.is_some()
                && graph.reverse_depends(pkg).iter().any(|&dep| {
                    let dep = graph.dependency(dep);
                    dep.kind.is_positive() && graph.package(graph.version(dep.parent).package).essential
                }));

        let name = package.full_name();
        if essential {
            if !self.config.force_loop_break {
                return Err(Error::EssentialRemoval { package: name });
            }
            warn!("Temporarily removing essential package {}", name);
        }

        self.emit(OrderEvent::EarlyRemove { package: &name });
        let result = self.smart_remove(pkg);
        if !self.cache.state(pkg).delete() {
            self.list.set_state(pkg, OrderFlags::REMOVED);
        }

        result.map(|()| true)
    }

    /// Remove a package that is still pending
    pub(super) fn smart_remove(&mut self, pkg: PackageId) -> Result<()> {
        if !self.list.is_now(pkg) {
            return Ok(());
        }

        self.list.set_state(pkg, OrderFlags::CONFIGURED);
        let purge = self.cache.state(pkg).purge;
        self.installer.remove(self.graph.package(pkg), purge)
    }
}
