// src/manager/configure.rs

//! SmartConfigure: bring an unpacked package to the configured state

use super::Driver;
use crate::error::{Error, Result};
use crate::graph::{DepKind, DependencyGroup, MultiArch, PackageId, PkgState};
use crate::observer::OrderEvent;
use crate::order::OrderFlags;
use tracing::debug;

impl Driver<'_> {
    /// Configure a package after making its Depends configurable
    ///
    /// The order list normally has dependencies unpacked already; loops are
    /// the exception, so every Depends group is re-checked here. Dependencies
    /// that are unpacked get configured first, and one that is not even
    /// unpacked is force-unpacked to break the loop.
    pub(super) fn smart_configure(&mut self, pkg: PackageId) -> Result<()> {
        let graph = self.graph;
        let name = self.name(pkg);
        self.emit(OrderEvent::ConfigureStart { package: &name });

        let Some(inst) = self.cache.install_version(pkg) else {
            return Err(Error::operation("configure", &name, "no version to configure"));
        };
        let version = graph.version(inst);

        for group in &version.groups {
            if group.kind == DepKind::Depends {
                self.configure_depends(pkg, &name, group)?;
            }
        }

        if self.list.is_flag(pkg, OrderFlags::CONFIGURED) {
            return Err(Error::AlreadyConfigured { package: name });
        }

        if self.config.configure.runs_configure() {
            self.installer.configure(graph.package(pkg))?;
        }
        self.list.set_state(pkg, OrderFlags::CONFIGURED);

        if version.multi_arch == MultiArch::Same {
            let reinstall = self.cache.state(pkg).reinstall;
            for &sibling in graph.group_members(pkg) {
                if sibling == pkg || !self.list.is_flag(sibling, OrderFlags::UNPACKED) {
                    continue;
                }
                let Some(sibling_inst) = self.cache.install_version(sibling) else {
                    continue;
                };
                if graph.package(sibling).current_version == Some(sibling_inst) && !reinstall {
                    continue;
                }
                if let Err(err) = self.smart_configure(sibling) {
                    self.warn(sibling, &format!("multi-arch sibling not configured: {err}"));
                }
            }
        }

        Ok(())
    }

    /// Make one Depends OR-group hold before configuring `pkg`
    fn configure_depends(&mut self, pkg: PackageId, name: &str, group: &DependencyGroup) -> Result<()> {
        let graph = self.graph;
        let mut candidate = None;

        for &dep in &group.alternatives {
            for ver in graph.all_targets(dep) {
                let other = graph.version(ver).package;
                let package = graph.package(other);

                // Installed, settled, and left alone by this run
                if package.current_version == Some(ver)
                    && self.list.is_now(other)
                    && !self.list.is_flag(other, OrderFlags::REMOVED)
                    && package.state() == PkgState::NeedsNothing
                {
                    return Ok(());
                }

                if self.cache.install_version(other) != Some(ver) {
                    continue;
                }

                if self.list.is_flag(other, OrderFlags::UNPACKED) {
                    if self.list.is_flag(other, OrderFlags::LOOP) {
                        return Ok(());
                    }
                    self.list.flag(pkg, OrderFlags::LOOP);
                    match self.smart_configure(other) {
                        Ok(()) => return Ok(()),
                        Err(err) => debug!("Dependency {} not configured: {}", self.name(other), err),
                    }
                } else if self.list.is_flag(other, OrderFlags::CONFIGURED) {
                    return Ok(());
                } else if candidate.is_none()
                    && other != pkg
                    && !self.list.is_flag(other, OrderFlags::LOOP)
                {
                    candidate = Some(other);
                }
            }
        }

        // Nothing usable is unpacked yet: unpack the first candidate to break the loop
        if let Some(other) = candidate {
            let other_name = self.name(other);
            self.emit(OrderEvent::LoopBreakUnpack {
                package: name,
                target: &other_name,
            });
            self.list.flag(pkg, OrderFlags::LOOP);
            self.smart_unpack(other, false)?;
            return Ok(());
        }

        if self.config.debug {
            self.warn(pkg, "could not satisfy dependencies before configuring");
        } else {
            debug!("Could not satisfy dependencies for {}", name);
        }
        Ok(())
    }
}
