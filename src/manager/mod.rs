// src/manager/mod.rs

//! Transaction ordering and execution
//!
//! [`PackageManager`] turns the decisions held in a [`DepCache`] into a
//! sequence of unpack, configure, and remove operations. It owns the order
//! list and the archive locations. For the duration of a run it hands them
//! to a [`Driver`], which carries the mutually recursive unpack, configure,
//! and remove drivers that break cycles on the fly.
//!
//! Flow of [`PackageManager::order_install`]:
//! 1. Build the order list (once per set of decisions) and mark immediate
//!    packages
//! 2. Sort it with the configured [`OrderSorter`]
//! 3. Walk it, dispatching each pending package to unpack or remove
//! 4. Configure everything still unpacked and check nothing was left behind

mod configure;
mod remove;
mod unpack;

use crate::cache::DepCache;
use crate::config::{ConfigureMode, ManagerConfig};
use crate::error::{Error, Result};
use crate::graph::{DepKind, DependencyGraph, PackageId, PkgState, VersionId};
use crate::installer::Installer;
use crate::observer::{LogObserver, OrderEvent, OrderObserver};
use crate::order::{OrderFlags, OrderList, OrderSorter, TopoSorter};
use crate::problem::ProblemResolver;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Outcome of [`PackageManager::order_install`]
#[derive(Debug)]
pub enum OrderResult {
    /// Every listed package reached its final state
    Completed,
    /// Stopped at a missing archive after making progress; re-run once it is supplied
    Incomplete,
    /// Fatal error, nothing further was attempted
    Failed(Error),
}

impl OrderResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, OrderResult::Completed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            OrderResult::Completed => "completed",
            OrderResult::Incomplete => "incomplete",
            OrderResult::Failed(_) => "failed",
        }
    }
}

/// An archive the caller has to locate before the run can complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveRequest {
    pub package: PackageId,
    pub version: VersionId,
}

/// Orders and executes the changes decided in a resolution cache
pub struct PackageManager<I: Installer> {
    cache: DepCache,
    config: ManagerConfig,
    installer: I,
    sorter: Box<dyn OrderSorter>,
    observer: Box<dyn OrderObserver>,
    archives: HashMap<PackageId, PathBuf>,
    list: Option<OrderList>,
}

impl<I: Installer> PackageManager<I> {
    pub fn new(cache: DepCache, config: ManagerConfig, installer: I) -> Self {
        Self {
            cache,
            config,
            installer,
            sorter: Box::new(TopoSorter::new()),
            observer: Box::new(LogObserver::new()),
            archives: HashMap::new(),
            list: None,
        }
    }

    /// Replace the ordering sub-sort
    pub fn with_sorter(mut self, sorter: Box<dyn OrderSorter>) -> Self {
        self.sorter = sorter;
        self
    }

    /// Replace the decision observer
    pub fn with_observer(mut self, observer: Box<dyn OrderObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn cache(&self) -> &DepCache {
        &self.cache
    }

    /// Mutable cache access; discards the order list, which would go stale
    pub fn cache_mut(&mut self) -> &mut DepCache {
        self.list = None;
        &mut self.cache
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn installer(&self) -> &I {
        &self.installer
    }

    pub fn installer_mut(&mut self) -> &mut I {
        &mut self.installer
    }

    /// The current order list, if one has been built
    pub fn order_list(&self) -> Option<&OrderList> {
        self.list.as_ref()
    }

    /// Record where the archive of a package was found
    pub fn set_archive(&mut self, package: PackageId, path: impl Into<PathBuf>) {
        self.archives.insert(package, path.into());
    }

    pub fn archive(&self, package: PackageId) -> Option<&Path> {
        self.archives.get(&package).map(PathBuf::as_path)
    }

    /// Build the order list unless one already exists
    pub fn create_order_list(&mut self) -> &OrderList {
        self.list.get_or_insert_with(|| {
            build_order_list(&self.cache, &self.config, self.observer.as_mut())
        })
    }

    /// The package needs an archive it does not have
    pub fn is_missing(&self, package: PackageId) -> bool {
        is_missing(&self.cache, &self.archives, package)
    }

    /// Run the whole transaction
    pub fn order_install(&mut self) -> OrderResult {
        info!("Beginning to order");
        let mut driver = self.driver();
        match driver.order_and_walk() {
            Ok(result) => {
                info!("Transaction {}", result.as_str());
                result
            }
            Err(err) => {
                error!("Transaction failed: {}", err);
                OrderResult::Failed(err)
            }
        }
    }

    /// Configure every package left unpacked
    pub fn configure_all(&mut self) -> Result<()> {
        self.driver().configure_all()
    }

    /// Archives to fetch, in order
    pub fn archive_requests(&mut self) -> Result<Vec<ArchiveRequest>> {
        let mut driver = self.driver();
        driver.order()?;

        let graph = driver.graph;
        let mut requests = Vec::new();
        for pkg in driver.list.iter() {
            let state = driver.cache.state(pkg);
            if state.delete() {
                continue;
            }
            if graph.package(pkg).state() == PkgState::NeedsConfigure && state.keep() {
                continue;
            }
            if !driver.list.is_now(pkg) {
                continue;
            }
            if let Some(version) = state.install_version {
                requests.push(ArchiveRequest {
                    package: pkg,
                    version,
                });
            }
        }
        Ok(requests)
    }

    /// Keep every package whose archive is missing, then repair the cache
    ///
    /// Discards the order list. Returns false when the repaired cache still
    /// has broken packages.
    pub fn fix_missing(&mut self, resolver: &mut dyn ProblemResolver) -> bool {
        let graph = self.cache.graph().clone();
        let mut bad = false;
        for pkg in graph.packages() {
            if !self.is_missing(pkg.id) {
                continue;
            }
            info!("Archive for {} is missing, keeping it", pkg.full_name());
            self.cache.mark_keep(pkg.id);
            bad = true;
        }

        self.list = None;
        if !bad {
            return true;
        }

        resolver.resolve_by_keep(&mut self.cache) && self.cache.broken_count() == 0
    }

    fn driver(&mut self) -> Driver<'_> {
        let list = self.list.get_or_insert_with(|| {
            build_order_list(&self.cache, &self.config, self.observer.as_mut())
        });
        Driver {
            graph: self.cache.graph().as_ref(),
            cache: &self.cache,
            config: &self.config,
            archives: &self.archives,
            list,
            installer: &mut self.installer,
            sorter: self.sorter.as_mut(),
            observer: self.observer.as_mut(),
            unpacking: Vec::new(),
        }
    }
}

/// Collect the packages that change state and mark immediate ones
fn build_order_list(
    cache: &DepCache,
    config: &ManagerConfig,
    observer: &mut dyn OrderObserver,
) -> OrderList {
    let graph = cache.graph();
    let mut list = OrderList::new(graph.package_count());

    if config.immediate_configure_all {
        debug!("Marking every package immediate");
    }

    for pkg in graph.packages() {
        if pkg.versions.is_empty() {
            continue;
        }

        if ((pkg.essential || pkg.important) && config.immediate_configure)
            || config.immediate_configure_all
        {
            list.flag(pkg.id, OrderFlags::IMMEDIATE);
            if !config.immediate_configure_all {
                let name = pkg.full_name();
                observer.on_event(&OrderEvent::ImmediateMarked { package: &name });
                immediate_add(graph, cache, &mut list, observer, pkg.id, true, 0);
                immediate_add(graph, cache, &mut list, observer, pkg.id, false, 0);
            }
        }

        let state = cache.state(pkg.id);
        let unchanged = state.keep() || state.install_version == pkg.current_version;
        if unchanged
            && pkg.state() == PkgState::NeedsNothing
            && !state.reinstall
            && (pkg.is_purged() || !state.delete() || !state.purge)
        {
            continue;
        }

        list.push(pkg.id);
    }

    info!("Order list holds {} package(s)", list.len());
    list
}

/// Flag the Depends/PreDepends closure of a package immediate
///
/// Follows either the install version or the current version; stops at
/// packages already flagged, which bounds the walk on cyclic graphs.
fn immediate_add(
    graph: &DependencyGraph,
    cache: &DepCache,
    list: &mut OrderList,
    observer: &mut dyn OrderObserver,
    package: PackageId,
    use_install: bool,
    depth: usize,
) {
    let version = if use_install {
        cache.install_version(package)
    } else {
        graph.package(package).current_version
    };
    let Some(version) = version else {
        return;
    };

    for group in &graph.version(version).groups {
        if !matches!(group.kind, DepKind::Depends | DepKind::PreDepends) {
            continue;
        }
        for &dep in &group.alternatives {
            let target = graph.dependency(dep).target;
            if list.is_flag(target, OrderFlags::IMMEDIATE) {
                continue;
            }
            let name = graph.package(target).full_name();
            debug!(
                "{}Adding immediate flag to {} because of {} of {}",
                "  ".repeat(depth),
                name,
                group.kind,
                graph.package(package).full_name()
            );
            list.flag(target, OrderFlags::IMMEDIATE);
            observer.on_event(&OrderEvent::ImmediateMarked { package: &name });
            immediate_add(graph, cache, list, observer, target, use_install, depth + 1);
        }
    }
}

fn is_missing(cache: &DepCache, archives: &HashMap<PackageId, PathBuf>, package: PackageId) -> bool {
    let state = cache.state(package);
    if state.delete() {
        return false;
    }

    // Configure-only packages need no archive
    let needs = cache.graph().package(package).state();
    if matches!(needs, PkgState::NeedsConfigure | PkgState::NeedsNothing) && state.keep() {
        return false;
    }

    archives
        .get(&package)
        .is_none_or(|path| path.as_os_str().is_empty())
}

/// Borrowed state for one pass over the order list
///
/// Every driver takes the order list through this one exclusive borrow, so
/// the recursion between unpack, configure, and remove shares its flags
/// without aliasing.
pub(crate) struct Driver<'a> {
    graph: &'a DependencyGraph,
    cache: &'a DepCache,
    config: &'a ManagerConfig,
    archives: &'a HashMap<PackageId, PathBuf>,
    list: &'a mut OrderList,
    installer: &'a mut dyn Installer,
    sorter: &'a mut dyn OrderSorter,
    observer: &'a mut dyn OrderObserver,
    /// Packages whose SmartUnpack is on the call stack
    unpacking: Vec<PackageId>,
}

impl Driver<'_> {
    fn name(&self, package: PackageId) -> String {
        self.graph.package(package).full_name()
    }

    fn emit(&mut self, event: OrderEvent<'_>) {
        self.observer.on_event(&event);
    }

    /// Log a recoverable problem and report it to the observer
    fn warn(&mut self, package: PackageId, message: &str) {
        let name = self.name(package);
        warn!("{}: {}", name, message);
        self.emit(OrderEvent::Warning {
            package: &name,
            message,
        });
    }

    /// Sort the list with the full or critical-only order
    fn order(&mut self) -> Result<()> {
        let sorted = if self.config.unpack_all {
            self.sorter.order_unpack(self.cache, self.list.packages())
        } else {
            self.sorter.order_critical(self.cache, self.list.packages())
        };

        let order = sorted.map_err(|err| match err {
            Error::Ordering(_) => err,
            other => Error::Ordering(other.to_string()),
        })?;
        self.list.set_order(order);
        debug!("Done ordering");
        Ok(())
    }

    fn order_and_walk(&mut self) -> Result<OrderResult> {
        self.order()?;

        let mut done_something = false;
        let sequence: Vec<PackageId> = self.list.iter().collect();
        for pkg in sequence {
            if !self.list.is_now(pkg) {
                if !self.list.is_flag(pkg, OrderFlags::CONFIGURED) && self.config.immediate_configure
                {
                    if let Err(err) = self.smart_configure(pkg) {
                        debug!("Could not configure {}: {}", self.name(pkg), err);
                        if self.config.debug {
                            self.warn(pkg, &format!("could not configure: {err}"));
                        }
                    }
                } else {
                    let name = self.name(pkg);
                    self.emit(OrderEvent::Skipped { package: &name });
                }
                continue;
            }

            if is_missing(self.cache, self.archives, pkg) {
                let name = self.name(pkg);
                self.list.flag(pkg, OrderFlags::MISSING);
                self.emit(OrderEvent::MissingArchive { package: &name });
                if !done_something {
                    return Err(Error::MediaSwap { package: name });
                }
                info!("Sequence completed at {}", name);
                return Ok(OrderResult::Incomplete);
            }

            let state = *self.cache.state(pkg);
            if state.keep()
                && self.graph.package(pkg).state() == PkgState::NeedsNothing
                && !state.reinstall
            {
                return Err(Error::KeptPackage {
                    package: self.name(pkg),
                });
            }

            if state.delete() {
                self.smart_remove(pkg)?;
            } else {
                let immediate = self.list.is_flag(pkg, OrderFlags::IMMEDIATE);
                self.smart_unpack(pkg, immediate)?;
            }
            done_something = true;

            if self.config.immediate_configure_all
                && let Err(err) = self.configure_all()
            {
                self.warn(pkg, &format!("configure sweep failed: {err}"));
            }
        }

        self.configure_all()?;

        if let Some(pkg) = self
            .list
            .iter()
            .find(|&pkg| !self.list.is_flag(pkg, OrderFlags::CONFIGURED))
        {
            return Err(Error::Unconfigured {
                package: self.name(pkg),
            });
        }

        Ok(OrderResult::Completed)
    }

    /// Configure everything unpacked but not yet configured
    fn configure_all(&mut self) -> Result<()> {
        let unpacked: Vec<PackageId> = self
            .list
            .iter()
            .filter(|&pkg| self.list.is_flag(pkg, OrderFlags::UNPACKED))
            .collect();
        if unpacked.is_empty() {
            return Ok(());
        }

        let order = self.sorter.order_configure(self.cache, &unpacked)?;
        let run = self.config.configure == ConfigureMode::All;

        for pkg in order {
            // A nested SmartConfigure may already have handled it
            if !self.list.is_flag(pkg, OrderFlags::UNPACKED) {
                continue;
            }
            if run && let Err(err) = self.smart_configure(pkg) {
                warn!("Configuring {} failed: {}", self.name(pkg), err);
                return Err(Error::Unconfigured {
                    package: self.name(pkg),
                });
            }
            self.list.set_state(pkg, OrderFlags::CONFIGURED);
        }

        Ok(())
    }
}
