// src/cache.rs

//! Resolution cache: the decided action for every package
//!
//! The cache records what the policy layer decided for each package (keep,
//! install a version, delete, delete and purge) on top of a shared,
//! read-only [`DependencyGraph`]. The ordering engine only reads it; the
//! keep/install/delete API exists for the policy layer and for
//! `FixMissing`, which downgrades missing packages to keep.

use crate::graph::{DependencyGraph, PackageId, VersionId};
use std::sync::Arc;
use tracing::debug;

/// Decided action mode for a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Keep,
    Delete,
    Install,
}

/// Decided action for one package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateEntry {
    pub mode: Mode,
    /// Version the package will have after the run (None when deleted)
    pub install_version: Option<VersionId>,
    /// Reinstall the current version even though nothing changes
    pub reinstall: bool,
    /// Delete configuration files too
    pub purge: bool,
}

impl StateEntry {
    pub fn keep(&self) -> bool {
        self.mode == Mode::Keep
    }

    pub fn delete(&self) -> bool {
        self.mode == Mode::Delete
    }

    pub fn install(&self) -> bool {
        self.mode == Mode::Install
    }
}

/// Per-package decided actions over a dependency graph
#[derive(Debug, Clone)]
pub struct DepCache {
    graph: Arc<DependencyGraph>,
    states: Vec<StateEntry>,
}

impl DepCache {
    /// Create a cache where every package keeps its current version
    pub fn new(graph: Arc<DependencyGraph>) -> Self {
        let states = graph
            .packages()
            .map(|pkg| StateEntry {
                install_version: pkg.current_version,
                ..StateEntry::default()
            })
            .collect();
        Self { graph, states }
    }

    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    pub fn state(&self, package: PackageId) -> &StateEntry {
        &self.states[package.index()]
    }

    pub fn install_version(&self, package: PackageId) -> Option<VersionId> {
        self.states[package.index()].install_version
    }

    /// Decide to install (or upgrade/downgrade to) a version
    pub fn mark_install(&mut self, package: PackageId, version: VersionId) {
        let current = self.graph.package(package).current_version;
        let entry = &mut self.states[package.index()];
        entry.install_version = Some(version);
        entry.purge = false;
        entry.mode = if current == Some(version) {
            Mode::Keep
        } else {
            Mode::Install
        };
    }

    /// Decide to remove a package, optionally purging its configuration
    pub fn mark_delete(&mut self, package: PackageId, purge: bool) {
        let entry = &mut self.states[package.index()];
        entry.mode = Mode::Delete;
        entry.install_version = None;
        entry.purge = purge;
    }

    /// Discard any pending change for a package
    pub fn mark_keep(&mut self, package: PackageId) {
        let current = self.graph.package(package).current_version;
        let entry = &mut self.states[package.index()];
        entry.mode = Mode::Keep;
        entry.install_version = current;
        entry.purge = false;
        entry.reinstall = false;
    }

    pub fn set_reinstall(&mut self, package: PackageId, reinstall: bool) {
        self.states[package.index()].reinstall = reinstall;
    }

    /// Would the planned state leave this package with unmet relations
    ///
    /// A package is broken when its install version has a Depends or
    /// PreDepends group no planned version satisfies, or when a planned
    /// version is the target of one of its Conflicts/Obsoletes/Breaks edges.
    pub fn is_broken(&self, package: PackageId) -> bool {
        let Some(inst) = self.install_version(package) else {
            return false;
        };

        for group in &self.graph.version(inst).groups {
            if group.kind.is_positive() {
                let satisfied = group.alternatives.iter().any(|&dep| {
                    self.graph
                        .all_targets(dep)
                        .into_iter()
                        .any(|v| self.planned(v))
                });
                if !satisfied {
                    debug!(
                        "{} has an unsatisfied {} group",
                        self.graph.describe_version(inst),
                        group.kind
                    );
                    return true;
                }
            } else {
                for &dep in &group.alternatives {
                    if self
                        .graph
                        .all_targets(dep)
                        .into_iter()
                        .any(|v| self.planned(v))
                    {
                        debug!(
                            "{} {} a planned package",
                            self.graph.describe_version(inst),
                            group.kind
                        );
                        return true;
                    }
                }
            }
        }

        false
    }

    /// Number of packages that would be broken after the planned changes
    pub fn broken_count(&self) -> usize {
        self.graph
            .packages()
            .filter(|pkg| self.is_broken(pkg.id))
            .count()
    }

    /// Packages whose planned version is targeted by a negative edge of `version`
    pub(crate) fn negative_hits(&self, version: VersionId) -> Vec<PackageId> {
        let mut hits = Vec::new();
        for group in &self.graph.version(version).groups {
            if !group.kind.is_negative() {
                continue;
            }
            for &dep in &group.alternatives {
                for target in self.graph.all_targets(dep) {
                    if self.planned(target) {
                        hits.push(self.graph.version(target).package);
                    }
                }
            }
        }
        hits
    }

    /// The version is what its package will have after the run
    fn planned(&self, version: VersionId) -> bool {
        let pkg = self.graph.version(version).package;
        self.install_version(pkg) == Some(version)
    }

    /// Number of packages the cache knows about
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CurrentState, DepKind};
    use crate::version::{DebVersion, VersionConstraint};

    fn ver(s: &str) -> DebVersion {
        DebVersion::parse(s).unwrap()
    }

    fn two_package_graph() -> (Arc<DependencyGraph>, PackageId, PackageId, VersionId, VersionId) {
        let mut graph = DependencyGraph::new();
        let app = graph.add_package("app", "amd64");
        let lib = graph.add_package("lib", "amd64");
        let app_v = graph.add_version(app, ver("1.0"));
        let lib_v = graph.add_version(lib, ver("1.0"));
        graph
            .add_group(app_v, DepKind::Depends, vec![(lib, VersionConstraint::Any)])
            .unwrap();
        (Arc::new(graph), app, lib, app_v, lib_v)
    }

    #[test]
    fn test_new_cache_keeps_everything() {
        let (graph, app, _, _, _) = two_package_graph();
        let cache = DepCache::new(graph);
        assert!(cache.state(app).keep());
        assert_eq!(cache.install_version(app), None);
        assert_eq!(cache.broken_count(), 0);
    }

    #[test]
    fn test_missing_dependency_is_broken() {
        let (graph, app, lib, app_v, lib_v) = two_package_graph();
        let mut cache = DepCache::new(graph);
        cache.mark_install(app, app_v);
        assert!(cache.is_broken(app));
        assert_eq!(cache.broken_count(), 1);

        cache.mark_install(lib, lib_v);
        assert!(!cache.is_broken(app));
    }

    #[test]
    fn test_mark_install_of_current_is_keep() {
        let mut graph = DependencyGraph::new();
        let pkg = graph.add_package("pkg", "amd64");
        let v1 = graph.add_version(pkg, ver("1"));
        graph
            .set_current(pkg, Some(v1), CurrentState::Installed)
            .unwrap();
        let mut cache = DepCache::new(Arc::new(graph));
        cache.mark_install(pkg, v1);
        assert!(cache.state(pkg).keep());
    }

    #[test]
    fn test_delete_and_keep_roundtrip() {
        let mut graph = DependencyGraph::new();
        let pkg = graph.add_package("pkg", "amd64");
        let v1 = graph.add_version(pkg, ver("1"));
        graph
            .set_current(pkg, Some(v1), CurrentState::Installed)
            .unwrap();
        let mut cache = DepCache::new(Arc::new(graph));

        cache.mark_delete(pkg, true);
        assert!(cache.state(pkg).delete());
        assert!(cache.state(pkg).purge);
        assert_eq!(cache.install_version(pkg), None);

        cache.mark_keep(pkg);
        assert!(cache.state(pkg).keep());
        assert!(!cache.state(pkg).purge);
        assert_eq!(cache.install_version(pkg), Some(v1));
    }

    #[test]
    fn test_conflict_with_planned_package_is_broken() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_package("a", "amd64");
        let b = graph.add_package("b", "amd64");
        let a_v = graph.add_version(a, ver("1"));
        let b_v = graph.add_version(b, ver("1"));
        graph
            .add_group(a_v, DepKind::Conflicts, vec![(b, VersionConstraint::Any)])
            .unwrap();
        let mut cache = DepCache::new(Arc::new(graph));
        cache.mark_install(a, a_v);
        cache.mark_install(b, b_v);
        assert!(cache.is_broken(a));
        assert_eq!(cache.negative_hits(a_v), vec![b]);
    }
}
