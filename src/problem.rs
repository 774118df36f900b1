// src/problem.rs

//! Problem resolution by downgrading changes to keep
//!
//! Consulted only after archives turn out to be missing: once the missing
//! packages are forced back to keep, anything their absence breaks has to
//! be kept as well.

use crate::cache::DepCache;
use crate::graph::PackageId;
use tracing::{debug, info};

/// Repairs a resolution cache after decisions were reverted
pub trait ProblemResolver {
    /// Downgrade pending changes to keep until nothing is broken
    ///
    /// Returns true when the cache ends with zero broken packages.
    fn resolve_by_keep(&mut self, cache: &mut DepCache) -> bool;
}

/// Resolver that only ever reverts changes, never schedules new ones
#[derive(Debug, Default)]
pub struct KeepResolver {
    kept: Vec<PackageId>,
}

impl KeepResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Packages this resolver forced back to keep, in order
    pub fn kept(&self) -> &[PackageId] {
        &self.kept
    }

    fn keep(&mut self, cache: &mut DepCache, package: PackageId) -> bool {
        let state = cache.state(package);
        if state.keep() && !state.reinstall {
            return false;
        }
        debug!(
            "Keeping {} to resolve broken dependencies",
            cache.graph().package(package).full_name()
        );
        cache.mark_keep(package);
        self.kept.push(package);
        true
    }

    /// Revert whatever a kept-but-broken package relates to
    fn keep_related(&mut self, cache: &mut DepCache, package: PackageId) -> bool {
        let Some(inst) = cache.install_version(package) else {
            return false;
        };
        let graph = cache.graph().clone();
        let mut changed = false;

        for group in &graph.version(inst).groups {
            if group.kind.is_positive() {
                for &dep in &group.alternatives {
                    changed |= self.keep(cache, graph.dependency(dep).target);
                    for target in graph.all_targets(dep) {
                        changed |= self.keep(cache, graph.version(target).package);
                    }
                }
            }
        }

        for hit in cache.negative_hits(inst) {
            changed |= self.keep(cache, hit);
        }

        changed
    }
}

impl ProblemResolver for KeepResolver {
    fn resolve_by_keep(&mut self, cache: &mut DepCache) -> bool {
        let graph = cache.graph().clone();

        // Every pass turns at least one pending change into keep, so this terminates
        loop {
            let mut changed = false;
            for pkg in graph.packages() {
                if !cache.is_broken(pkg.id) {
                    continue;
                }
                if cache.state(pkg.id).keep() {
                    changed |= self.keep_related(cache, pkg.id);
                } else {
                    changed |= self.keep(cache, pkg.id);
                }
            }
            if !changed {
                break;
            }
        }

        let broken = cache.broken_count();
        info!(
            "Keep resolution reverted {} package(s), {} still broken",
            self.kept.len(),
            broken
        );
        broken == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CurrentState, DepKind, DependencyGraph};
    use crate::version::{DebVersion, VersionConstraint};
    use std::sync::Arc;

    fn ver(s: &str) -> DebVersion {
        DebVersion::parse(s).unwrap()
    }

    #[test]
    fn test_keeps_dependent_of_reverted_package() {
        let mut graph = DependencyGraph::new();
        let app = graph.add_package("app", "amd64");
        let lib = graph.add_package("lib", "amd64");
        let app_v = graph.add_version(app, ver("1"));
        let lib_v = graph.add_version(lib, ver("1"));
        graph
            .add_group(app_v, DepKind::Depends, vec![(lib, VersionConstraint::Any)])
            .unwrap();
        let mut cache = DepCache::new(Arc::new(graph));
        cache.mark_install(app, app_v);
        cache.mark_install(lib, lib_v);

        // lib's archive went missing
        cache.mark_keep(lib);
        assert!(cache.is_broken(app));

        let mut resolver = KeepResolver::new();
        assert!(resolver.resolve_by_keep(&mut cache));
        assert!(cache.state(app).keep());
        assert_eq!(resolver.kept(), &[app]);
    }

    #[test]
    fn test_keeps_upgrade_that_breaks_kept_package() {
        let mut graph = DependencyGraph::new();
        let app = graph.add_package("app", "amd64");
        let lib = graph.add_package("lib", "amd64");
        let app_v = graph.add_version(app, ver("1"));
        let lib_v1 = graph.add_version(lib, ver("1"));
        let lib_v2 = graph.add_version(lib, ver("2"));
        graph
            .add_group(
                app_v,
                DepKind::Depends,
                vec![(lib, VersionConstraint::parse("<< 2").unwrap())],
            )
            .unwrap();
        graph
            .set_current(app, Some(app_v), CurrentState::Installed)
            .unwrap();
        graph
            .set_current(lib, Some(lib_v1), CurrentState::Installed)
            .unwrap();
        let mut cache = DepCache::new(Arc::new(graph));
        cache.mark_install(lib, lib_v2);
        assert!(cache.is_broken(app));

        let mut resolver = KeepResolver::new();
        assert!(resolver.resolve_by_keep(&mut cache));
        assert_eq!(cache.install_version(lib), Some(lib_v1));
    }

    #[test]
    fn test_reports_unresolvable() {
        let mut graph = DependencyGraph::new();
        let app = graph.add_package("app", "amd64");
        let gone = graph.add_package("gone", "amd64");
        let app_v = graph.add_version(app, ver("1"));
        graph
            .add_group(app_v, DepKind::Depends, vec![(gone, VersionConstraint::Any)])
            .unwrap();
        // Installed and already broken, nothing pending to revert
        graph
            .set_current(app, Some(app_v), CurrentState::Installed)
            .unwrap();
        let mut cache = DepCache::new(Arc::new(graph));

        let mut resolver = KeepResolver::new();
        assert!(!resolver.resolve_by_keep(&mut cache));
    }
}
