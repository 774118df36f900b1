// src/order/sort.rs

//! Ordering sub-sort for the order list
//!
//! Kahn's algorithm over the edges between listed packages. Ready packages
//! are released in input order. When only cycles remain, the package with
//! the fewest unresolved predecessors is released (earliest input position
//! on ties), so cyclic input still yields a total order. The drivers
//! re-check every relation at activation time, which is what makes a
//! best-effort order sufficient.

use crate::cache::DepCache;
use crate::error::{Error, Result};
use crate::graph::{DepKind, PackageId};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use tracing::debug;

/// Produces candidate orders for the order list
pub trait OrderSorter {
    /// Full order: PreDepends and Depends targets first, conflicting
    /// packages removed or upgraded away before whatever they obstruct
    fn order_unpack(&mut self, cache: &DepCache, packages: &[PackageId]) -> Result<Vec<PackageId>>;

    /// Critical path only: PreDepends and conflict removals
    fn order_critical(
        &mut self,
        cache: &DepCache,
        packages: &[PackageId],
    ) -> Result<Vec<PackageId>>;

    /// Configuration order over a subset: Depends and PreDepends
    fn order_configure(
        &mut self,
        cache: &DepCache,
        packages: &[PackageId],
    ) -> Result<Vec<PackageId>>;
}

/// Which relations a sort pass turns into edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Unpack,
    Critical,
    Configure,
}

impl Pass {
    fn follows(self, kind: DepKind) -> bool {
        match kind {
            DepKind::PreDepends => true,
            DepKind::Depends => self != Pass::Critical,
            _ => false,
        }
    }

    fn clears_conflicts(self) -> bool {
        self != Pass::Configure
    }
}

/// Default sorter
#[derive(Debug, Default)]
pub struct TopoSorter;

impl TopoSorter {
    pub fn new() -> Self {
        Self
    }

    /// Successor lists by input position: `u -> v` means u goes first
    fn edges(cache: &DepCache, packages: &[PackageId], pass: Pass) -> Result<Vec<Vec<usize>>> {
        let graph = cache.graph();
        let mut position = HashMap::with_capacity(packages.len());
        for (i, &pkg) in packages.iter().enumerate() {
            if pkg.index() >= graph.package_count() {
                return Err(Error::Ordering(format!(
                    "package id {} is not in the dependency graph",
                    pkg.index()
                )));
            }
            position.insert(pkg, i);
        }

        let mut successors = vec![Vec::new(); packages.len()];
        let mut seen = HashSet::new();
        let mut add = |from: usize, to: usize| {
            if seen.insert((from, to)) {
                successors[from].push(to);
            }
        };

        for (i, &pkg) in packages.iter().enumerate() {
            let state = cache.state(pkg);
            if state.delete() {
                continue;
            }
            let Some(inst) = state.install_version else {
                continue;
            };

            for group in &graph.version(inst).groups {
                for &dep in &group.alternatives {
                    for target in graph.all_targets(dep) {
                        let other = graph.version(target).package;
                        if other == pkg {
                            continue;
                        }
                        let Some(&j) = position.get(&other) else {
                            continue;
                        };

                        if group.kind.is_positive() {
                            if pass.follows(group.kind) && cache.install_version(other) == Some(target)
                            {
                                add(j, i);
                            }
                        } else if pass.clears_conflicts()
                            && graph.package(other).current_version == Some(target)
                            && cache.install_version(other) != Some(target)
                        {
                            add(j, i);
                        }
                    }
                }
            }
        }

        Ok(successors)
    }

    fn sort(cache: &DepCache, packages: &[PackageId], pass: Pass) -> Result<Vec<PackageId>> {
        let successors = Self::edges(cache, packages, pass)?;
        let n = packages.len();

        let mut in_degree = vec![0usize; n];
        for succ in &successors {
            for &v in succ {
                in_degree[v] += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
            .filter(|&i| in_degree[i] == 0)
            .map(Reverse)
            .collect();
        let mut done = vec![false; n];
        let mut result = Vec::with_capacity(n);

        while result.len() < n {
            let next = match ready.pop() {
                Some(Reverse(i)) => i,
                None => {
                    let Some(i) = (0..n)
                        .filter(|&i| !done[i])
                        .min_by_key(|&i| (in_degree[i], i))
                    else {
                        break;
                    };
                    debug!(
                        "Breaking {:?} ordering cycle at {}",
                        pass,
                        cache.graph().package(packages[i]).full_name()
                    );
                    i
                }
            };
            if done[next] {
                continue;
            }

            done[next] = true;
            result.push(packages[next]);
            for &v in &successors[next] {
                in_degree[v] -= 1;
                if in_degree[v] == 0 && !done[v] {
                    ready.push(Reverse(v));
                }
            }
        }

        Ok(result)
    }
}

impl OrderSorter for TopoSorter {
    fn order_unpack(&mut self, cache: &DepCache, packages: &[PackageId]) -> Result<Vec<PackageId>> {
        Self::sort(cache, packages, Pass::Unpack)
    }

    fn order_critical(
        &mut self,
        cache: &DepCache,
        packages: &[PackageId],
    ) -> Result<Vec<PackageId>> {
        Self::sort(cache, packages, Pass::Critical)
    }

    fn order_configure(
        &mut self,
        cache: &DepCache,
        packages: &[PackageId],
    ) -> Result<Vec<PackageId>> {
        Self::sort(cache, packages, Pass::Configure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CurrentState, DependencyGraph, VersionId};
    use crate::version::{DebVersion, VersionConstraint};
    use std::sync::Arc;

    fn ver(s: &str) -> DebVersion {
        DebVersion::parse(s).unwrap()
    }

    /// Three fresh installs: app depends on lib, lib pre-depends on base
    fn chain() -> (DepCache, [PackageId; 3]) {
        let mut graph = DependencyGraph::new();
        let app = graph.add_package("app", "amd64");
        let lib = graph.add_package("lib", "amd64");
        let base = graph.add_package("base", "amd64");
        let app_v = graph.add_version(app, ver("1"));
        let lib_v = graph.add_version(lib, ver("1"));
        let base_v = graph.add_version(base, ver("1"));
        graph
            .add_group(app_v, DepKind::Depends, vec![(lib, VersionConstraint::Any)])
            .unwrap();
        graph
            .add_group(lib_v, DepKind::PreDepends, vec![(base, VersionConstraint::Any)])
            .unwrap();
        let mut cache = DepCache::new(Arc::new(graph));
        cache.mark_install(app, app_v);
        cache.mark_install(lib, lib_v);
        cache.mark_install(base, base_v);
        (cache, [app, lib, base])
    }

    #[test]
    fn test_unpack_puts_targets_first() {
        let (cache, [app, lib, base]) = chain();
        let order = TopoSorter::new()
            .order_unpack(&cache, &[app, lib, base])
            .unwrap();
        assert_eq!(order, vec![base, lib, app]);
    }

    #[test]
    fn test_critical_ignores_plain_depends() {
        let (cache, [app, lib, base]) = chain();
        let order = TopoSorter::new()
            .order_critical(&cache, &[app, lib, base])
            .unwrap();
        assert_eq!(order, vec![app, base, lib]);
    }

    #[test]
    fn test_conflicting_removal_goes_first() {
        let mut graph = DependencyGraph::new();
        let new = graph.add_package("postfix", "amd64");
        let old = graph.add_package("exim4", "amd64");
        let new_v = graph.add_version(new, ver("3.7"));
        let old_v = graph.add_version(old, ver("4.96"));
        graph
            .add_group(new_v, DepKind::Conflicts, vec![(old, VersionConstraint::Any)])
            .unwrap();
        graph
            .set_current(old, Some(old_v), CurrentState::Installed)
            .unwrap();
        let mut cache = DepCache::new(Arc::new(graph));
        cache.mark_install(new, new_v);
        cache.mark_delete(old, false);

        let order = TopoSorter::new().order_unpack(&cache, &[new, old]).unwrap();
        assert_eq!(order, vec![old, new]);

        let order = TopoSorter::new().order_configure(&cache, &[new, old]).unwrap();
        assert_eq!(order, vec![new, old]);
    }

    #[test]
    fn test_cycle_released_deterministically() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_package("a", "amd64");
        let b = graph.add_package("b", "amd64");
        let c = graph.add_package("c", "amd64");
        let versions: Vec<VersionId> = [a, b, c]
            .iter()
            .map(|&p| graph.add_version(p, ver("1")))
            .collect();
        graph
            .add_group(versions[0], DepKind::Depends, vec![(b, VersionConstraint::Any)])
            .unwrap();
        graph
            .add_group(versions[1], DepKind::Depends, vec![(c, VersionConstraint::Any)])
            .unwrap();
        graph
            .add_group(versions[2], DepKind::Depends, vec![(a, VersionConstraint::Any)])
            .unwrap();
        let mut cache = DepCache::new(Arc::new(graph));
        for (&p, &v) in [a, b, c].iter().zip(&versions) {
            cache.mark_install(p, v);
        }

        let order = TopoSorter::new().order_unpack(&cache, &[a, b, c]).unwrap();
        assert_eq!(order.len(), 3);
        assert_eq!(order, vec![a, c, b]);
    }

    #[test]
    fn test_unknown_package_is_ordering_error() {
        let (cache, [app, ..]) = chain();
        let err = TopoSorter::new()
            .order_unpack(&cache, &[app, PackageId(99)])
            .unwrap_err();
        assert!(matches!(err, Error::Ordering(_)));
    }
}
