// src/graph/mod.rs

//! Dependency graph data structures
//!
//! Packages, versions, and dependency edges live in flat arenas indexed by
//! stable integer ids, so recursive traversals never hold borrows across
//! calls. Reverse-dependency and provides indexes are maintained as edges
//! are added.

mod types;

pub use types::{
    CurrentState, DepKind, Dependency, DependencyGroup, DependencyId, MultiArch, Package,
    PackageId, PkgState, Provide, Version, VersionId,
};

use crate::error::{Error, Result};
use crate::version::{DebVersion, VersionConstraint};
use std::collections::HashMap;

/// Dependency graph over all known packages and versions
#[derive(Debug, Default)]
pub struct DependencyGraph {
    packages: Vec<Package>,
    versions: Vec<Version>,
    dependencies: Vec<Dependency>,
    /// Map from package name to every architecture of it
    by_name: HashMap<String, Vec<PackageId>>,
    /// Per target package: edges that point at it
    reverse_depends: Vec<Vec<DependencyId>>,
    /// Per virtual package: versions providing it
    provided_by: Vec<Vec<(VersionId, Option<DebVersion>)>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package, or return the existing one with the same name and arch
    pub fn add_package(&mut self, name: &str, arch: &str) -> PackageId {
        if let Some(id) = self.find(name, arch) {
            return id;
        }

        let id = PackageId(self.packages.len() as u32);
        self.packages
            .push(Package::new(id, name.to_string(), arch.to_string()));
        self.reverse_depends.push(Vec::new());
        self.provided_by.push(Vec::new());
        self.by_name.entry(name.to_string()).or_default().push(id);
        id
    }

    /// Add a version to a package
    pub fn add_version(&mut self, package: PackageId, version: DebVersion) -> VersionId {
        let id = VersionId(self.versions.len() as u32);
        self.versions.push(Version {
            id,
            package,
            version,
            multi_arch: MultiArch::No,
            groups: Vec::new(),
            provides: Vec::new(),
        });
        self.packages[package.index()].versions.push(id);
        id
    }

    /// Set the multi-arch mode of a version
    pub fn set_multi_arch(&mut self, version: VersionId, multi_arch: MultiArch) {
        self.versions[version.index()].multi_arch = multi_arch;
    }

    /// Add an OR-group of edges of one kind to a version
    pub fn add_group(
        &mut self,
        version: VersionId,
        kind: DepKind,
        alternatives: Vec<(PackageId, VersionConstraint)>,
    ) -> Result<()> {
        if alternatives.is_empty() {
            return Err(Error::InvalidDependency(format!(
                "empty {} group on {}",
                kind,
                self.describe_version(version)
            )));
        }

        let mut ids = Vec::with_capacity(alternatives.len());
        for (target, constraint) in alternatives {
            let id = DependencyId(self.dependencies.len() as u32);
            self.dependencies.push(Dependency {
                id,
                parent: version,
                kind,
                target,
                constraint,
            });
            self.reverse_depends[target.index()].push(id);
            ids.push(id);
        }

        self.versions[version.index()].groups.push(DependencyGroup {
            kind,
            alternatives: ids,
        });
        Ok(())
    }

    /// Record that a version provides a (virtual) package
    pub fn add_provide(
        &mut self,
        version: VersionId,
        provided: PackageId,
        provide_version: Option<DebVersion>,
    ) {
        self.versions[version.index()].provides.push(Provide {
            package: provided,
            version: provide_version.clone(),
        });
        self.provided_by[provided.index()].push((version, provide_version));
    }

    /// Set what is currently installed for a package
    pub fn set_current(
        &mut self,
        package: PackageId,
        version: Option<VersionId>,
        state: CurrentState,
    ) -> Result<()> {
        if let Some(ver) = version
            && self.versions[ver.index()].package != package
        {
            return Err(Error::Config(format!(
                "version {} does not belong to {}",
                self.describe_version(ver),
                self.packages[package.index()].full_name()
            )));
        }

        let pkg = &mut self.packages[package.index()];
        pkg.current_version = version;
        pkg.current_state = state;
        Ok(())
    }

    /// Mutable access for package flags (essential, important, reinstall-required)
    pub fn package_mut(&mut self, id: PackageId) -> &mut Package {
        &mut self.packages[id.index()]
    }

    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.index()]
    }

    pub fn version(&self, id: VersionId) -> &Version {
        &self.versions[id.index()]
    }

    pub fn dependency(&self, id: DependencyId) -> &Dependency {
        &self.dependencies[id.index()]
    }

    /// All packages in id order
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter()
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    /// Look up a package by name and architecture
    pub fn find(&self, name: &str, arch: &str) -> Option<PackageId> {
        self.by_name
            .get(name)?
            .iter()
            .copied()
            .find(|id| self.packages[id.index()].arch == arch)
    }

    /// Every architecture of a name, in insertion order
    pub fn find_all(&self, name: &str) -> &[PackageId] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Look up a version of a package by version string equality
    pub fn find_version(&self, package: PackageId, version: &DebVersion) -> Option<VersionId> {
        self.packages[package.index()]
            .versions
            .iter()
            .copied()
            .find(|v| &self.versions[v.index()].version == version)
    }

    /// Packages sharing a name across architectures (the multi-arch group)
    pub fn group_members(&self, package: PackageId) -> &[PackageId] {
        self.find_all(&self.packages[package.index()].name)
    }

    /// Edges targeting a package
    pub fn reverse_depends(&self, package: PackageId) -> &[DependencyId] {
        &self.reverse_depends[package.index()]
    }

    /// Versions providing a package, with the provided version
    pub fn provided_by(&self, package: PackageId) -> &[(VersionId, Option<DebVersion>)] {
        &self.provided_by[package.index()]
    }

    /// Every version that satisfies an edge, directly or through provides
    ///
    /// For negative kinds the parent's own package is never a target, so a
    /// package may conflict with a virtual name it provides itself.
    pub fn all_targets(&self, dep: DependencyId) -> Vec<VersionId> {
        let dep = &self.dependencies[dep.index()];
        let parent_pkg = self.versions[dep.parent.index()].package;
        let negative = dep.kind.is_negative();
        let target = &self.packages[dep.target.index()];

        let mut result = Vec::new();
        for &ver in &target.versions {
            let version = &self.versions[ver.index()];
            if !dep.constraint.satisfied_by(Some(&version.version)) {
                continue;
            }
            if negative && version.package == parent_pkg {
                continue;
            }
            result.push(ver);
        }

        for (ver, provide_version) in &self.provided_by[dep.target.index()] {
            if !dep.constraint.satisfied_by(provide_version.as_ref()) {
                continue;
            }
            if negative && self.versions[ver.index()].package == parent_pkg {
                continue;
            }
            result.push(*ver);
        }

        result
    }

    /// `name:arch=version` form used in messages
    pub fn describe_version(&self, id: VersionId) -> String {
        let ver = &self.versions[id.index()];
        format!(
            "{}={}",
            self.packages[ver.package.index()].full_name(),
            ver.version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ver(s: &str) -> DebVersion {
        DebVersion::parse(s).unwrap()
    }

    #[test]
    fn test_add_package_is_idempotent() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_package("libc6", "amd64");
        let b = graph.add_package("libc6", "amd64");
        let c = graph.add_package("libc6", "i386");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(graph.group_members(a), &[a, c]);
        assert_eq!(graph.package_count(), 2);
    }

    #[test]
    fn test_reverse_depends_tracked() {
        let mut graph = DependencyGraph::new();
        let app = graph.add_package("app", "amd64");
        let lib = graph.add_package("lib", "amd64");
        let app_v = graph.add_version(app, ver("1.0"));
        graph.add_version(lib, ver("2.0"));

        graph
            .add_group(app_v, DepKind::Depends, vec![(lib, VersionConstraint::Any)])
            .unwrap();

        let rdeps = graph.reverse_depends(lib);
        assert_eq!(rdeps.len(), 1);
        assert_eq!(graph.dependency(rdeps[0]).parent, app_v);
        assert!(graph.reverse_depends(app).is_empty());
    }

    #[test]
    fn test_empty_group_rejected() {
        let mut graph = DependencyGraph::new();
        let app = graph.add_package("app", "amd64");
        let app_v = graph.add_version(app, ver("1.0"));
        assert!(graph.add_group(app_v, DepKind::Depends, vec![]).is_err());
    }

    #[test]
    fn test_all_targets_filters_by_version() {
        let mut graph = DependencyGraph::new();
        let app = graph.add_package("app", "amd64");
        let lib = graph.add_package("lib", "amd64");
        let app_v = graph.add_version(app, ver("1.0"));
        let lib_old = graph.add_version(lib, ver("1.0"));
        let lib_new = graph.add_version(lib, ver("2.0"));

        graph
            .add_group(
                app_v,
                DepKind::Depends,
                vec![(lib, VersionConstraint::parse(">= 2.0").unwrap())],
            )
            .unwrap();

        let dep = graph.version(app_v).groups[0].alternatives[0];
        let targets = graph.all_targets(dep);
        assert_eq!(targets, vec![lib_new]);
        assert!(!targets.contains(&lib_old));
    }

    #[test]
    fn test_all_targets_through_provides() {
        let mut graph = DependencyGraph::new();
        let mua = graph.add_package("mutt", "amd64");
        let mta = graph.add_package("mail-transport-agent", "amd64");
        let exim = graph.add_package("exim4", "amd64");
        let mua_v = graph.add_version(mua, ver("2.0"));
        let exim_v = graph.add_version(exim, ver("4.96"));
        graph.add_provide(exim_v, mta, None);

        graph
            .add_group(mua_v, DepKind::Depends, vec![(mta, VersionConstraint::Any)])
            .unwrap();
        let dep = graph.version(mua_v).groups[0].alternatives[0];
        assert_eq!(graph.all_targets(dep), vec![exim_v]);
    }

    #[test]
    fn test_versioned_dep_ignores_unversioned_provide() {
        let mut graph = DependencyGraph::new();
        let app = graph.add_package("app", "amd64");
        let virt = graph.add_package("virtual", "amd64");
        let prov = graph.add_package("provider", "amd64");
        let app_v = graph.add_version(app, ver("1"));
        let prov_v = graph.add_version(prov, ver("1"));
        graph.add_provide(prov_v, virt, None);

        graph
            .add_group(
                app_v,
                DepKind::Depends,
                vec![(virt, VersionConstraint::parse(">= 1").unwrap())],
            )
            .unwrap();
        let dep = graph.version(app_v).groups[0].alternatives[0];
        assert!(graph.all_targets(dep).is_empty());
    }

    #[test]
    fn test_negative_targets_skip_own_package() {
        let mut graph = DependencyGraph::new();
        let postfix = graph.add_package("postfix", "amd64");
        let mta = graph.add_package("mail-transport-agent", "amd64");
        let exim = graph.add_package("exim4", "amd64");
        let postfix_v = graph.add_version(postfix, ver("3.7"));
        let exim_v = graph.add_version(exim, ver("4.96"));
        graph.add_provide(postfix_v, mta, None);
        graph.add_provide(exim_v, mta, None);

        graph
            .add_group(
                postfix_v,
                DepKind::Conflicts,
                vec![(mta, VersionConstraint::Any)],
            )
            .unwrap();
        let dep = graph.version(postfix_v).groups[0].alternatives[0];
        assert_eq!(graph.all_targets(dep), vec![exim_v]);
    }

    #[test]
    fn test_set_current_checks_ownership() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_package("a", "amd64");
        let b = graph.add_package("b", "amd64");
        let b_v = graph.add_version(b, ver("1"));
        assert!(graph.set_current(a, Some(b_v), CurrentState::Installed).is_err());
        assert!(graph.set_current(b, Some(b_v), CurrentState::Installed).is_ok());
        assert_eq!(graph.package(b).current_version, Some(b_v));
    }
}
