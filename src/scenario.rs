// src/scenario.rs

//! Transaction scenarios
//!
//! A scenario file describes a whole transaction in TOML: the policy, the
//! packages with their versions and relations, what is installed now, and
//! what was decided for each package. Relations use Debian syntax.
//!
//! ```toml
//! [manager]
//! immediate_configure = true
//!
//! [[package]]
//! name = "postfix"
//! installed = "3.6.4-1"
//! action = "install"
//! target = "3.7.10-0"
//!
//! [[package.version]]
//! version = "3.7.10-0"
//! pre_depends = ["debconf (>= 0.5) | debconf-2.0"]
//! conflicts = ["mail-transport-agent"]
//! provides = ["mail-transport-agent"]
//! ```
//!
//! Every package with a version to install gets an archive path
//! (`name_version_arch.deb`) unless `archive` names one or `missing = true`.

use crate::cache::DepCache;
use crate::config::ManagerConfig;
use crate::error::{Error, Result};
use crate::graph::{
    CurrentState, DepKind, DependencyGraph, MultiArch, PackageId, PkgState, VersionId,
};
use crate::installer::Installer;
use crate::manager::PackageManager;
use crate::version::{DebVersion, VersionConstraint};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_ARCH: &str = "amd64";

fn default_arch() -> String {
    DEFAULT_ARCH.to_string()
}

/// Top-level layout of a scenario file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioFile {
    #[serde(default)]
    pub manager: ManagerConfig,

    #[serde(default, rename = "package")]
    pub packages: Vec<PackageEntry>,
}

/// One `[[package]]` table
#[derive(Debug, Clone, Deserialize)]
pub struct PackageEntry {
    pub name: String,

    #[serde(default = "default_arch")]
    pub arch: String,

    #[serde(default)]
    pub essential: bool,

    #[serde(default)]
    pub important: bool,

    /// Currently installed version
    #[serde(default)]
    pub installed: Option<String>,

    /// dpkg status; defaults to `installed` when a version is installed
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub reinst_required: bool,

    #[serde(default, rename = "version")]
    pub versions: Vec<VersionEntry>,

    /// Decided action; `install` when `target` is set, `keep` otherwise
    #[serde(default)]
    pub action: Option<Action>,

    /// Version to install (defaults to the highest one)
    #[serde(default)]
    pub target: Option<String>,

    #[serde(default)]
    pub reinstall: bool,

    #[serde(default)]
    pub archive: Option<PathBuf>,

    /// Leave the package without an archive
    #[serde(default)]
    pub missing: bool,
}

/// One `[[package.version]]` table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionEntry {
    pub version: String,

    #[serde(default)]
    pub multi_arch: Option<String>,

    #[serde(default)]
    pub depends: Vec<String>,

    #[serde(default)]
    pub pre_depends: Vec<String>,

    #[serde(default)]
    pub conflicts: Vec<String>,

    #[serde(default)]
    pub breaks: Vec<String>,

    #[serde(default)]
    pub obsoletes: Vec<String>,

    #[serde(default)]
    pub provides: Vec<String>,
}

/// Decided action for a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Keep,
    Install,
    Delete,
    Purge,
}

/// One alternative of a relation: `name[:arch] [(op version)]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub name: String,
    pub arch: Option<String>,
    pub constraint: VersionConstraint,
}

/// Parse one OR-group, e.g. `exim4 (>= 4.90) | postfix`
pub fn parse_relation(s: &str) -> Result<Vec<Relation>> {
    let mut alternatives = Vec::new();

    for alt in s.split('|') {
        let alt = alt.trim();
        let (target, constraint) = match alt.split_once('(') {
            Some((target, rest)) => {
                let inner = rest.strip_suffix(')').ok_or_else(|| {
                    Error::InvalidDependency(format!("unclosed version relation in '{}'", s))
                })?;
                (target.trim(), VersionConstraint::parse(inner)?)
            }
            None => (alt, VersionConstraint::Any),
        };

        if target.is_empty() || target.chars().any(char::is_whitespace) {
            return Err(Error::InvalidDependency(format!(
                "bad package name in '{}'",
                s
            )));
        }

        let (name, arch) = match target.split_once(':') {
            Some((name, "any")) => (name, None),
            Some((name, arch)) => (name, Some(arch.to_string())),
            None => (target, None),
        };

        alternatives.push(Relation {
            name: name.to_string(),
            arch,
            constraint,
        });
    }

    Ok(alternatives)
}

/// A loaded transaction, ready to drive
#[derive(Debug, Clone)]
pub struct Scenario {
    pub config: ManagerConfig,
    pub cache: DepCache,
    pub archives: Vec<(PackageId, PathBuf)>,
}

impl Scenario {
    pub fn graph(&self) -> &DependencyGraph {
        self.cache.graph()
    }

    /// Look up a package by `name` or `name:arch`
    pub fn package(&self, spec: &str) -> Result<PackageId> {
        let graph = self.graph();
        let found = match spec.split_once(':') {
            Some((name, arch)) => graph.find(name, arch),
            None => graph.find_all(spec).first().copied(),
        };
        found.ok_or_else(|| Error::UnknownPackage(spec.to_string()))
    }

    /// Build a package manager over this scenario
    pub fn into_manager<I: Installer>(self, installer: I) -> PackageManager<I> {
        let mut pm = PackageManager::new(self.cache, self.config, installer);
        for (pkg, path) in self.archives {
            pm.set_archive(pkg, path);
        }
        pm
    }
}

/// Load a scenario from a file
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let content = std::fs::read_to_string(path)?;
    parse_scenario_string(&content)
}

/// Load a scenario from a TOML string
pub fn parse_scenario_string(content: &str) -> Result<Scenario> {
    let file: ScenarioFile = toml::from_str(content)?;
    build_scenario(file)
}

/// Resolve a scenario file into a graph, decisions, and archives
pub fn build_scenario(file: ScenarioFile) -> Result<Scenario> {
    let mut graph = DependencyGraph::new();

    // Packages and versions first, so relations can refer forward
    let mut ids = Vec::with_capacity(file.packages.len());
    for entry in &file.packages {
        let pkg = graph.add_package(&entry.name, &entry.arch);
        if !graph.package(pkg).versions.is_empty() {
            return Err(Error::Config(format!(
                "package {}:{} is defined twice",
                entry.name, entry.arch
            )));
        }

        let mut versions = Vec::with_capacity(entry.versions.len());
        for v in &entry.versions {
            let id = graph.add_version(pkg, DebVersion::parse(&v.version)?);
            if let Some(mode) = &v.multi_arch {
                let mode: MultiArch = mode.parse().map_err(Error::Config)?;
                graph.set_multi_arch(id, mode);
            }
            versions.push(id);
        }

        let pkg_mut = graph.package_mut(pkg);
        pkg_mut.essential = entry.essential;
        pkg_mut.important = entry.important;
        pkg_mut.reinst_required = entry.reinst_required;
        ids.push((pkg, versions));
    }

    for (entry, (pkg, versions)) in file.packages.iter().zip(&ids) {
        for (v, &id) in entry.versions.iter().zip(versions) {
            add_relations(&mut graph, *pkg, id, v)?;
        }
        set_installed(&mut graph, *pkg, entry)?;
    }

    let graph = Arc::new(graph);
    let mut cache = DepCache::new(graph.clone());
    let mut archives = Vec::new();

    for (entry, (pkg, _)) in file.packages.iter().zip(&ids) {
        let pkg = *pkg;
        let action = entry.action.unwrap_or(if entry.target.is_some() {
            Action::Install
        } else {
            Action::Keep
        });

        match action {
            Action::Keep => {}
            Action::Install => {
                let version = install_target(&graph, pkg, entry)?;
                cache.mark_install(pkg, version);
            }
            Action::Delete => cache.mark_delete(pkg, false),
            Action::Purge => cache.mark_delete(pkg, true),
        }
        cache.set_reinstall(pkg, entry.reinstall);

        if entry.missing {
            continue;
        }
        let state = *cache.state(pkg);
        let needs_archive = !state.keep()
            || state.reinstall
            || graph.package(pkg).state() == PkgState::NeedsUnpack;
        if let Some(path) = &entry.archive {
            archives.push((pkg, path.clone()));
        } else if needs_archive && let Some(version) = state.install_version {
            let version = &graph.version(version).version;
            archives.push((
                pkg,
                PathBuf::from(format!("{}_{}_{}.deb", entry.name, version, entry.arch)),
            ));
        }
    }

    debug!(
        "Loaded scenario with {} package(s), {} archive(s)",
        graph.package_count(),
        archives.len()
    );

    Ok(Scenario {
        config: file.manager,
        cache,
        archives,
    })
}

fn add_relations(
    graph: &mut DependencyGraph,
    pkg: PackageId,
    version: VersionId,
    entry: &VersionEntry,
) -> Result<()> {
    let arch = graph.package(pkg).arch.clone();
    let kinds = [
        (DepKind::PreDepends, &entry.pre_depends),
        (DepKind::Depends, &entry.depends),
        (DepKind::Conflicts, &entry.conflicts),
        (DepKind::Breaks, &entry.breaks),
        (DepKind::Obsoletes, &entry.obsoletes),
    ];

    for (kind, lines) in kinds {
        for group in lines.iter().flat_map(|line| line.split(',')) {
            let alternatives = parse_relation(group)?
                .into_iter()
                .map(|rel| (resolve_target(graph, &rel, &arch), rel.constraint))
                .collect();
            graph.add_group(version, kind, alternatives)?;
        }
    }

    for line in entry.provides.iter().flat_map(|line| line.split(',')) {
        let relation = parse_relation(line)?;
        let [provide] = relation.as_slice() else {
            return Err(Error::InvalidDependency(format!(
                "provides cannot have alternatives: '{}'",
                line
            )));
        };
        let provide_version = match &provide.constraint {
            VersionConstraint::Any => None,
            VersionConstraint::Exact(v) => Some(v.clone()),
            other => {
                return Err(Error::InvalidDependency(format!(
                    "provides only allow '=', got '{}'",
                    other
                )));
            }
        };
        let target = resolve_target(graph, provide, &arch);
        graph.add_provide(version, target, provide_version);
    }

    Ok(())
}

/// Same architecture first, then any architecture, else a new virtual package
fn resolve_target(graph: &mut DependencyGraph, relation: &Relation, arch: &str) -> PackageId {
    if let Some(wanted) = &relation.arch {
        return graph.add_package(&relation.name, wanted);
    }
    if let Some(id) = graph.find(&relation.name, arch) {
        return id;
    }
    if let Some(&id) = graph.find_all(&relation.name).first() {
        return id;
    }
    graph.add_package(&relation.name, arch)
}

fn set_installed(graph: &mut DependencyGraph, pkg: PackageId, entry: &PackageEntry) -> Result<()> {
    let status = match &entry.status {
        Some(status) => status.parse::<CurrentState>().map_err(Error::Config)?,
        None if entry.installed.is_some() => CurrentState::Installed,
        None => CurrentState::NotInstalled,
    };

    let current = match &entry.installed {
        Some(version) => {
            let version = DebVersion::parse(version)?;
            // An installed version needs no entry of its own
            Some(match graph.find_version(pkg, &version) {
                Some(id) => id,
                None => graph.add_version(pkg, version),
            })
        }
        None => None,
    };

    graph.set_current(pkg, current, status)
}

fn install_target(graph: &DependencyGraph, pkg: PackageId, entry: &PackageEntry) -> Result<VersionId> {
    let package = graph.package(pkg);
    match &entry.target {
        Some(target) => {
            let version = DebVersion::parse(target)?;
            graph.find_version(pkg, &version).ok_or_else(|| {
                Error::Config(format!(
                    "{} has no version {} to install",
                    package.full_name(),
                    target
                ))
            })
        }
        None => package
            .versions
            .iter()
            .copied()
            .max_by(|a, b| graph.version(*a).version.cmp(&graph.version(*b).version))
            .ok_or_else(|| {
                Error::Config(format!("{} has no version to install", package.full_name()))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::RecordingInstaller;

    #[test]
    fn test_parse_relation_alternatives() {
        let rel = parse_relation("exim4 (>= 4.90) | postfix:amd64 | mta:any").unwrap();
        assert_eq!(rel.len(), 3);
        assert_eq!(rel[0].name, "exim4");
        assert_eq!(
            rel[0].constraint,
            VersionConstraint::GreaterOrEqual(DebVersion::parse("4.90").unwrap())
        );
        assert_eq!(rel[1].arch.as_deref(), Some("amd64"));
        assert_eq!(rel[2].arch, None);
        assert!(rel[2].constraint.is_any());
    }

    #[test]
    fn test_parse_relation_errors() {
        assert!(parse_relation("libc6 (>= 2.36").is_err());
        assert!(parse_relation("a | ").is_err());
        assert!(parse_relation("two words").is_err());
    }

    #[test]
    fn test_build_scenario() {
        let scenario = parse_scenario_string(
            r#"
[manager]
force_loop_break = true

[[package]]
name = "app"
action = "install"

[[package.version]]
version = "1.0"
depends = ["lib (>= 2), mail-transport-agent"]

[[package.version]]
version = "2.0"
depends = ["lib (>= 2)"]

[[package]]
name = "lib"
installed = "1"
target = "2"

[[package.version]]
version = "2"
provides = ["libfoo (= 2)"]

[[package]]
name = "old"
installed = "0.9"
action = "purge"
"#,
        )
        .unwrap();

        assert!(scenario.config.force_loop_break);
        let graph = scenario.graph();
        let app = scenario.package("app").unwrap();
        let lib = scenario.package("lib:amd64").unwrap();
        let old = scenario.package("old").unwrap();

        // Highest version is chosen when no target is given
        let app_inst = scenario.cache.install_version(app).unwrap();
        assert_eq!(graph.version(app_inst).version.to_string(), "2.0");

        // The installed version was added on the fly
        assert_eq!(graph.package(lib).versions.len(), 2);
        assert!(scenario.cache.state(lib).install());
        assert!(scenario.cache.state(old).purge);

        // Unknown relation targets become virtual packages
        let mta = scenario.package("mail-transport-agent").unwrap();
        assert!(graph.package(mta).is_virtual());

        assert_eq!(scenario.archives.len(), 2);
        assert_eq!(scenario.archives[0].1, PathBuf::from("app_2.0_amd64.deb"));

        let pm = scenario.into_manager(RecordingInstaller::new());
        assert!(!pm.is_missing(app));
    }

    #[test]
    fn test_missing_and_bad_target() {
        let scenario = parse_scenario_string(
            r#"
[[package]]
name = "app"
target = "1"
missing = true

[[package.version]]
version = "1"
"#,
        )
        .unwrap();
        assert!(scenario.archives.is_empty());

        let err = parse_scenario_string(
            r#"
[[package]]
name = "app"
target = "9"

[[package.version]]
version = "1"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
