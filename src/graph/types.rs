// src/graph/types.rs

//! Node and edge types stored in the dependency graph arenas

use crate::version::{DebVersion, VersionConstraint};
use std::fmt;
use std::str::FromStr;

/// Stable index of a package in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(pub(crate) u32);

/// Stable index of a version in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionId(pub(crate) u32);

/// Stable index of a dependency edge in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyId(pub(crate) u32);

impl PackageId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl VersionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl DependencyId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind of a dependency edge. An OR-group is always of a single kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepKind {
    Depends,
    PreDepends,
    Conflicts,
    Obsoletes,
    Breaks,
}

impl DepKind {
    pub fn as_str(&self) -> &str {
        match self {
            DepKind::Depends => "depends",
            DepKind::PreDepends => "pre-depends",
            DepKind::Conflicts => "conflicts",
            DepKind::Obsoletes => "obsoletes",
            DepKind::Breaks => "breaks",
        }
    }

    /// Negative kinds are satisfied by the *absence* of their targets
    pub fn is_negative(&self) -> bool {
        matches!(
            self,
            DepKind::Conflicts | DepKind::Obsoletes | DepKind::Breaks
        )
    }

    /// Depends or PreDepends
    pub fn is_positive(&self) -> bool {
        !self.is_negative()
    }
}

impl FromStr for DepKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "depends" => Ok(DepKind::Depends),
            "pre-depends" | "pre_depends" => Ok(DepKind::PreDepends),
            "conflicts" => Ok(DepKind::Conflicts),
            "obsoletes" => Ok(DepKind::Obsoletes),
            "breaks" => Ok(DepKind::Breaks),
            _ => Err(format!("Invalid dependency kind: {s}")),
        }
    }
}

impl fmt::Display for DepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multi-arch mode of a version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MultiArch {
    #[default]
    No,
    Same,
    Foreign,
    Allowed,
}

impl MultiArch {
    pub fn as_str(&self) -> &str {
        match self {
            MultiArch::No => "no",
            MultiArch::Same => "same",
            MultiArch::Foreign => "foreign",
            MultiArch::Allowed => "allowed",
        }
    }
}

impl FromStr for MultiArch {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "no" | "none" => Ok(MultiArch::No),
            "same" => Ok(MultiArch::Same),
            "foreign" => Ok(MultiArch::Foreign),
            "allowed" => Ok(MultiArch::Allowed),
            _ => Err(format!("Invalid multi-arch mode: {s}")),
        }
    }
}

/// Current dpkg status of a package on the running system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurrentState {
    #[default]
    NotInstalled,
    ConfigFiles,
    HalfInstalled,
    Unpacked,
    HalfConfigured,
    TriggersAwaited,
    TriggersPending,
    Installed,
}

impl CurrentState {
    pub fn as_str(&self) -> &str {
        match self {
            CurrentState::NotInstalled => "not-installed",
            CurrentState::ConfigFiles => "config-files",
            CurrentState::HalfInstalled => "half-installed",
            CurrentState::Unpacked => "unpacked",
            CurrentState::HalfConfigured => "half-configured",
            CurrentState::TriggersAwaited => "triggers-awaited",
            CurrentState::TriggersPending => "triggers-pending",
            CurrentState::Installed => "installed",
        }
    }
}

impl FromStr for CurrentState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "not-installed" => Ok(CurrentState::NotInstalled),
            "config-files" => Ok(CurrentState::ConfigFiles),
            "half-installed" => Ok(CurrentState::HalfInstalled),
            "unpacked" => Ok(CurrentState::Unpacked),
            "half-configured" => Ok(CurrentState::HalfConfigured),
            "triggers-awaited" => Ok(CurrentState::TriggersAwaited),
            "triggers-pending" => Ok(CurrentState::TriggersPending),
            "installed" => Ok(CurrentState::Installed),
            _ => Err(format!("Invalid package state: {s}")),
        }
    }
}

/// What the running system still needs done to a package's current version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkgState {
    NeedsNothing,
    NeedsUnpack,
    NeedsConfigure,
}

/// A package: one name on one architecture
#[derive(Debug, Clone)]
pub struct Package {
    pub id: PackageId,
    pub name: String,
    pub arch: String,
    pub essential: bool,
    pub important: bool,
    pub current_version: Option<VersionId>,
    pub current_state: CurrentState,
    /// dpkg flagged the package as needing reinstallation
    pub reinst_required: bool,
    pub versions: Vec<VersionId>,
}

impl Package {
    pub(crate) fn new(id: PackageId, name: String, arch: String) -> Self {
        Self {
            id,
            name,
            arch,
            essential: false,
            important: false,
            current_version: None,
            current_state: CurrentState::NotInstalled,
            reinst_required: false,
            versions: Vec::new(),
        }
    }

    /// Outstanding work on the current version
    pub fn state(&self) -> PkgState {
        if self.reinst_required {
            return PkgState::NeedsUnpack;
        }
        match self.current_state {
            CurrentState::Unpacked
            | CurrentState::HalfConfigured
            | CurrentState::TriggersAwaited
            | CurrentState::TriggersPending => PkgState::NeedsConfigure,
            CurrentState::HalfInstalled => PkgState::NeedsUnpack,
            _ => PkgState::NeedsNothing,
        }
    }

    /// Nothing of the package, not even configuration files, remains
    pub fn is_purged(&self) -> bool {
        self.current_version.is_none() && self.current_state == CurrentState::NotInstalled
    }

    /// Virtual packages have no versions of their own
    pub fn is_virtual(&self) -> bool {
        self.versions.is_empty()
    }

    /// `name:arch` form used in messages
    pub fn full_name(&self) -> String {
        format!("{}:{}", self.name, self.arch)
    }
}

/// Something a version provides: a virtual package and optional version
#[derive(Debug, Clone)]
pub struct Provide {
    pub package: PackageId,
    pub version: Option<DebVersion>,
}

/// An OR-group: satisfied when any alternative is
#[derive(Debug, Clone)]
pub struct DependencyGroup {
    pub kind: DepKind,
    pub alternatives: Vec<DependencyId>,
}

/// A single dependency edge from a version to a target package
#[derive(Debug, Clone)]
pub struct Dependency {
    pub id: DependencyId,
    pub parent: VersionId,
    pub kind: DepKind,
    pub target: PackageId,
    pub constraint: VersionConstraint,
}

/// One version of a package
#[derive(Debug, Clone)]
pub struct Version {
    pub id: VersionId,
    pub package: PackageId,
    pub version: DebVersion,
    pub multi_arch: MultiArch,
    pub groups: Vec<DependencyGroup>,
    pub provides: Vec<Provide>,
}
