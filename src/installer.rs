// src/installer.rs

//! Primitive operation backend
//!
//! The ordering engine decides *when* a package is unpacked, configured, or
//! removed; an [`Installer`] performs the operation. [`RecordingInstaller`]
//! is a dry-run backend that records the sequence it was asked to run,
//! which is what the CLI prints and what the tests assert on.

use crate::error::{Error, Result};
use crate::graph::{Package, Version};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Backend executing primitive package operations
pub trait Installer {
    /// Unpack a version of a package from its archive
    fn unpack(&mut self, package: &Package, version: &Version, archive: &Path) -> Result<()>;

    /// Configure an unpacked package
    fn configure(&mut self, package: &Package) -> Result<()>;

    /// Remove a package, optionally purging configuration files
    fn remove(&mut self, package: &Package, purge: bool) -> Result<()>;
}

/// Kind of a primitive operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Unpack,
    Configure,
    Remove,
}

impl OperationKind {
    pub fn as_str(&self) -> &str {
        match self {
            OperationKind::Unpack => "unpack",
            OperationKind::Configure => "configure",
            OperationKind::Remove => "remove",
        }
    }
}

/// One operation as executed by the dry-run backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Unpack {
        package: String,
        version: String,
        archive: PathBuf,
    },
    Configure {
        package: String,
    },
    Remove {
        package: String,
        purge: bool,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Unpack { .. } => OperationKind::Unpack,
            Operation::Configure { .. } => OperationKind::Configure,
            Operation::Remove { .. } => OperationKind::Remove,
        }
    }

    pub fn package(&self) -> &str {
        match self {
            Operation::Unpack { package, .. }
            | Operation::Configure { package }
            | Operation::Remove { package, .. } => package,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Unpack {
                package,
                version,
                archive,
            } => {
                write!(f, "unpack {} {}", package, version)?;
                if !archive.as_os_str().is_empty() {
                    write!(f, " ({})", archive.display())?;
                }
                Ok(())
            }
            Operation::Configure { package } => write!(f, "configure {}", package),
            Operation::Remove { package, purge } => {
                if *purge {
                    write!(f, "purge {}", package)
                } else {
                    write!(f, "remove {}", package)
                }
            }
        }
    }
}

/// Dry-run backend that records operations instead of running them
#[derive(Debug, Default)]
pub struct RecordingInstaller {
    operations: Vec<Operation>,
    failures: HashSet<(OperationKind, String)>,
}

impl RecordingInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an operation on a package (by `name:arch` or bare name) fail
    pub fn fail_on(&mut self, kind: OperationKind, package: &str) {
        self.failures.insert((kind, package.to_string()));
    }

    /// Operations in execution order
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Position of the first operation of a kind on a package
    pub fn position(&self, kind: OperationKind, package: &str) -> Option<usize> {
        self.operations
            .iter()
            .position(|op| op.kind() == kind && matches_name(op.package(), package))
    }

    fn check(&self, kind: OperationKind, package: &Package) -> Result<()> {
        let full = package.full_name();
        if self.failures.contains(&(kind, full.clone()))
            || self.failures.contains(&(kind, package.name.clone()))
        {
            return Err(Error::operation(kind.as_str(), &full, "injected failure"));
        }
        Ok(())
    }

    fn record(&mut self, op: Operation) {
        info!("{}", op);
        self.operations.push(op);
    }
}

fn matches_name(full: &str, wanted: &str) -> bool {
    full == wanted || full.split_once(':').is_some_and(|(name, _)| name == wanted)
}

impl Installer for RecordingInstaller {
    fn unpack(&mut self, package: &Package, version: &Version, archive: &Path) -> Result<()> {
        debug!("Dry-run unpack of {}", package.full_name());
        self.check(OperationKind::Unpack, package)?;
        self.record(Operation::Unpack {
            package: package.full_name(),
            version: version.version.to_string(),
            archive: archive.to_path_buf(),
        });
        Ok(())
    }

    fn configure(&mut self, package: &Package) -> Result<()> {
        self.check(OperationKind::Configure, package)?;
        self.record(Operation::Configure {
            package: package.full_name(),
        });
        Ok(())
    }

    fn remove(&mut self, package: &Package, purge: bool) -> Result<()> {
        self.check(OperationKind::Remove, package)?;
        self.record(Operation::Remove {
            package: package.full_name(),
            purge,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DependencyGraph;
    use crate::version::DebVersion;

    #[test]
    fn test_records_in_order() {
        let mut graph = DependencyGraph::new();
        let pkg = graph.add_package("nginx", "amd64");
        let v = graph.add_version(pkg, DebVersion::parse("1.24.0-2").unwrap());

        let mut installer = RecordingInstaller::new();
        installer
            .unpack(graph.package(pkg), graph.version(v), Path::new("/var/cache/nginx.deb"))
            .unwrap();
        installer.configure(graph.package(pkg)).unwrap();
        installer.remove(graph.package(pkg), true).unwrap();

        let ops: Vec<String> = installer.operations().iter().map(|o| o.to_string()).collect();
        assert_eq!(
            ops,
            vec![
                "unpack nginx:amd64 1.24.0-2 (/var/cache/nginx.deb)",
                "configure nginx:amd64",
                "purge nginx:amd64",
            ]
        );
        assert_eq!(installer.position(OperationKind::Configure, "nginx"), Some(1));
    }

    #[test]
    fn test_injected_failure() {
        let mut graph = DependencyGraph::new();
        let pkg = graph.add_package("nginx", "amd64");

        let mut installer = RecordingInstaller::new();
        installer.fail_on(OperationKind::Configure, "nginx");
        let err = installer.configure(graph.package(pkg)).unwrap_err();
        assert!(err.to_string().contains("nginx:amd64"));
        assert!(installer.operations().is_empty());
    }
}
