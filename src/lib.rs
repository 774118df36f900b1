// src/lib.rs

//! Installorder: package transaction ordering
//!
//! Takes the decisions of a dependency resolver (install, upgrade, remove,
//! purge, keep) and turns them into a safe sequence of unpack, configure,
//! and remove operations for a dpkg-style installer.
//!
//! # Architecture
//!
//! - Graph: packages, versions, and Debian relations, indexed both ways
//! - DepCache: what the resolver decided for each package
//! - Order list: the packages that change, with per-run state flags
//! - Manager: sorts the list and drives it, breaking cycles on the fly
//! - Installer: the primitive operations, behind a trait

pub mod cache;
pub mod config;
mod error;
pub mod graph;
pub mod installer;
pub mod manager;
pub mod observer;
pub mod order;
pub mod problem;
pub mod scenario;
pub mod version;

pub use cache::{DepCache, StateEntry};
pub use config::{load_config, ConfigureMode, ManagerConfig};
pub use error::{Error, Result};
pub use graph::{CurrentState, DepKind, DependencyGraph, MultiArch, PackageId, VersionId};
pub use installer::{Installer, Operation, OperationKind, RecordingInstaller};
pub use manager::{ArchiveRequest, OrderResult, PackageManager};
pub use observer::{CallbackObserver, LogObserver, OrderEvent, OrderObserver, SilentObserver};
pub use order::{OrderFlags, OrderList, OrderSorter, TopoSorter};
pub use problem::{KeepResolver, ProblemResolver};
pub use scenario::{load_scenario, parse_scenario_string, Scenario};
pub use version::{DebVersion, VersionConstraint};
