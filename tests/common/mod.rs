// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use installorder::{
    parse_scenario_string, DepCache, OrderSorter, PackageId, PackageManager, RecordingInstaller,
    Result, Scenario,
};

/// Parse a scenario, panicking on malformed fixtures
pub fn scenario(toml: &str) -> Scenario {
    parse_scenario_string(toml).unwrap()
}

/// Build a dry-run manager over a scenario
pub fn manager(toml: &str) -> PackageManager<RecordingInstaller> {
    scenario(toml).into_manager(RecordingInstaller::new())
}

/// Build a manager whose installer fails on the given operations
pub fn manager_with(toml: &str, installer: RecordingInstaller) -> PackageManager<RecordingInstaller> {
    scenario(toml).into_manager(installer)
}

/// Operations as `kind name:arch`, without versions or archive paths
pub fn ops(pm: &PackageManager<RecordingInstaller>) -> Vec<String> {
    pm.installer()
        .operations()
        .iter()
        .map(|op| format!("{} {}", op.kind().as_str(), op.package()))
        .collect()
}

/// Look up a package by `name` or `name:arch`
pub fn package(pm: &PackageManager<RecordingInstaller>, spec: &str) -> PackageId {
    let graph = pm.cache().graph();
    match spec.split_once(':') {
        Some((name, arch)) => graph.find(name, arch),
        None => graph.find_all(spec).first().copied(),
    }
    .unwrap()
}

/// Sorter that keeps the list in scenario order
pub struct InputOrder;

impl OrderSorter for InputOrder {
    fn order_unpack(&mut self, _cache: &DepCache, packages: &[PackageId]) -> Result<Vec<PackageId>> {
        Ok(packages.to_vec())
    }

    fn order_critical(
        &mut self,
        _cache: &DepCache,
        packages: &[PackageId],
    ) -> Result<Vec<PackageId>> {
        Ok(packages.to_vec())
    }

    fn order_configure(
        &mut self,
        _cache: &DepCache,
        packages: &[PackageId],
    ) -> Result<Vec<PackageId>> {
        Ok(packages.to_vec())
    }
}

/// Fresh install of `app`, which depends on `lib`, which pre-depends on `base`
pub const CHAIN: &str = r#"
[[package]]
name = "app"
action = "install"

[[package.version]]
version = "1.0"
depends = ["lib"]

[[package]]
name = "lib"
action = "install"

[[package.version]]
version = "1.0"
pre_depends = ["base"]

[[package]]
name = "base"
action = "install"

[[package.version]]
version = "1.0"
"#;

/// `a` pre-depends on `b`, `b` conflicts with the installed `c`,
/// and the new `c` depends on `a`
pub const THREE_CYCLE: &str = r#"
[[package]]
name = "a"
action = "install"

[[package.version]]
version = "1"
pre_depends = ["b"]

[[package]]
name = "b"
action = "install"

[[package.version]]
version = "1"
conflicts = ["c (<< 2)"]

[[package]]
name = "c"
installed = "1"
target = "2"

[[package.version]]
version = "1"

[[package.version]]
version = "2"
depends = ["a"]
"#;

/// New `x`, while the installed essential `e` (being upgraded) conflicts with it
pub const ESSENTIAL_CONFLICT: &str = r#"
[[package]]
name = "x"
action = "install"

[[package.version]]
version = "1"

[[package]]
name = "e"
essential = true
installed = "1"
target = "2"

[[package.version]]
version = "1"
conflicts = ["x"]

[[package.version]]
version = "2"
"#;
