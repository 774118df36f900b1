// tests/scenario.rs

//! Scenario and policy file loading.

mod common;

use installorder::{load_config, load_scenario, parse_scenario_string, ConfigureMode, Error};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_scenario_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[manager]
immediate_configure_all = true
configure = "smart"

{}
"#,
        common::CHAIN
    )
    .unwrap();

    let scenario = load_scenario(file.path()).unwrap();
    assert!(scenario.config.immediate_configure_all);
    assert_eq!(scenario.config.configure, ConfigureMode::Smart);
    assert_eq!(scenario.graph().package_count(), 3);
    assert_eq!(scenario.archives.len(), 3);

    let app = scenario.package("app").unwrap();
    assert!(scenario.cache.state(app).install());
}

#[test]
fn test_policy_file_round_trip() {
    let scenario = common::scenario(common::CHAIN);
    let mut config = scenario.config.clone();
    config.force_loop_break = true;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();
    assert_eq!(load_config(file.path()).unwrap(), config);
}

#[test]
fn test_explicit_archive_and_status() {
    let scenario = common::scenario(
        r#"
[[package]]
name = "half"
installed = "2"
status = "half-configured"

[[package]]
name = "tool"
target = "3"
archive = "/srv/pool/tool.deb"

[[package.version]]
version = "3"
"#,
    );
    let half = scenario.package("half").unwrap();
    let graph = scenario.graph();
    assert_eq!(graph.package(half).current_state.as_str(), "half-configured");

    // Configure-only packages need no archive
    assert_eq!(scenario.archives.len(), 1);
    assert_eq!(scenario.archives[0].1.to_str(), Some("/srv/pool/tool.deb"));

    // The half-configured package is listed but only configured
    let mut pm = scenario.into_manager(installorder::RecordingInstaller::new());
    assert!(pm.order_install().is_completed());
    assert_eq!(
        common::ops(&pm),
        ["unpack tool:amd64", "configure half:amd64", "configure tool:amd64"]
    );
}

#[test]
fn test_scenario_errors() {
    let err = parse_scenario_string(
        r#"
[[package]]
name = "x"
status = "exploded"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let err = parse_scenario_string(
        r#"
[[package]]
name = "x"

[[package.version]]
version = "1"
depends = ["y (>= )"]
"#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidVersion(_) | Error::InvalidDependency(_)));

    let err = parse_scenario_string("[[package]]\nname = 3\n").unwrap_err();
    assert!(matches!(err, Error::Toml(_)));

    assert!(load_scenario(std::path::Path::new("/nonexistent/scenario.toml")).is_err());
}
