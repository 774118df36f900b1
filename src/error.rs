// src/error.rs

//! Error types for transaction ordering
//!
//! Every fatal condition the ordering engine can hit is a variant here and
//! carries the name of the package it was detected on. Recoverable
//! conditions never become errors; they are logged as warnings instead.

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building, ordering, or executing a transaction
#[derive(Debug, Error)]
pub enum Error {
    /// The ordering sub-sort could not produce an order
    #[error("Internal ordering error: {0}")]
    Ordering(String),

    /// A package that should never be touched reached the dispatch step
    #[error("Internal error, trying to manipulate a kept package ({package})")]
    KeptPackage { package: String },

    /// SmartConfigure was entered for a package that is already configured
    #[error("Internal configure error on '{package}'")]
    AlreadyConfigured { package: String },

    /// A package could not be removed ahead of its scheduled position
    #[error("Internal error, could not early remove {package}")]
    EarlyRemove { package: String },

    /// Removing a reverse-conflicting package failed
    #[error("Reverse conflicts early remove for package '{package}' failed")]
    ReverseConflict { package: String },

    /// No alternative of a PreDepends group could be configured
    #[error("Couldn't configure pre-depend {target} for {package}, probably a dependency cycle")]
    PreDependCycle { target: String, package: String },

    /// Early removal of an essential package was refused by policy
    #[error(
        "This installation run will require temporarily removing the essential package {package} \
         due to a Conflicts/Pre-Depends loop. Enable force_loop_break to allow it"
    )]
    EssentialRemoval { package: String },

    /// A listed package was still unconfigured after the final sweep
    #[error("Internal error, packages left unconfigured: {package}")]
    Unconfigured { package: String },

    /// An archive was missing before anything had been processed
    #[error("Internal error, ordering was unable to handle the media swap at {package}")]
    MediaSwap { package: String },

    /// A primitive unpack/configure/remove operation failed
    #[error("Failed to {op} {package}: {reason}")]
    Operation {
        op: String,
        package: String,
        reason: String,
    },

    /// Version string could not be parsed
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// Dependency relation could not be parsed
    #[error("Invalid dependency: {0}")]
    InvalidDependency(String),

    /// A package name did not resolve to a known package
    #[error("Unknown package: {0}")]
    UnknownPackage(String),

    /// Configuration or scenario content was inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error while reading configuration or scenarios
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML could not be deserialized
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Build an [`Error::Operation`] for a failed primitive
    pub fn operation(op: &str, package: &str, reason: impl Into<String>) -> Self {
        Error::Operation {
            op: op.to_string(),
            package: package.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_package() {
        let err = Error::EssentialRemoval {
            package: "libc6".to_string(),
        };
        assert!(err.to_string().contains("libc6"));

        let err = Error::PreDependCycle {
            target: "dpkg".to_string(),
            package: "tar".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("dpkg"));
        assert!(msg.contains("tar"));
    }

    #[test]
    fn test_operation_helper() {
        let err = Error::operation("unpack", "nginx", "archive truncated");
        assert_eq!(err.to_string(), "Failed to unpack nginx: archive truncated");
    }
}
