// src/observer.rs

//! Decision-point hook for the ordering engine
//!
//! The engine reports each decision it takes to an [`OrderObserver`].
//! Decisions include entering a driver, picking a conflict branch, and
//! early removals. Implementations:
//! - `LogObserver`: forwards events to tracing at debug level
//! - `SilentObserver`: discards everything
//! - `CallbackObserver`: hands events to a closure (tests, embedding)

use std::fmt;
use tracing::debug;

/// A decision taken by the ordering engine
///
/// Package fields carry `name:arch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderEvent<'a> {
    /// Package flagged for immediate configuration
    ImmediateMarked { package: &'a str },
    /// SmartUnpack entered
    UnpackStart { package: &'a str, immediate: bool },
    /// SmartConfigure entered
    ConfigureStart { package: &'a str },
    /// A PreDepends group was satisfied by `target`
    PreDependSatisfied { package: &'a str, target: &'a str },
    /// Conflicting package gets unpacked first so the conflict clears
    ConflictUnpackFirst { package: &'a str, target: &'a str },
    /// Conflicting package gets removed early
    ConflictEarlyRemove { package: &'a str, target: &'a str },
    /// Conflict inside an active loop broken by early removal
    KnotRemove { package: &'a str, target: &'a str },
    /// Broken package gets unpacked first
    BreakUnpackFirst { package: &'a str, target: &'a str },
    /// Broken package slated for deletion gets removed now
    BreakRemove { package: &'a str, target: &'a str },
    /// Dependency force-unpacked to break a configure cycle
    LoopBreakUnpack { package: &'a str, target: &'a str },
    /// Package removed ahead of its position
    EarlyRemove { package: &'a str },
    /// Package skipped because it was already handled
    Skipped { package: &'a str },
    /// Walk stopped at a package whose archive is missing
    MissingArchive { package: &'a str },
    /// Recoverable problem, the run continues
    Warning { package: &'a str, message: &'a str },
}

impl fmt::Display for OrderEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderEvent::ImmediateMarked { package } => write!(f, "{} is immediate", package),
            OrderEvent::UnpackStart { package, immediate } => {
                write!(f, "SmartUnpack {}", package)?;
                if *immediate {
                    write!(f, " (immediate)")?;
                }
                Ok(())
            }
            OrderEvent::ConfigureStart { package } => write!(f, "SmartConfigure {}", package),
            OrderEvent::PreDependSatisfied { package, target } => {
                write!(f, "{} pre-depends on {}, satisfied", package, target)
            }
            OrderEvent::ConflictUnpackFirst { package, target } => {
                write!(f, "{} conflicts with {}, unpacking it first", package, target)
            }
            OrderEvent::ConflictEarlyRemove { package, target } => {
                write!(f, "{} conflicts with {}, removing it early", package, target)
            }
            OrderEvent::KnotRemove { package, target } => {
                write!(f, "Loop between {} and {}, removing {}", package, target, target)
            }
            OrderEvent::BreakUnpackFirst { package, target } => {
                write!(f, "{} breaks {}, unpacking it first", package, target)
            }
            OrderEvent::BreakRemove { package, target } => {
                write!(f, "{} breaks {}, removing it", package, target)
            }
            OrderEvent::LoopBreakUnpack { package, target } => {
                write!(f, "Unpacking {} to break a configure loop at {}", target, package)
            }
            OrderEvent::EarlyRemove { package } => write!(f, "Early removing {}", package),
            OrderEvent::Skipped { package } => write!(f, "Skipping {}", package),
            OrderEvent::MissingArchive { package } => {
                write!(f, "Archive for {} is missing", package)
            }
            OrderEvent::Warning { package, message } => write!(f, "{}: {}", package, message),
        }
    }
}

/// Receiver of engine decisions
pub trait OrderObserver {
    fn on_event(&mut self, event: &OrderEvent<'_>);
}

/// Observer that logs events via tracing
///
/// Warnings are skipped; the engine already emits those with `warn!`.
#[derive(Debug, Default)]
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

impl OrderObserver for LogObserver {
    fn on_event(&mut self, event: &OrderEvent<'_>) {
        if !matches!(event, OrderEvent::Warning { .. }) {
            debug!("{}", event);
        }
    }
}

/// Observer that discards everything
#[derive(Debug, Default)]
pub struct SilentObserver;

impl SilentObserver {
    pub fn new() -> Self {
        Self
    }
}

impl OrderObserver for SilentObserver {
    fn on_event(&mut self, _event: &OrderEvent<'_>) {}
}

/// Observer that forwards events to a closure
pub struct CallbackObserver<F>
where
    F: FnMut(&OrderEvent<'_>),
{
    callback: F,
}

impl<F> CallbackObserver<F>
where
    F: FnMut(&OrderEvent<'_>),
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> OrderObserver for CallbackObserver<F>
where
    F: FnMut(&OrderEvent<'_>),
{
    fn on_event(&mut self, event: &OrderEvent<'_>) {
        (self.callback)(event);
    }
}
