// src/version/mod.rs

//! Version handling and relation checks for package dependencies
//!
//! Versions follow the Debian `[epoch:]upstream[-revision]` format and are
//! compared with the dpkg algorithm. Relations use Debian operators
//! (`<<`, `<=`, `=`, `>=`, `>>`) plus `!=`.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A parsed Debian version with epoch, upstream, and revision components
#[derive(Debug, Clone)]
pub struct DebVersion {
    pub epoch: u64,
    pub upstream: String,
    pub revision: Option<String>,
}

impl DebVersion {
    /// Parse a Debian version string
    ///
    /// Format: [epoch:]upstream[-revision]
    /// Examples:
    /// - "1.2.3" → epoch=0, upstream="1.2.3", revision=None
    /// - "2:1.2.3" → epoch=2, upstream="1.2.3", revision=None
    /// - "1.2.3-4" → epoch=0, upstream="1.2.3", revision=Some("4")
    /// - "1:2.3-1-2ubuntu1" → epoch=1, upstream="2.3-1", revision=Some("2ubuntu1")
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidVersion("empty version string".to_string()));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(Error::InvalidVersion(format!(
                "version '{}' contains whitespace",
                s
            )));
        }

        let (epoch, rest) = match s.split_once(':') {
            Some((e, r)) => {
                let epoch = if e.is_empty() {
                    0
                } else {
                    e.parse::<u64>().map_err(|err| {
                        Error::InvalidVersion(format!("invalid epoch in '{}': {}", s, err))
                    })?
                };
                (epoch, r)
            }
            None => (0, s),
        };

        // The revision is everything after the last hyphen
        let (upstream, revision) = match rest.rfind('-') {
            Some(pos) => (&rest[..pos], Some(rest[pos + 1..].to_string())),
            None => (rest, None),
        };

        if upstream.is_empty() {
            return Err(Error::InvalidVersion(format!(
                "empty upstream version in '{}'",
                s
            )));
        }
        if revision.as_deref() == Some("") {
            return Err(Error::InvalidVersion(format!("empty revision in '{}'", s)));
        }

        Ok(Self {
            epoch,
            upstream: upstream.to_string(),
            revision,
        })
    }

    /// Compare two versions using dpkg ordering rules
    pub fn compare(&self, other: &DebVersion) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| verrevcmp(&self.upstream, &other.upstream))
            .then_with(|| {
                verrevcmp(
                    self.revision.as_deref().unwrap_or("0"),
                    other.revision.as_deref().unwrap_or("0"),
                )
            })
    }
}

/// Weight of a non-digit character in dpkg comparisons
fn char_order(c: Option<u8>) -> i32 {
    match c {
        None => 0,
        Some(b'~') => -1,
        Some(c) if c.is_ascii_digit() => 0,
        Some(c) if c.is_ascii_alphabetic() => i32::from(c),
        Some(c) => i32::from(c) + 256,
    }
}

fn verrevcmp(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0, 0);

    while i < a.len() || j < b.len() {
        // Non-digit prefix, character by character
        while (i < a.len() && !a[i].is_ascii_digit()) || (j < b.len() && !b[j].is_ascii_digit()) {
            let ac = char_order(a.get(i).copied());
            let bc = char_order(b.get(j).copied());
            if ac != bc {
                return ac.cmp(&bc);
            }
            i += 1;
            j += 1;
        }

        while i < a.len() && a[i] == b'0' {
            i += 1;
        }
        while j < b.len() && b[j] == b'0' {
            j += 1;
        }

        // Numeric run: longer run wins, otherwise first differing digit
        let mut first_diff = Ordering::Equal;
        while i < a.len() && a[i].is_ascii_digit() && j < b.len() && b[j].is_ascii_digit() {
            if first_diff == Ordering::Equal {
                first_diff = a[i].cmp(&b[j]);
            }
            i += 1;
            j += 1;
        }
        if i < a.len() && a[i].is_ascii_digit() {
            return Ordering::Greater;
        }
        if j < b.len() && b[j].is_ascii_digit() {
            return Ordering::Less;
        }
        if first_diff != Ordering::Equal {
            return first_diff;
        }
    }

    Ordering::Equal
}

impl fmt::Display for DebVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.upstream)?;
        if let Some(ref revision) = self.revision {
            write!(f, "-{}", revision)?;
        }
        Ok(())
    }
}

impl FromStr for DebVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialEq for DebVersion {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for DebVersion {}

impl Ord for DebVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for DebVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Version relation attached to a dependency edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Unversioned relation
    Any,
    /// `<<`
    LessThan(DebVersion),
    /// `<=` (legacy `<` is read as `<=`)
    LessOrEqual(DebVersion),
    /// `=`
    Exact(DebVersion),
    /// `>=` (legacy `>` is read as `>=`)
    GreaterOrEqual(DebVersion),
    /// `>>`
    GreaterThan(DebVersion),
    /// `!=`
    NotEqual(DebVersion),
}

impl VersionConstraint {
    /// Parse the inside of a Debian relation, e.g. `>= 1.2-3`
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() || s == "*" {
            return Ok(VersionConstraint::Any);
        }

        // Longest operators first so "<<" is not read as "<"
        let operators: [(&str, fn(DebVersion) -> VersionConstraint); 9] = [
            ("<<", VersionConstraint::LessThan),
            ("<=", VersionConstraint::LessOrEqual),
            (">>", VersionConstraint::GreaterThan),
            (">=", VersionConstraint::GreaterOrEqual),
            ("!=", VersionConstraint::NotEqual),
            ("=", VersionConstraint::Exact),
            ("<", VersionConstraint::LessOrEqual),
            (">", VersionConstraint::GreaterOrEqual),
            ("", VersionConstraint::Exact),
        ];

        for (op, build) in operators {
            if let Some(rest) = s.strip_prefix(op) {
                let version = DebVersion::parse(rest.trim())?;
                return Ok(build(version));
            }
        }

        Err(Error::InvalidDependency(format!("bad version relation '{}'", s)))
    }

    /// Check a (possibly missing) version against this relation
    ///
    /// An unversioned relation matches anything, including a missing
    /// version. A versioned relation never matches a missing version, which
    /// is how unversioned provides fail versioned dependencies.
    pub fn satisfied_by(&self, version: Option<&DebVersion>) -> bool {
        let Some(version) = version else {
            return matches!(self, VersionConstraint::Any);
        };

        match self {
            VersionConstraint::Any => true,
            VersionConstraint::LessThan(v) => version < v,
            VersionConstraint::LessOrEqual(v) => version <= v,
            VersionConstraint::Exact(v) => version == v,
            VersionConstraint::GreaterOrEqual(v) => version >= v,
            VersionConstraint::GreaterThan(v) => version > v,
            VersionConstraint::NotEqual(v) => version != v,
        }
    }

    /// True for the unversioned relation
    pub fn is_any(&self) -> bool {
        matches!(self, VersionConstraint::Any)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => write!(f, "*"),
            VersionConstraint::LessThan(v) => write!(f, "<< {}", v),
            VersionConstraint::LessOrEqual(v) => write!(f, "<= {}", v),
            VersionConstraint::Exact(v) => write!(f, "= {}", v),
            VersionConstraint::GreaterOrEqual(v) => write!(f, ">= {}", v),
            VersionConstraint::GreaterThan(v) => write!(f, ">> {}", v),
            VersionConstraint::NotEqual(v) => write!(f, "!= {}", v),
        }
    }
}
