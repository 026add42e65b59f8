//! System versions and the compatibility gate applied to every script.
//!
//! A [`Version`] is a sequence of numeric segments compared segment-wise,
//! so `1.10` sorts after `1.9` and `2.0` equals `2.0.0`. A trailing
//! non-numeric tag (`2.0.dev`, `3.1rc1`, `1.2.3-beta`) marks a pre-release,
//! which sorts before the release with the same segments.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::descriptor::ScriptDescriptor;
use crate::error::{RegistryError, Result};

/// Version of this build, used as the running system version by default.
pub const SYSTEM_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A parsed version with a total ordering.
#[derive(Debug, Clone)]
pub struct Version {
    segments: Vec<u64>,
    pre: Option<String>,
}

impl Version {
    /// Build a release version from numeric segments.
    pub fn new(segments: impl Into<Vec<u64>>) -> Self {
        Version {
            segments: segments.into(),
            pre: None,
        }
    }

    /// Parse a version string such as `2.1.0`, `v3`, or `2.0.dev`.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |detail: &str| RegistryError::InvalidVersion {
            input: input.to_string(),
            detail: detail.to_string(),
        };

        let trimmed = input.trim();
        let body = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        if body.is_empty() {
            return Err(invalid("empty version"));
        }

        let mut segments = Vec::new();
        let mut pre = None;
        let mut parts = body.split('.');
        while let Some(part) = parts.next() {
            if part.is_empty() {
                return Err(invalid("empty segment"));
            }
            let digits_end = part
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(part.len());
            let (digits, rest) = part.split_at(digits_end);

            if !digits.is_empty() {
                let value = digits
                    .parse::<u64>()
                    .map_err(|e| invalid(&format!("segment '{digits}': {e}")))?;
                segments.push(value);
            }

            if !rest.is_empty() {
                let mut tag = rest.trim_start_matches(['-', '_', '+']).to_string();
                for remaining in parts.by_ref() {
                    tag.push('.');
                    tag.push_str(remaining);
                }
                if tag.is_empty() {
                    return Err(invalid("empty pre-release tag"));
                }
                pre = Some(tag.to_ascii_lowercase());
                break;
            }
        }

        if segments.is_empty() {
            return Err(invalid("no numeric segments"));
        }
        Ok(Version { segments, pre })
    }

    /// Numeric segments as written.
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    /// Whether this is a pre-release (carries a non-numeric tag).
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl FromStr for Version {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .segments
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        match &self.pre {
            Some(tag) => write!(f, "{joined}.{tag}"),
            None => write!(f, "{joined}"),
        }
    }
}

/// Decide whether a script may run on the `current` system version.
///
/// Scripts without a minimum version are always compatible. An incompatible
/// or unreadable minimum is reported as a warning and excludes the script.
pub fn is_compatible(script: &ScriptDescriptor, current: &Version) -> bool {
    meets_minimum(&script.name, script.minimum_version.as_deref(), current)
}

/// Version check on raw fields, used before a descriptor exists.
pub fn meets_minimum(name: &str, minimum: Option<&str>, current: &Version) -> bool {
    let Some(minimum) = minimum else {
        return true;
    };

    match Version::parse(minimum) {
        Ok(required) if *current >= required => true,
        Ok(_) => {
            warn!(
                "{name} is supported by retriever version {minimum}; current version is {current}"
            );
            false
        }
        Err(e) => {
            warn!("{name} declares an unreadable minimum version, skipping: {e}");
            false
        }
    }
}
