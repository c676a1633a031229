//! Module pseudo-versions.
//!
//! A pseudo-version names an untagged commit as a version, for example
//! `v0.0.0-20191109021931-daa7c04131f5`. It has three forms:
//!
//! ```text
//! vX.0.0-yyyymmddhhmmss-abcdefabcdef          no earlier tag
//! vX.Y.(Z+1)-0.yyyymmddhhmmss-abcdefabcdef    after release vX.Y.Z
//! vX.Y.Z-pre.0.yyyymmddhhmmss-abcdefabcdef    after pre-release vX.Y.Z-pre
//! ```
//!
//! Any of them may carry `+build` metadata.

use std::sync::OnceLock;

use regex::Regex;

/// The parts of a pseudo-version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PseudoVersion {
    /// `vX.0.0`, `vX.Y.(Z+1)-0` or `vX.Y.Z-pre.0`.
    pub base: String,
    /// `yyyymmddhhmmss`, UTC.
    pub timestamp: String,
    /// Abbreviated revision.
    pub revision: String,
    /// Build metadata including the leading `+`, or empty.
    pub build: String,
}

fn pseudo_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^v[0-9]+\.(0\.0-|\d+\.\d+-([^+]*\.)?0\.)\d{14}-[A-Za-z0-9]+(\+[0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*)?$",
        )
        .unwrap()
    })
}

/// Reports whether `v` is a pseudo-version.
pub fn is_pseudo_version(v: &str) -> bool {
    v.matches('-').count() >= 2
        && v.strip_prefix('v')
            .is_some_and(|rest| semver::Version::parse(rest).is_ok())
        && pseudo_version_re().is_match(v)
}

/// Splits a pseudo-version into its parts, or returns `None` if `v` is not
/// one.
pub fn parse(v: &str) -> Option<PseudoVersion> {
    if !is_pseudo_version(v) {
        return None;
    }

    let (v, build) = match v.find('+') {
        Some(plus) => (&v[..plus], &v[plus..]),
        None => (v, ""),
    };
    let (v, revision) = v.rsplit_once('-')?;
    let dash = v.rfind('-')?;
    let (base, timestamp) = match v.rfind('.') {
        Some(dot) if dot > dash => (&v[..dot], &v[dot + 1..]),
        _ => (&v[..dash], &v[dash + 1..]),
    };

    Some(PseudoVersion {
        base: base.to_string(),
        timestamp: timestamp.to_string(),
        revision: revision.to_string(),
        build: build.to_string(),
    })
}

/// The revision a version refers to: the commit of a pseudo-version, or
/// `None` for a tagged release.
pub fn revision_from_version(v: &str) -> Option<String> {
    parse(v).map(|p| p.revision)
}
