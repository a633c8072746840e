//! Mirth server version numbers
//!
//! Versions are reported as `major.minor[.fix[.build]]`, e.g. `3.4.2.8029`.

use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

static VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\.(\d+)(?:\.(\d*))?(?:\.(\d*))?").expect("valid regex"));

/// A parsed Mirth version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MirthVersion {
    pub major: u32,
    pub minor: u32,
    pub fix: u32,
    pub build: u32,
}

impl MirthVersion {
    /// Parse a version string, returning `None` if it has no `major.minor` part
    pub fn parse(version: &str) -> Option<Self> {
        let captures = VERSION_PATTERN.captures(version)?;
        let number = |index: usize| {
            captures
                .get(index)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(0)
        };

        Some(Self {
            major: captures.get(1)?.as_str().parse().ok()?,
            minor: captures.get(2)?.as_str().parse().ok()?,
            fix: number(3),
            build: number(4),
        })
    }

    /// Version without build number, as understood by the Mirth web service API
    pub fn api_version(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.fix)
    }
}

impl Ord for MirthVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.fix, self.build).cmp(&(
            other.major,
            other.minor,
            other.fix,
            other.build,
        ))
    }
}

impl PartialOrd for MirthVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MirthVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.fix, self.build)
    }
}

/// Human readable form of a raw version string, dropping the build number when parseable
pub fn display_version(raw: &str) -> String {
    match MirthVersion::parse(raw) {
        Some(version) => version.api_version(),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_version() {
        let version = MirthVersion::parse("3.4.2.8029").unwrap();
        assert_eq!(version.major, 3);
        assert_eq!(version.minor, 4);
        assert_eq!(version.fix, 2);
        assert_eq!(version.build, 8029);
        assert_eq!(version.api_version(), "3.4.2");
    }

    #[test]
    fn test_parse_short_versions() {
        let version = MirthVersion::parse("3.4").unwrap();
        assert_eq!((version.fix, version.build), (0, 0));

        let trailing_dot = MirthVersion::parse("4.5.").unwrap();
        assert_eq!(trailing_dot.api_version(), "4.5.0");

        assert!(MirthVersion::parse("unknown").is_none());
    }

    #[test]
    fn test_ordering() {
        let older = MirthVersion::parse("3.12.0").unwrap();
        let newer = MirthVersion::parse("4.0.1").unwrap();
        assert!(older < newer);
        assert!(MirthVersion::parse("3.4.2.8029").unwrap() > MirthVersion::parse("3.4.2").unwrap());
    }

    #[test]
    fn test_display_version_falls_back_to_raw() {
        assert_eq!(display_version("3.9.1.2345"), "3.9.1");
        assert_eq!(display_version("n/a"), "n/a");
    }
}
