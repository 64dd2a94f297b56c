//! Version inference from APK filenames.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::constants::DEFAULT_VERSION;

lazy_static! {
    static ref VERSION_PATTERN: Regex =
        Regex::new(r"v?(\d+\.\d+\.\d+)").expect("version pattern is valid");
}

/// A dotted `major.minor.patch` version found in a filename.
///
/// The matched text is kept verbatim (leading zeros included) so that the
/// reported version is always a substring of the filename it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemVer(String);

impl SemVer {
    /// First `v?\d+.\d+.\d+` occurrence anywhere in `filename`, without the
    /// optional `v` prefix.
    pub fn from_filename(filename: &str) -> Option<Self> {
        VERSION_PATTERN
            .captures(filename)
            .and_then(|caps| caps.get(1))
            .map(|m| Self(m.as_str().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Version for `filename`, falling back to [`DEFAULT_VERSION`] when the name
/// carries none.
pub fn version_or_default(filename: &str) -> String {
    SemVer::from_filename(filename)
        .map(|v| v.to_string())
        .unwrap_or_else(|| DEFAULT_VERSION.to_string())
}

/// Integer version code: dots removed, leading digits parsed.
///
/// `"1.2.3"` becomes `123`; a version without leading digits yields `0`.
pub fn version_code(version: &str) -> i64 {
    let digits: String = version
        .trim()
        .chars()
        .filter(|c| *c != '.')
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_from_prefixed_filename() {
        let v = SemVer::from_filename("mParivahanv2.10.3.apk").unwrap();
        assert_eq!(v.as_str(), "2.10.3");
    }

    #[test]
    fn test_version_first_match_wins() {
        let v = SemVer::from_filename("app-1.2.3-build-4.5.6.apk").unwrap();
        assert_eq!(v.to_string(), "1.2.3");
    }

    #[test]
    fn test_version_is_substring_of_filename() {
        let name = "release_01.02.0003_final.apk";
        let v = SemVer::from_filename(name).unwrap();
        assert!(name.contains(v.as_str()));
    }

    #[test]
    fn test_version_absent() {
        assert!(SemVer::from_filename("mParivahan.apk").is_none());
        assert!(SemVer::from_filename("app-1.2.apk").is_none());
        assert_eq!(version_or_default("mParivahan.apk"), DEFAULT_VERSION);
    }

    #[test]
    fn test_version_code() {
        assert_eq!(version_code("1.2.3"), 123);
        assert_eq!(version_code("2.10.0"), 2100);
        assert_eq!(version_code("1.0.0-beta"), 100);
        assert_eq!(version_code("beta"), 0);
        assert_eq!(version_code(""), 0);
    }
}
