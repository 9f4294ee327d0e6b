//! Release directory naming.
//!
//! Releases are directories named `release-<YYYYMMDD>.<sequence>`.
//! Ordering is numeric on `(date, sequence)`, so `release-20240101.10`
//! sorts after `release-20240101.9`.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use thiserror::Error;

const PREFIX: &str = "release-";

/// Identifier of one release directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReleaseId {
    pub date: NaiveDate,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{0}` is not a release directory name")]
pub struct InvalidReleaseName(pub String);

impl ReleaseId {
    pub fn new(date: NaiveDate, sequence: u32) -> Self {
        Self { date, sequence }
    }

    /// First release of `today`.
    pub fn first_of(today: NaiveDate) -> Self {
        Self::new(today, 1)
    }

    /// The release to create after `latest`.
    ///
    /// Continues the sequence of `latest` while its date is not in the
    /// past; otherwise starts over at `today`.
    pub fn next_after(latest: Option<ReleaseId>, today: NaiveDate) -> Self {
        match latest {
            Some(latest) if latest.date >= today => {
                Self::new(latest.date, latest.sequence.saturating_add(1))
            }
            _ => Self::first_of(today),
        }
    }

    /// Directory name of this release.
    pub fn dir_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}.{}", PREFIX, self.date.format("%Y%m%d"), self.sequence)
    }
}

impl FromStr for ReleaseId {
    type Err = InvalidReleaseName;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidReleaseName(name.to_string());

        let rest = name.strip_prefix(PREFIX).ok_or_else(invalid)?;
        let (date, sequence) = rest.split_once('.').ok_or_else(invalid)?;
        if date.len() != 8 || !all_digits(date) || !all_digits(sequence) {
            return Err(invalid());
        }

        let year = date[0..4].parse().map_err(|_| invalid())?;
        let month = date[4..6].parse().map_err(|_| invalid())?;
        let day = date[6..8].parse().map_err(|_| invalid())?;
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
        let sequence = sequence.parse().map_err(|_| invalid())?;

        Ok(Self { date, sequence })
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Greatest release directory under `root`.
///
/// Entries that do not parse as a release name, or are not directories,
/// are skipped. A missing `root` has no releases.
pub fn latest_release(root: &Path) -> io::Result<Option<ReleaseId>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut latest = None;
    for entry in entries {
        let entry = entry?;
        let Some(id) = entry.file_name().to_str().and_then(|n| n.parse::<ReleaseId>().ok()) else {
            continue;
        };
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if latest.map_or(true, |current| id > current) {
            latest = Some(id);
        }
    }
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let id: ReleaseId = "release-20240101.12".parse().unwrap();
        assert_eq!(id, ReleaseId::new(date(2024, 1, 1), 12));
        assert_eq!(id.to_string(), "release-20240101.12");
    }

    #[test]
    fn test_rejects_malformed_names() {
        for name in [
            "release-1.0.0",
            "release-2.0.0-beta",
            "release-20011225",
            "release-20011225.",
            "release-20011325.1",
            "release-2001122.1",
            "release-20011225.1a",
            "current",
        ] {
            assert!(name.parse::<ReleaseId>().is_err(), "{} should not parse", name);
        }
    }

    #[test]
    fn test_numeric_ordering() {
        let a: ReleaseId = "release-20240101.9".parse().unwrap();
        let b: ReleaseId = "release-20240101.10".parse().unwrap();
        let c: ReleaseId = "release-20231231.99".parse().unwrap();
        assert!(b > a);
        assert!(a > c);
    }

    #[test]
    fn test_next_after() {
        let today = date(2024, 1, 1);
        let latest = ReleaseId::new(today, 2);
        assert_eq!(ReleaseId::next_after(Some(latest), today), ReleaseId::new(today, 3));
        assert_eq!(
            ReleaseId::next_after(Some(latest), date(2024, 1, 2)),
            ReleaseId::new(date(2024, 1, 2), 1)
        );
        assert_eq!(ReleaseId::next_after(None, today), ReleaseId::first_of(today));
    }

    #[test]
    fn test_latest_release_scan() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["release-20240101.1", "release-20240101.2", "release-20231231.9", "not-a-release"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("release-20250101.1"), "file, not a dir").unwrap();

        let latest = latest_release(dir.path()).unwrap();
        assert_eq!(latest, Some(ReleaseId::new(date(2024, 1, 1), 2)));
    }

    #[test]
    fn test_latest_release_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(latest_release(&dir.path().join("absent")).unwrap(), None);
    }
}
