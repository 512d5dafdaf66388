//! Operator version as a metric value

use crate::error::{Error, Result};

/// Encode `major.minor.patch` as `major + minor/100 + patch/10000`
///
/// A leading `v` and any pre-release or build suffix on the patch number
/// are ignored. Minor and patch must be below 100.
pub fn encode_version(version: &str) -> Result<f64> {
    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    let core = trimmed
        .split(['-', '+'])
        .next()
        .unwrap_or(trimmed);

    let parts: Vec<&str> = core.split('.').collect();
    let [major, minor, patch] = parts.as_slice() else {
        return Err(Error::VersionError(format!(
            "{version:?} is not major.minor.patch"
        )));
    };

    let parse = |part: &str| {
        part.parse::<u64>().map_err(|_| {
            Error::VersionError(format!("{version:?} has a non-numeric part {part:?}"))
        })
    };
    let (major, minor, patch) = (parse(*major)?, parse(*minor)?, parse(*patch)?);

    if minor >= 100 || patch >= 100 {
        return Err(Error::VersionError(format!(
            "{version:?}: minor and patch must be below 100"
        )));
    }

    Ok((major * 10_000 + minor * 100 + patch) as f64 / 10_000.0)
}
