//! SDK versions and the capabilities each one unlocks

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

/// A `major.minor.patch` SDK version. Missing components read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SdkVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SdkVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn parse(version: &str) -> Result<Self> {
        let trimmed = version.trim();
        if trimmed.is_empty() {
            return Err(Error::protocol("empty SDK version"));
        }

        let mut parts = [0u32; 3];
        for (i, part) in trimmed.split('.').enumerate() {
            if i >= 3 {
                return Err(Error::protocol(format!("invalid SDK version: {version}")));
            }
            parts[i] = part
                .parse()
                .map_err(|_| Error::protocol(format!("invalid SDK version: {version}")))?;
        }

        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl Ord for SdkVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl PartialOrd for SdkVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SdkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Editor features gated on the project's SDK version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    MultipleFiles,
    TypeScript,
    /// Dependencies declared through a manifest file instead of imports
    ProjectDependencies,
}

impl Feature {
    /// First SDK version shipping this feature
    pub fn minimum_version(&self) -> SdkVersion {
        match self {
            Feature::MultipleFiles => SdkVersion::new(21, 0, 0),
            Feature::TypeScript => SdkVersion::new(31, 0, 0),
            Feature::ProjectDependencies => SdkVersion::new(35, 0, 0),
        }
    }
}

/// Whether `feature` is available at `sdk_version`.
///
/// Unparseable versions support nothing.
pub fn is_feature_supported(feature: Feature, sdk_version: &str) -> bool {
    match SdkVersion::parse(sdk_version) {
        Ok(version) => version >= feature.minimum_version(),
        Err(_) => {
            tracing::debug!("Unparseable SDK version {:?}", sdk_version);
            false
        }
    }
}
