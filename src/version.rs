//! Ordering of Kubernetes-style API version strings.
//!
//! Versions follow `v<major>[alpha|beta]<minor>`, e.g. `v1`, `v2beta1`,
//! `v1alpha3`. Alpha versions are never enabled by default in a cluster, so
//! they rank below every beta or stable version regardless of major.
//! Otherwise the larger major wins, then stable > beta, then the larger minor.

use std::{cmp::Ordering, fmt, str::FromStr};

use crate::error::{Error, Result};

/// Maturity channel of an API version, ordered from least to most mature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    Alpha,
    Beta,
    Stable,
}

/// A parsed API version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApiVersion {
    major: u32,
    channel: Channel,
    minor: u32,
}

impl ApiVersion {
    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Channel-local counter, `0` for stable versions.
    pub fn minor(&self) -> u32 {
        self.minor
    }

    fn rank(&self) -> (bool, u32, Channel, u32) {
        (
            self.channel != Channel::Alpha,
            self.major,
            self.channel,
            self.minor,
        )
    }
}

impl Ord for ApiVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for ApiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for ApiVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidVersion(s.to_string());

        let rest = s.strip_prefix('v').ok_or_else(invalid)?;
        let major_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        if major_len == 0 {
            return Err(invalid());
        }
        let (major, rest) = rest.split_at(major_len);
        let major = major.parse().map_err(|_| invalid())?;

        let (channel, minor) = if rest.is_empty() {
            (Channel::Stable, "")
        } else if let Some(minor) = rest.strip_prefix("alpha") {
            (Channel::Alpha, minor)
        } else if let Some(minor) = rest.strip_prefix("beta") {
            (Channel::Beta, minor)
        } else {
            return Err(invalid());
        };

        if !minor.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let minor = if minor.is_empty() {
            0
        } else {
            minor.parse().map_err(|_| invalid())?
        };

        Ok(ApiVersion {
            major,
            channel,
            minor,
        })
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.channel {
            Channel::Stable => write!(f, "v{}", self.major),
            Channel::Beta => write!(f, "v{}beta{}", self.major, self.minor),
            Channel::Alpha => write!(f, "v{}alpha{}", self.major, self.minor),
        }
    }
}

/// Compare two version strings.
///
/// # Errors
/// Returns [`Error::InvalidVersion`] when either side does not parse.
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering> {
    if a == b {
        // Still reject garbage compared against itself.
        a.parse::<ApiVersion>()?;
        return Ok(Ordering::Equal);
    }
    let a: ApiVersion = a.parse()?;
    let b: ApiVersion = b.parse()?;
    Ok(a.cmp(&b))
}

/// Pick the most preferred version out of `versions`.
pub fn latest<'a, I>(versions: I) -> Result<Option<&'a str>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(ApiVersion, &'a str)> = None;
    for raw in versions {
        let parsed: ApiVersion = raw.parse()?;
        match &best {
            Some((current, _)) if *current >= parsed => {}
            _ => best = Some((parsed, raw)),
        }
    }
    Ok(best.map(|(_, raw)| raw))
}
