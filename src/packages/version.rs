//! Package version ordering

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Number(u64),
    Text(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        match raw.parse::<u64>() {
            Ok(n) => Segment::Number(n),
            Err(_) => Segment::Text(raw.to_string()),
        }
    }

    fn is_zero(&self) -> bool {
        matches!(self, Segment::Number(0))
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Number(a), Segment::Number(b)) => a.cmp(b),
            (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
            // Numeric segments sort before textual ones
            (Segment::Number(_), Segment::Text(_)) => Ordering::Less,
            (Segment::Text(_), Segment::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dotted package version such as `1.2`, `v2.0.1` or `1.1-beta.2`.
///
/// Numeric segments compare numerically, others lexically; missing trailing
/// segments count as zero, so `1.0 == 1.0.0`. Anything after the first `-`
/// is a pre-release tag: `1.1-beta < 1.1 < 1.1.1`, and tags of the same
/// release compare segment by segment.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    raw: String,
    segments: Vec<Segment>,
    /// `None` for a final release
    pre_release: Option<Vec<Segment>>,
}

fn parse_segments(body: &str) -> Vec<Segment> {
    body.split('.')
        .filter(|s| !s.is_empty())
        .map(Segment::parse)
        .collect()
}

impl PackageVersion {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let (release, pre_release) = match body.split_once('-') {
            Some((release, tag)) => (release, Some(parse_segments(tag))),
            None => (body, None),
        };

        let mut segments = parse_segments(release);
        while segments.last().is_some_and(Segment::is_zero) {
            segments.pop();
        }

        Self {
            raw: trimmed.to_string(),
            segments,
            pre_release,
        }
    }

    /// Version as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // Trailing zeros are trimmed at parse time, so plain lexicographic
        // order over segments treats `1.0` and `1.0.0` as equal.
        self.segments
            .cmp(&other.segments)
            .then_with(|| match (&self.pre_release, &other.pre_release) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl FromStr for PackageVersion {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for PackageVersion {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for PackageVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for PackageVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}
