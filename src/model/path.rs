use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A `/`-delimited repository path made of non-empty segments.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoPath(Vec<String>);

impl RepoPath {
    /// Parse a `/`-delimited path. Backslashes are treated as separators.
    ///
    /// Leading, trailing or repeated separators produce an empty segment and
    /// are rejected, as are `.` and `..`.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.is_empty() {
            return Err(ValidationError::EmptyPath);
        }
        let normalized = raw.replace('\\', "/");
        Self::from_segments(normalized.split('/').map(str::to_string))
    }

    pub fn from_segments<I, S>(segments: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(ValidationError::EmptyPath);
        }
        for segment in &segments {
            if segment.is_empty() {
                return Err(ValidationError::EmptySegment {
                    path: segments.join("/"),
                });
            }
            if segment == "." || segment == ".." {
                return Err(ValidationError::ReservedSegment {
                    path: segments.join("/"),
                    segment: segment.clone(),
                });
            }
            if segment.contains(['/', '\\']) {
                return Err(ValidationError::SeparatorInSegment {
                    path: segments.join("/"),
                    segment: segment.clone(),
                });
            }
        }
        Ok(Self(segments))
    }

    /// Wrap segments already known to be valid, such as names taken from a
    /// built tree.
    pub(crate) fn from_trusted(segments: Vec<String>) -> Self {
        debug_assert!(!segments.is_empty());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Last segment.
    pub fn name(&self) -> &str {
        // Construction guarantees at least one segment.
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn parent_segments(&self) -> &[String] {
        &self.0[..self.0.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// The first `len` segments as a path of their own.
    pub fn prefix(&self, len: usize) -> RepoPath {
        let len = len.clamp(1, self.0.len());
        RepoPath(self.0[..len].to_vec())
    }

    pub fn join(&self, name: &str) -> Result<RepoPath, ValidationError> {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self::from_segments(segments)
    }

    pub fn to_slash_string(&self) -> String {
        self.0.join("/")
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl TryFrom<String> for RepoPath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RepoPath::parse(&value)
    }
}

impl From<RepoPath> for String {
    fn from(value: RepoPath) -> Self {
        value.to_slash_string()
    }
}

impl std::str::FromStr for RepoPath {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RepoPath::parse(s)
    }
}

#[cfg(test)]
#[path = "../tests/model/path_tests.rs"]
mod tests;
