//! Shared types for groupspace
//!
//! This crate provides the value types used across the groupspace
//! workspace: remote node identifiers, group paths and the name rules
//! every path segment must satisfy.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Separator between the segments of a group path
pub const PATH_SEPARATOR: char = '/';

/// Reserved for the `community;path;role` encoding used by the messaging layer
pub const EXPRESSION_SEPARATOR: char = ';';

/// Errors raised when a community or group name is malformed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("community name is empty")]
    EmptyCommunity,

    #[error("community name '{0}' cannot contain a '{1}' character")]
    IllegalCommunityChar(String, char),

    #[error("group path is empty")]
    EmptyPath,

    #[error("there is a group whose name is empty")]
    EmptySegment,

    #[error("the group named '{0}' cannot contain a '{1}' character")]
    IllegalChar(String, char),
}

/// Check a single path segment
pub fn validate_segment(segment: &str) -> Result<(), NameError> {
    if segment.is_empty() {
        return Err(NameError::EmptySegment);
    }
    for c in [PATH_SEPARATOR, EXPRESSION_SEPARATOR] {
        if segment.contains(c) {
            return Err(NameError::IllegalChar(segment.to_string(), c));
        }
    }
    Ok(())
}

/// Check a community name
pub fn validate_community(community: &str) -> Result<(), NameError> {
    if community.is_empty() {
        return Err(NameError::EmptyCommunity);
    }
    if community.contains(EXPRESSION_SEPARATOR) {
        return Err(NameError::IllegalCommunityChar(
            community.to_string(),
            EXPRESSION_SEPARATOR,
        ));
    }
    Ok(())
}

/// Split a `/`-separated path string, dropping empty segments
///
/// `"/a//b/"` yields `["a", "b"]`. The segments are not validated here.
pub fn split_path(path: &str) -> Vec<String> {
    path.split(PATH_SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Identifier of a remote node (a distributed peer)
///
/// Activation counts are tracked independently per remote node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId::new(id)
    }
}

/// Fully qualified path of a group: its community plus the segment list
///
/// A `GroupPath` is always valid: constructors reject empty paths and
/// malformed names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawGroupPath", into = "RawGroupPath")]
pub struct GroupPath {
    community: String,
    segments: Vec<String>,
}

impl GroupPath {
    /// Build a path from explicit segments, validating every one of them
    pub fn new<I, S>(community: impl Into<String>, segments: I) -> Result<Self, NameError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let community = community.into();
        validate_community(&community)?;
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(NameError::EmptyPath);
        }
        for segment in &segments {
            validate_segment(segment)?;
        }
        Ok(Self {
            community,
            segments,
        })
    }

    /// Parse a `/`-separated path string
    pub fn parse(community: impl Into<String>, path: &str) -> Result<Self, NameError> {
        Self::new(community, split_path(path))
    }

    pub fn community(&self) -> &str {
        &self.community
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment
    pub fn name(&self) -> &str {
        // non-empty by construction
        &self.segments[self.segments.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Path string in `/a/b/` form
    pub fn path_string(&self) -> String {
        let mut out = String::from("/");
        for segment in &self.segments {
            out.push_str(segment);
            out.push(PATH_SEPARATOR);
        }
        out
    }

    /// Parent path, or `None` for a top-level group
    pub fn parent(&self) -> Option<GroupPath> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            community: self.community.clone(),
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Extend this path with more segments
    pub fn join<I, S>(&self, more: I) -> Result<GroupPath, NameError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut segments = self.segments.clone();
        for segment in more {
            let segment = segment.into();
            validate_segment(&segment)?;
            segments.push(segment);
        }
        Ok(Self {
            community: self.community.clone(),
            segments,
        })
    }

    /// Strict ancestor test (same community, proper prefix)
    pub fn is_ancestor_of(&self, other: &GroupPath) -> bool {
        self.community == other.community
            && self.segments.len() < other.segments.len()
            && other.segments.starts_with(&self.segments)
    }

    /// Ancestor paths, nearest first
    pub fn ancestors(&self) -> Vec<GroupPath> {
        (1..self.segments.len())
            .rev()
            .map(|len| Self {
                community: self.community.clone(),
                segments: self.segments[..len].to_vec(),
            })
            .collect()
    }

    /// Every prefix of this path, shortest first, ending with the path itself
    pub fn prefixes(&self) -> Vec<GroupPath> {
        (1..=self.segments.len())
            .map(|len| Self {
                community: self.community.clone(),
                segments: self.segments[..len].to_vec(),
            })
            .collect()
    }
}

impl fmt::Display for GroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.community, self.path_string())
    }
}

/// Wire form of a [`GroupPath`]: community plus a path string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGroupPath {
    pub community: String,
    pub path: String,
}

impl TryFrom<RawGroupPath> for GroupPath {
    type Error = NameError;

    fn try_from(raw: RawGroupPath) -> Result<Self, Self::Error> {
        GroupPath::parse(raw.community, &raw.path)
    }
}

impl From<GroupPath> for RawGroupPath {
    fn from(path: GroupPath) -> Self {
        RawGroupPath {
            path: path.path_string(),
            community: path.community,
        }
    }
}
