//! Relationship paths.

use std::fmt;

/// Index of a path within one flattened include tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathId(pub u32);

impl PathId {
    /// Position of the path in the flattened path list.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A non-empty chain of relationship names from the root entity,
/// displayed dot-joined (`posts.comments`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationPath {
    segments: Vec<String>,
}

impl RelationPath {
    /// A single-segment path.
    pub fn root(segment: impl Into<String>) -> Self {
        Self {
            segments: vec![segment.into()],
        }
    }

    /// Extend this path by one segment.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Parse a dotted path. `None` if any segment is empty.
    pub fn parse(dotted: &str) -> Option<Self> {
        let segments: Vec<String> = dotted.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return None;
        }
        Some(Self { segments })
    }

    /// Relationship names from the root.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Check if this path has a single segment.
    pub fn is_top_level(&self) -> bool {
        self.segments.len() == 1
    }

    /// The final relationship name.
    pub fn last(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// The path without its final segment, if any remains.
    pub fn parent(&self) -> Option<Self> {
        if self.is_top_level() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Check if `self` is a proper prefix of `other`.
    pub fn is_prefix_of(&self, other: &RelationPath) -> bool {
        self.depth() < other.depth() && other.segments.starts_with(&self.segments)
    }
}

impl fmt::Display for RelationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_display_and_parent() {
        let path = RelationPath::root("posts").child("comments");

        assert_eq!(path.to_string(), "posts.comments");
        assert_eq!(path.depth(), 2);
        assert_eq!(path.last(), "comments");
        assert_eq!(path.parent(), Some(RelationPath::root("posts")));
        assert!(RelationPath::root("posts").parent().is_none());
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            RelationPath::parse("user.posts"),
            Some(RelationPath::root("user").child("posts"))
        );
        assert!(RelationPath::parse("user..posts").is_none());
        assert!(RelationPath::parse("").is_none());
    }

    #[test]
    fn test_prefix() {
        let parent = RelationPath::root("posts");
        let child = parent.child("comments");

        assert!(parent.is_prefix_of(&child));
        assert!(!child.is_prefix_of(&parent));
        assert!(!parent.is_prefix_of(&parent));
    }
}
