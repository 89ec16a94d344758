//! Name grammar and the validated [`Namespace`] value.
//!
//! Every event name and every namespace segment must be a non-empty run of
//! ASCII letters, digits or underscores. Validation happens when a namespace,
//! emitter or matcher is built, never while events are being matched.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::InvalidNameError;

/// Separator between segments in a rendered path.
pub const PATH_SEPARATOR: char = '.';

/// Check a single event name or namespace segment.
pub fn validate_name(name: &str) -> Result<(), InvalidNameError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(InvalidNameError::new(name))
    }
}

/// Check every segment, failing on the first invalid one.
pub fn validate_namespace<S: AsRef<str>>(segments: &[S]) -> Result<(), InvalidNameError> {
    for (index, segment) in segments.iter().enumerate() {
        validate_name(segment.as_ref()).map_err(|e| e.at_segment(index))?;
    }
    Ok(())
}

/// An ordered, validated list of segments locating an instance in the
/// event topology (e.g. `["agent", "react"]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Namespace {
    segments: Vec<String>,
}

impl Namespace {
    /// Build a namespace, validating every segment.
    pub fn new<I, S>(segments: I) -> Result<Self, InvalidNameError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        validate_namespace(&segments)?;
        Ok(Self { segments })
    }

    /// The empty (root) namespace.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dotted path such as `agent.react`. The empty string is the root.
    pub fn parse(path: &str) -> Result<Self, InvalidNameError> {
        if path.is_empty() {
            return Ok(Self::root());
        }
        Self::new(path.split(PATH_SEPARATOR))
    }

    /// A new namespace with one more segment appended.
    pub fn child(&self, segment: impl Into<String>) -> Result<Self, InvalidNameError> {
        self.extend([segment])
    }

    /// A new namespace with `segments` appended. Only the new parts are
    /// validated; indices in errors refer to the combined namespace.
    pub fn extend<I, S>(&self, segments: I) -> Result<Self, InvalidNameError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let offset = self.segments.len();
        let mut combined = self.segments.clone();
        for (i, segment) in segments.into_iter().enumerate() {
            let segment = segment.into();
            validate_name(&segment).map_err(|e| e.at_segment(offset + i))?;
            combined.push(segment);
        }
        Ok(Self { segments: combined })
    }

    /// Prefix the namespace with `root` unless it already starts with it.
    pub fn rooted(&self, root: &str) -> Result<Self, InvalidNameError> {
        validate_name(root)?;
        if self.segments.first().is_some_and(|first| first == root) {
            return Ok(self.clone());
        }
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.push(root.to_string());
        segments.extend(self.segments.iter().cloned());
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The dotted form of the namespace (`""` for the root).
    pub fn join(&self) -> String {
        self.segments.join(".")
    }

    /// The full path of an event named `name` emitted in this namespace.
    pub fn path_for(&self, name: &str) -> String {
        if self.segments.is_empty() {
            return name.to_string();
        }
        let mut path = self.join();
        path.push(PATH_SEPARATOR);
        path.push_str(name);
        path
    }

    /// Whether `path` names an event emitted directly in this namespace.
    pub fn owns_path(&self, path: &str) -> bool {
        match self.strip(path) {
            Some(rest) => !rest.is_empty() && !rest.contains(PATH_SEPARATOR),
            None => false,
        }
    }

    /// Whether `path` names an event in this namespace or any namespace below it.
    pub fn contains_path(&self, path: &str) -> bool {
        self.strip(path).is_some_and(|rest| !rest.is_empty())
    }

    fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.segments.is_empty() {
            return Some(path);
        }
        let prefix = self.join();
        path.strip_prefix(prefix.as_str())?
            .strip_prefix(PATH_SEPARATOR)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join())
    }
}

impl TryFrom<Vec<String>> for Namespace {
    type Error = InvalidNameError;

    fn try_from(segments: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(segments)
    }
}

impl From<Namespace> for Vec<String> {
    fn from(namespace: Namespace) -> Self {
        namespace.segments
    }
}
