//! Wire records of the patch stream: the snapshot that starts a subscription
//! and the patches that follow it.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type SequenceId = u64;

/// One step of a [`DbPath`]. Object keys are strings, array positions are
/// integers; both address the same JSON Pointer token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}
impl PathSegment {
    /// The unescaped JSON Pointer reference token
    pub fn token(&self) -> String {
        match self {
            PathSegment::Index(i) => i.to_string(),
            PathSegment::Key(k) => k.clone(),
        }
    }
}
impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        PathSegment::Key(s.to_owned())
    }
}
impl From<String> for PathSegment {
    fn from(s: String) -> Self {
        PathSegment::Key(s)
    }
}
impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        PathSegment::Index(i)
    }
}

/// A location in the document, as an ordered list of keys from the root.
/// The empty path is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DbPath(pub Vec<PathSegment>);

impl DbPath {
    pub fn root() -> Self {
        DbPath(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn join(&self, segment: impl Into<PathSegment>) -> DbPath {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        DbPath(segments)
    }

    /// Reference tokens, as used to key watchers. `["a", 0]` and `["a", "0"]`
    /// produce the same tokens.
    pub fn tokens(&self) -> Vec<String> {
        self.0.iter().map(PathSegment::token).collect()
    }

    /// `true` if `self` equals `other` or lies above it.
    pub fn is_prefix_of(&self, other: &DbPath) -> bool {
        self.0.len() <= other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| a.token() == b.token())
    }

    /// `true` if a change at one of the paths can change the value at the other.
    pub fn overlaps(&self, other: &DbPath) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }

    /// RFC 6901 JSON Pointer, e.g. `/packageData/foo/stateInfo`.
    pub fn to_pointer(&self) -> String {
        let mut s = String::new();
        for segment in &self.0 {
            s.push('/');
            s.push_str(&segment.token().replace('~', "~0").replace('/', "~1"));
        }
        s
    }

    /// Look up the value at this path.
    pub fn get<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        value.pointer(&self.to_pointer())
    }

    /// Parse a dotted path as typed on a command line, e.g. `packageData.foo`.
    /// Segments consisting only of digits become indices.
    pub fn parse_dotted(s: &str) -> DbPath {
        if s.is_empty() {
            return DbPath::root();
        }
        DbPath(
            s.split('.')
                .map(|seg| match seg.parse::<usize>() {
                    Ok(i) if !seg.starts_with('+') => PathSegment::Index(i),
                    _ => PathSegment::Key(seg.to_owned()),
                })
                .collect(),
        )
    }
}
impl Display for DbPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        let tokens = self.tokens();
        write!(f, "{}", tokens.join("."))
    }
}
impl<S: Into<PathSegment>> FromIterator<S> for DbPath {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        DbPath(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum PatchOperation {
    Set { value: Value },
    Delete,
}

/// A single ordered mutation of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    pub sequence_id: SequenceId,
    pub path: DbPath,
    #[serde(flatten)]
    pub operation: PatchOperation,
}

impl Patch {
    pub fn set(sequence_id: SequenceId, path: DbPath, value: Value) -> Self {
        Patch {
            sequence_id,
            path,
            operation: PatchOperation::Set { value },
        }
    }

    pub fn delete(sequence_id: SequenceId, path: DbPath) -> Self {
        Patch {
            sequence_id,
            path,
            operation: PatchOperation::Delete,
        }
    }

    /// Decode a patch message, rejecting anything that does not have the
    /// expected shape.
    pub fn from_message(message: Value) -> Result<Self, MalformedPatch> {
        let sequence_id = message.get("sequenceId").and_then(Value::as_u64);
        serde_json::from_value(message).map_err(|e| MalformedPatch {
            sequence_id,
            reason: e.to_string(),
        })
    }
}

/// A full copy of the document and the sequence id it represents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub sequence_id: SequenceId,
    pub full_document: Value,
}

/// A patch that could not be decoded or applied to its target path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed patch (sequence id {sequence_id:?}): {reason}")]
pub struct MalformedPatch {
    pub sequence_id: Option<SequenceId>,
    pub reason: String,
}
