//! Schema of the remote tree listing.
//!
//! On the wire a listing is a nested JSON object: each level maps a name to
//! either a leaf `{"file": <marker>}` or another level. Parsing validates the
//! shape and flattens it into path entries.
//!
//! Response bodies are decoded as a stream: entries are collected while the
//! document is read, without an intermediate `Value`, and without a nesting
//! limit. `serde_stacker` moves deep recursion onto heap-allocated stack
//! segments.

use std::fmt;

use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, Visitor};
use serde::ser::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::path::RepoPath;
use crate::error::{NetworkError, ValidationError};

/// Field whose presence marks a leaf.
pub const LEAF_MARKER: &str = "file";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeafMarker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blake3: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingEntry {
    pub path: RepoPath,
    pub marker: LeafMarker,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteListing {
    entries: Vec<ListingEntry>,
}

/// Body of `GET /repo/list-upload/{owner}/{repo}`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ListResponse {
    pub tree: RemoteListing,
}

impl RemoteListing {
    pub fn new(entries: Vec<ListingEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ListingEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ListingEntry> {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate and flatten a nested listing document.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let Value::Object(root) = value else {
            return Err(malformed(&[], "listing root is not an object"));
        };

        let mut entries = Vec::new();
        let mut stack: Vec<(Vec<String>, Map<String, Value>)> = vec![(Vec::new(), root)];
        while let Some((prefix, level)) = stack.pop() {
            for (name, child) in level {
                let mut segments = prefix.clone();
                segments.push(name);
                let Value::Object(mut child) = child else {
                    return Err(malformed(&segments, "expected an object"));
                };
                match child.remove(LEAF_MARKER) {
                    Some(marker) => {
                        if !child.is_empty() {
                            return Err(malformed(&segments, "leaf carries extra fields"));
                        }
                        let marker = parse_marker(&segments, marker)?;
                        let path = RepoPath::from_segments(segments)?;
                        entries.push(ListingEntry { path, marker });
                    }
                    None => stack.push((segments, child)),
                }
            }
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(Self { entries })
    }

    /// Render the nested wire form.
    pub fn to_value(&self) -> Result<Value, ValidationError> {
        let mut root = Map::new();
        for entry in &self.entries {
            let segments = entry.path.segments();
            let mut level = &mut root;
            for (depth, segment) in entry.path.parent_segments().iter().enumerate() {
                let slot = level
                    .entry(segment.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                level = match slot {
                    Value::Object(map) if !map.contains_key(LEAF_MARKER) => map,
                    _ => {
                        return Err(ValidationError::ConflictingNodeKind {
                            path: entry.path.prefix(depth + 1),
                        });
                    }
                };
            }
            let marker = serde_json::to_value(&entry.marker)
                .map_err(|e| malformed(segments, &e.to_string()))?;
            let mut leaf = Map::new();
            leaf.insert(LEAF_MARKER.to_string(), marker);
            if level
                .insert(entry.path.name().to_string(), Value::Object(leaf))
                .is_some()
            {
                return Err(ValidationError::DuplicatePath {
                    path: entry.path.clone(),
                });
            }
        }
        Ok(Value::Object(root))
    }
}

fn parse_marker(segments: &[String], marker: Value) -> Result<LeafMarker, ValidationError> {
    match marker {
        Value::Bool(true) => Ok(LeafMarker::default()),
        Value::String(key) => Ok(LeafMarker {
            key: Some(key),
            ..LeafMarker::default()
        }),
        Value::Object(_) => serde_json::from_value(marker)
            .map_err(|e| malformed(segments, &format!("invalid leaf marker: {}", e))),
        _ => Err(malformed(segments, "invalid leaf marker")),
    }
}

fn malformed(segments: &[String], reason: &str) -> ValidationError {
    ValidationError::MalformedListing {
        path: segments.join("/"),
        reason: reason.to_string(),
    }
}

impl TryFrom<Value> for RemoteListing {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        RemoteListing::from_value(value)
    }
}

impl Serialize for RemoteListing {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RemoteListing {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut collector = Collector::default();
        LevelSeed(&mut collector).deserialize(deserializer)?;
        Ok(Self {
            entries: collector.finish(),
        })
    }
}

impl ListResponse {
    /// Decode a list response body, keeping schema violations typed.
    pub fn decode(bytes: &[u8]) -> crate::error::Result<RemoteListing> {
        let mut collector = Collector::default();
        let mut json = serde_json::Deserializer::from_slice(bytes);
        json.disable_recursion_limit();
        let parsed = ResponseSeed(&mut collector)
            .deserialize(serde_stacker::Deserializer::new(&mut json))
            .and_then(|()| json.end());
        match parsed {
            Ok(()) => Ok(RemoteListing {
                entries: collector.finish(),
            }),
            Err(err) => Err(collector.failure(err)),
        }
    }
}

/// Entries gathered while a listing streams in.
#[derive(Default)]
struct Collector {
    /// Names from the root down to the node being read.
    prefix: Vec<String>,
    entries: Vec<ListingEntry>,
    invalid: Option<ValidationError>,
}

impl Collector {
    fn reject<E: de::Error>(&mut self, err: ValidationError) -> E {
        let message = err.to_string();
        self.invalid.get_or_insert(err);
        E::custom(message)
    }

    fn finish(mut self) -> Vec<ListingEntry> {
        self.entries.sort_by(|a, b| a.path.cmp(&b.path));
        self.entries
    }

    fn failure(self, err: serde_json::Error) -> crate::error::Error {
        if let Some(invalid) = self.invalid {
            return invalid.into();
        }
        if err.is_data() {
            return malformed(&self.prefix, &err.to_string()).into();
        }
        NetworkError::Decode(format!("list response: {}", err)).into()
    }

    fn descend<'de, A>(&mut self, name: String, map: &mut A) -> Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        self.prefix.push(name);
        map.next_value_seed(NodeSeed(&mut *self))?;
        self.prefix.pop();
        Ok(())
    }
}

/// The `{"tree": ...}` envelope. Other fields are skipped.
struct ResponseSeed<'c>(&'c mut Collector);

impl<'de> DeserializeSeed<'de> for ResponseSeed<'_> {
    type Value = ();

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for ResponseSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list response object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let mut seen = false;
        while let Some(key) = map.next_key::<String>()? {
            if key == "tree" && !seen {
                map.next_value_seed(LevelSeed(&mut *self.0))?;
                seen = true;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        if !seen {
            return Err(self.0.reject::<A::Error>(malformed(&[], "list response has no tree")));
        }
        Ok(())
    }
}

/// A directory level: every value is a child node.
struct LevelSeed<'c>(&'c mut Collector);

impl<'de> DeserializeSeed<'de> for LevelSeed<'_> {
    type Value = ();

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for LevelSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a listing object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        while let Some(name) = map.next_key::<String>()? {
            self.0.descend(name, &mut map)?;
        }
        Ok(())
    }
}

/// A node whose kind is known once its fields are read: a leaf if it holds
/// the marker, a directory otherwise.
struct NodeSeed<'c>(&'c mut Collector);

impl<'de> DeserializeSeed<'de> for NodeSeed<'_> {
    type Value = ();

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for NodeSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a leaf or a directory object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let mut marker: Option<Value> = None;
        let mut has_children = false;
        while let Some(name) = map.next_key::<String>()? {
            if name == LEAF_MARKER && marker.is_none() && !has_children {
                marker = Some(map.next_value::<Value>()?);
            } else if marker.is_some() || name == LEAF_MARKER {
                let reason = malformed(&self.0.prefix, "leaf carries extra fields");
                return Err(self.0.reject::<A::Error>(reason));
            } else {
                has_children = true;
                self.0.descend(name, &mut map)?;
            }
        }

        let Some(marker) = marker else {
            return Ok(());
        };
        let marker = parse_marker(&self.0.prefix, marker)
            .map_err(|e| self.0.reject::<A::Error>(e))?;
        let path = RepoPath::from_segments(self.0.prefix.clone())
            .map_err(|e| self.0.reject::<A::Error>(e))?;
        self.0.entries.push(ListingEntry { path, marker });
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/model/listing_tests.rs"]
mod tests;
