// Index keys and canonical index names

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the primary-key index every collection carries implicitly.
pub const PRIMARY_INDEX: &str = "_id_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    /// Marker used in index names: `1` or `-1`.
    pub fn marker(&self) -> &'static str {
        match self {
            Direction::Ascending => "1",
            Direction::Descending => "-1",
        }
    }

    pub fn from_marker(token: &str) -> Option<Self> {
        match token {
            "1" => Some(Direction::Ascending),
            "-1" => Some(Direction::Descending),
            _ => None,
        }
    }
}

/// One component of an index key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexKey {
    pub field: String,
    pub direction: Direction,
}

impl IndexKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.field, self.direction.marker())
    }
}

/// Canonical name: each key as `field_marker`, underscore-joined.
pub fn index_name(keys: &[IndexKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("_")
}

/// Rebuild the key list from a canonical name.
///
/// Tokens `1` and `-1` close the field accumulated so far. A field whose own
/// name contains such a token cannot be recovered. Two cases differ from a
/// driver-style parse that treats every marker as a delimiter and defaults a
/// trailing field to ascending:
///
/// - a marker with no field accumulated yet becomes part of the next field
///   name (`1_a_1` gives `1_a`), never an empty-named key;
/// - trailing tokens with no direction marker are dropped, so `_id_` and
///   other non-canonical names yield no keys.
///
/// Names produced by [`index_name`] never hit either case.
pub fn parse_index_name(name: &str) -> Vec<IndexKey> {
    let mut keys = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for token in name.split('_') {
        match Direction::from_marker(token) {
            Some(direction) if !pending.is_empty() => {
                keys.push(IndexKey {
                    field: pending.join("_"),
                    direction,
                });
                pending.clear();
            }
            _ => pending.push(token),
        }
    }

    keys
}

/// Request to create an index. Its name is always [`index_name`] of the keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub keys: Vec<IndexKey>,
    pub unique: bool,
}

impl IndexSpec {
    pub fn name(&self) -> String {
        index_name(&self.keys)
    }
}

/// An index as reported by a store's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub keys: Vec<IndexKey>,
    pub unique: bool,
}
