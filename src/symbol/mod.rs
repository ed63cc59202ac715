//! The symbol DTO and its store encodings.
//!
//! A symbol is identified by the tuple `(name, kind, location, line, column)`.
//! The store key encodes that tuple as `name:kind:location:line:column` so
//! that the natural unsigned-byte ordering of keys sorts by name, which is
//! what makes prefix queries range scans. Values use the pipe-delimited form
//! `name|kind|location|line|column`.

use crate::error::{IndexError, IndexResult, StoreError};
use crate::types::SymbolKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A declared code entity with a name and source position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolInfo {
    name: String,
    kind: SymbolKind,
    location: PathBuf,
    line: u32,
    column: u32,
}

impl SymbolInfo {
    /// Create a symbol, rejecting blank names and coercing non-positive
    /// positions to 1.
    pub fn new(
        name: impl Into<String>,
        kind: SymbolKind,
        location: impl Into<PathBuf>,
        line: i64,
        column: i64,
    ) -> IndexResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(IndexError::InvalidSymbol {
                reason: "name must not be blank".to_string(),
            });
        }
        Ok(Self {
            name,
            kind,
            location: location.into(),
            line: clamp_position(line),
            column: clamp_position(column),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// Store key: `name:kind:location:line:column`.
    pub fn store_key(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.name,
            self.kind,
            self.location.display(),
            self.line,
            self.column
        )
    }

    /// Store value: `name|kind|location|line|column`.
    pub fn serialize_record(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.name,
            self.kind,
            self.location.display(),
            self.line,
            self.column
        )
    }

    /// Decode a stored record. Names and kinds cannot contain the delimiter,
    /// and the trailing two fields are numeric, so the location is recovered
    /// intact even if it contains a pipe.
    pub fn deserialize_record(record: &str) -> Result<Self, StoreError> {
        let corrupt = |reason: &str| StoreError::Corrupt {
            reason: format!("{reason}: '{record}'"),
        };

        let (name, rest) = record
            .split_once('|')
            .ok_or_else(|| corrupt("missing name delimiter"))?;
        let (kind, rest) = rest
            .split_once('|')
            .ok_or_else(|| corrupt("missing kind delimiter"))?;
        let (rest, column) = rest
            .rsplit_once('|')
            .ok_or_else(|| corrupt("missing column delimiter"))?;
        let (location, line) = rest
            .rsplit_once('|')
            .ok_or_else(|| corrupt("missing line delimiter"))?;

        let kind: SymbolKind = kind.parse().map_err(|_| corrupt("unknown kind"))?;
        let line: u32 = line.parse().map_err(|_| corrupt("non-numeric line"))?;
        let column: u32 = column.parse().map_err(|_| corrupt("non-numeric column"))?;

        SymbolInfo::new(name, kind, location, i64::from(line), i64::from(column))
            .map_err(|_| corrupt("blank name"))
    }
}

fn clamp_position(value: i64) -> u32 {
    if value < 1 { 1 } else { value.min(i64::from(u32::MAX)) as u32 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_name_rejected() {
        let err = SymbolInfo::new("  ", SymbolKind::Class, "Foo.groovy", 1, 1).unwrap_err();
        assert!(matches!(err, IndexError::InvalidSymbol { .. }));
    }

    #[test]
    fn test_positions_coerced_to_one() {
        let s = SymbolInfo::new("a.Foo", SymbolKind::Class, "Foo.groovy", -1, 0).unwrap();
        assert_eq!(s.line(), 1);
        assert_eq!(s.column(), 1);
    }

    #[test]
    fn test_record_round_trip() {
        let s = SymbolInfo::new("a.Foo.bar", SymbolKind::Property, "src/Foo.groovy", 2, 14)
            .unwrap();
        let restored = SymbolInfo::deserialize_record(&s.serialize_record()).unwrap();
        assert_eq!(restored, s);
    }

    #[test]
    fn test_record_round_trip_virtual_location() {
        let s = SymbolInfo::new(
            "com.example.Util",
            SymbolKind::Class,
            "/deps/util-1.0.jar!/com/example/Util.class",
            1,
            1,
        )
        .unwrap();
        let restored = SymbolInfo::deserialize_record(&s.serialize_record()).unwrap();
        assert_eq!(restored, s);
    }

    #[test]
    fn test_record_round_trip_location_with_pipe() {
        let s = SymbolInfo::new("a.B", SymbolKind::Method, "odd|dir/B.groovy", 3, 7).unwrap();
        let restored = SymbolInfo::deserialize_record(&s.serialize_record()).unwrap();
        assert_eq!(restored.location(), Path::new("odd|dir/B.groovy"));
    }

    #[test]
    fn test_malformed_record_rejected() {
        assert!(SymbolInfo::deserialize_record("a.Foo|CLASS").is_err());
        assert!(SymbolInfo::deserialize_record("a.Foo|NOPE|f|1|1").is_err());
        assert!(SymbolInfo::deserialize_record("a.Foo|CLASS|f|x|1").is_err());
    }

    #[test]
    fn test_store_key_orders_by_name() {
        let a = SymbolInfo::new("a.Foo", SymbolKind::Class, "Foo.groovy", 2, 1).unwrap();
        let b = SymbolInfo::new("a.Foo.bar", SymbolKind::Property, "Foo.groovy", 2, 1).unwrap();
        let c = SymbolInfo::new("a.FooBar", SymbolKind::Class, "FooBar.groovy", 1, 1).unwrap();
        let mut keys = [a.store_key(), b.store_key(), c.store_key()];
        keys.sort();
        // '.' (0x2E) sorts before ':' (0x3A) sorts before 'B', so every key
        // beginning with the queried name prefix stays contiguous.
        assert!(keys[0].starts_with("a.Foo.bar:"));
        assert!(keys[1].starts_with("a.Foo:"));
        assert!(keys[2].starts_with("a.FooBar:"));
        assert!(keys.iter().all(|k| k.starts_with("a.Foo")));
    }
}
