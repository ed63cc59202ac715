use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a declared code entity.
///
/// The set is closed: extending it requires a data-model version bump,
/// because the discriminant names are persisted inside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Class,
    Interface,
    Trait,
    Method,
    Field,
    Property,
    Constructor,
    Enum,
    EnumConstant,
    Annotation,
    Closure,
}

impl SymbolKind {
    /// Stable name used in store keys and serialized values.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Class => "CLASS",
            Self::Interface => "INTERFACE",
            Self::Trait => "TRAIT",
            Self::Method => "METHOD",
            Self::Field => "FIELD",
            Self::Property => "PROPERTY",
            Self::Constructor => "CONSTRUCTOR",
            Self::Enum => "ENUM",
            Self::EnumConstant => "ENUM_CONSTANT",
            Self::Annotation => "ANNOTATION",
            Self::Closure => "CLOSURE",
        }
    }

    /// All kinds, in declaration order.
    pub fn all() -> [SymbolKind; 11] {
        [
            Self::Class,
            Self::Interface,
            Self::Trait,
            Self::Method,
            Self::Field,
            Self::Property,
            Self::Constructor,
            Self::Enum,
            Self::EnumConstant,
            Self::Annotation,
            Self::Closure,
        ]
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SymbolKind {
    type Err = UnknownSymbolKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLASS" => Ok(Self::Class),
            "INTERFACE" => Ok(Self::Interface),
            "TRAIT" => Ok(Self::Trait),
            "METHOD" => Ok(Self::Method),
            "FIELD" => Ok(Self::Field),
            "PROPERTY" => Ok(Self::Property),
            "CONSTRUCTOR" => Ok(Self::Constructor),
            "ENUM" => Ok(Self::Enum),
            "ENUM_CONSTANT" => Ok(Self::EnumConstant),
            "ANNOTATION" => Ok(Self::Annotation),
            "CLOSURE" => Ok(Self::Closure),
            other => Err(UnknownSymbolKind(other.to_string())),
        }
    }
}

/// Returned when a persisted kind tag does not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSymbolKind(pub String);

impl fmt::Display for UnknownSymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown symbol kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownSymbolKind {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_count_is_closed() {
        assert_eq!(SymbolKind::all().len(), 11);
    }

    #[test]
    fn test_kind_name_round_trip() {
        for kind in SymbolKind::all() {
            let parsed: SymbolKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = "MACRO".parse::<SymbolKind>().unwrap_err();
        assert_eq!(err.0, "MACRO");
    }
}
