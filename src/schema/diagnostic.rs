use std::fmt;

use async_graphql::ServerError;
use async_graphql::parser::Pos;
use serde::{Serialize, Serializer};

/// 1-based position inside the SDL or query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl From<Pos> for Location {
    fn from(pos: Pos) -> Self {
        Self {
            line: pos.line,
            column: pos.column,
        }
    }
}

/// Which stage (or which runtime concern) produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Malformed SDL or query text.
    Syntax,
    /// Document-level SDL rule, checked before any type resolution.
    SdlStructural,
    /// Semantic rule checked against the built schema.
    SchemaSemantic,
    /// Resolver or validation failure scoped to one operation.
    Execution,
    /// A pipeline invariant was violated.
    Internal,
}

/// A single reported problem, serialized in the shape of a GraphQL error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub message: String,

    #[serde(
        rename = "locations",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_location"
    )]
    pub location: Option<Location>,

    #[serde(skip)]
    pub kind: DiagnosticKind,
}

fn serialize_location<S>(location: &Option<Location>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match location {
        Some(location) => [location].serialize(serializer),
        None => serializer.serialize_none(),
    }
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, pos: Option<Pos>) -> Self {
        Self {
            message: message.into(),
            location: pos.map(Location::from),
            kind,
        }
    }

    pub fn syntax(message: impl Into<String>, pos: Option<Pos>) -> Self {
        Self::new(DiagnosticKind::Syntax, message, pos)
    }

    pub fn structural(message: impl Into<String>, pos: Pos) -> Self {
        Self::new(DiagnosticKind::SdlStructural, message, Some(pos))
    }

    pub fn semantic(message: impl Into<String>, pos: Option<Pos>) -> Self {
        Self::new(DiagnosticKind::SchemaSemantic, message, pos)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Internal, message, None)
    }

    /// Converts a parser failure, keeping the first reported position.
    pub fn from_parse_error(err: &async_graphql::parser::Error) -> Self {
        Self::syntax(err.to_string(), err.positions().next())
    }
}

impl From<&ServerError> for Diagnostic {
    fn from(err: &ServerError) -> Self {
        Self::new(
            DiagnosticKind::Execution,
            err.message.clone(),
            err.locations.first().copied(),
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(f, "{} (line {}, column {})", self.message, loc.line, loc.column),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Stable sort into document order; location-less diagnostics go last.
pub(crate) fn sort_by_location(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by_key(|d| match d.location {
        Some(loc) => (0, loc.line, loc.column),
        None => (1, 0, 0),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_graphql_error_shape() {
        let diag = Diagnostic::semantic("Unknown type \"Foo\".", Some(Pos { line: 3, column: 7 }));
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "message": "Unknown type \"Foo\".",
                "locations": [{ "line": 3, "column": 7 }]
            })
        );
    }

    #[test]
    fn test_omits_missing_location() {
        let diag = Diagnostic::semantic("Query root type must be provided.", None);
        let json = serde_json::to_value(&diag).unwrap();
        assert!(json.get("locations").is_none());
    }

    #[test]
    fn test_sort_keeps_unlocated_last() {
        let mut diags = vec![
            Diagnostic::semantic("c", None),
            Diagnostic::semantic("b", Some(Pos { line: 4, column: 1 })),
            Diagnostic::semantic("a", Some(Pos { line: 2, column: 9 })),
            Diagnostic::semantic("d", None),
        ];
        sort_by_location(&mut diags);
        let order: Vec<_> = diags.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(order, ["a", "b", "c", "d"]);
    }
}
