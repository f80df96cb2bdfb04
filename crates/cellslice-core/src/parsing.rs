//! Parser collaborator (spec.md S6): `parse(text) -> Module`.
//!
//! Wraps `ruff_python_parser` rather than writing a front end of our own --
//! the subject language is a Python-like dynamically typed scripting
//! language, and ruff's parser/AST is exactly the "parse(text) -> Module"
//! collaborator spec.md S6 describes, already consumed this way by the
//! teacher crate.

use crate::location::{LineIndex, SourceLocation};
use ruff_python_ast::Stmt;
use ruff_python_parser::parse_module;
use ruff_text_size::Ranged;
use std::sync::Arc;

/// The parsed form of one fragment: its statement list plus everything
/// needed to turn a `ruff_text_size::TextRange` into a `SourceLocation`
/// tagged with this fragment's identity.
pub struct ParsedModule {
    pub body: Vec<Stmt>,
    pub line_index: LineIndex,
    pub path: Option<Arc<str>>,
}

impl ParsedModule {
    /// `location_of(node)` converts any `Ranged` AST node's byte range into
    /// a `SourceLocation` tagged with this fragment's path, matching the
    /// invariant in spec.md S3: "every reference carries a location whose
    /// `path` field... equals the `executionEventId` of the cell it was
    /// parsed from."
    pub fn location_of(&self, node: &impl Ranged) -> SourceLocation {
        self.line_index.location_of(node, self.path.as_ref())
    }

    /// A reusable `Fn(TextRange) -> SourceLocation` over this fragment, for
    /// passing to the extractor/dataflow analyzer's `LocationOf` parameter.
    pub fn location_closure(&self) -> impl Fn(ruff_text_size::TextRange) -> SourceLocation + '_ {
        self.line_index.location_closure(self.path.clone())
    }
}

/// `parse(text) -> Module` (spec.md S6). The parser "must tolerate an
/// implicit trailing newline" -- `ruff_python_parser::parse_module` already
/// does, since Python's grammar treats EOF as a newline.
pub fn parse(text: &str, path: Option<Arc<str>>) -> Result<ParsedModule, String> {
    let parsed = parse_module(text).map_err(|e| e.to_string())?;
    let module = parsed.into_syntax();
    Ok(ParsedModule { body: module.body.to_vec(), line_index: LineIndex::new(text), path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_assignment() {
        let parsed = parse("a = 1\nb = a\n", None).unwrap();
        assert_eq!(parsed.body.len(), 2);
    }

    #[test]
    fn location_carries_the_fragment_path() {
        let parsed = parse("a = 1\n", Some(Arc::from("cell-1"))).unwrap();
        let loc = parsed.location_of(&parsed.body[0]);
        assert_eq!(loc.path.as_deref(), Some("cell-1"));
        assert_eq!(loc.first_line, 1);
    }

    #[test]
    fn surfaces_syntax_errors() {
        assert!(parse("def (:\n", None).is_err());
    }
}
