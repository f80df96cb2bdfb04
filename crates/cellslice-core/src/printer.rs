//! Printer collaborator (spec.md S6): `printNode(node) -> string`.
//!
//! spec.md is explicit that rendering need only be "semantically
//! equivalent, not necessarily identical" and that the engine "does not
//! guarantee syntactic round-tripping of code" (S1 Non-goals). Since every
//! location already carries byte-accurate line/column information against
//! the original fragment text, the simplest faithful renderer is a
//! substring of that text -- no separate unparser to keep in sync with the
//! grammar.

use crate::location::SourceLocation;

/// Renders the source text spanned by `location` out of `full_text`, which
/// must be the text of the single fragment `location.path` (if any)
/// originated from.
pub fn print_location(full_text: &str, location: &SourceLocation) -> String {
    let lines: Vec<&str> = full_text.split('\n').collect();
    let first = location.first_line.saturating_sub(1) as usize;
    let last = location.last_line.saturating_sub(1) as usize;
    if first >= lines.len() {
        return String::new();
    }
    let last = last.min(lines.len().saturating_sub(1));

    if first == last {
        let line = lines[first];
        let start = (location.first_column as usize).min(line.len());
        let end = (location.last_column as usize).min(line.len()).max(start);
        return line[start..end].to_string();
    }

    let mut out = String::new();
    let first_line = lines[first];
    let start = (location.first_column as usize).min(first_line.len());
    out.push_str(&first_line[start..]);
    for line in &lines[first + 1..last] {
        out.push('\n');
        out.push_str(line);
    }
    out.push('\n');
    let last_line = lines[last];
    let end = (location.last_column as usize).min(last_line.len());
    out.push_str(&last_line[..end]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_a_single_line_slice() {
        let text = "a = 1\nb = a\n";
        let loc = SourceLocation::new(2, 0, 2, 5);
        assert_eq!(print_location(text, &loc), "b = a");
    }

    #[test]
    fn prints_a_multi_line_slice() {
        let text = "if True:\n    x = 1\n    y = 2\n";
        let loc = SourceLocation::new(1, 0, 3, 9);
        let printed = print_location(text, &loc);
        assert!(printed.contains("x = 1"));
        assert!(printed.contains("y = 2"));
    }
}
