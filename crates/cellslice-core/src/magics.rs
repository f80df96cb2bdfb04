//! Magics rewriter collaborator (spec.md S6): `rewrite(text) -> text`.
//!
//! Interactive-shell directives (`%matplotlib inline`, `!pip install x`,
//! `%%time`) are not valid statements in the subject language's grammar.
//! Before parsing, each such line is rewritten into a benign no-op so the
//! parser never sees it, matching spec.md S4.G "add(cell)": "parse the
//! cell's text (after a one-pass rewriting of magic-style lines into
//! benign equivalents)".

use regex::Regex;
use std::sync::LazyLock;

static MAGIC_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\s*)(%{1,2}|!)\S.*$").unwrap());

/// Replaces every line-magic or shell-escape line with a `pass` statement
/// at the same indentation, preserving line numbers so downstream location
/// math stays correct.
pub fn rewrite(text: &str) -> String {
    text.lines()
        .map(|line| match MAGIC_LINE.captures(line) {
            Some(caps) => format!("{}pass", &caps[1]),
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
        + if text.ends_with('\n') { "\n" } else { "" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_line_magic_to_pass() {
        let rewritten = rewrite("%matplotlib inline\nx = 1\n");
        assert_eq!(rewritten, "pass\nx = 1\n");
    }

    #[test]
    fn rewrites_shell_escape_preserving_indent() {
        let rewritten = rewrite("if True:\n    !pip install pandas\n");
        assert_eq!(rewritten, "if True:\n    pass\n");
    }

    #[test]
    fn leaves_ordinary_code_untouched() {
        let rewritten = rewrite("a = 1\nb = a % 2\n");
        assert_eq!(rewritten, "a = 1\nb = a % 2\n");
    }
}
