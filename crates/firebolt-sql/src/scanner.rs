//! Lexical scanner for SQL text.
//!
//! Splits source into fragments so that statement boundaries, placeholders
//! and SET tokens can be located without firing inside string literals,
//! quoted identifiers or comments.

/// One lexical fragment of a SQL string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fragment<'a> {
    /// A run of whitespace.
    Whitespace(&'a str),
    /// `-- ...` to end of line (newline not included).
    LineComment(&'a str),
    /// `/* ... */`, possibly unterminated at end of input.
    BlockComment(&'a str),
    /// Single-quoted string literal, quotes included.
    StringLiteral(&'a str),
    /// Double- or backtick-quoted identifier, quotes included.
    QuotedIdent(&'a str),
    /// A `?` placeholder.
    Placeholder,
    /// Top-level statement separator.
    Semicolon,
    /// Identifier, keyword or number.
    Word(&'a str),
    /// Any other single character.
    Symbol(&'a str),
}

impl Fragment<'_> {
    /// Raw source text of the fragment.
    pub(crate) fn text(&self) -> &str {
        match self {
            Fragment::Whitespace(s)
            | Fragment::LineComment(s)
            | Fragment::BlockComment(s)
            | Fragment::StringLiteral(s)
            | Fragment::QuotedIdent(s)
            | Fragment::Word(s)
            | Fragment::Symbol(s) => s,
            Fragment::Placeholder => "?",
            Fragment::Semicolon => ";",
        }
    }

    /// Whether the fragment carries no SQL meaning.
    pub(crate) fn is_trivia(&self) -> bool {
        matches!(
            self,
            Fragment::Whitespace(_) | Fragment::LineComment(_) | Fragment::BlockComment(_)
        )
    }
}

pub(crate) struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn take_while(&mut self, start: usize, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = &self.src[start..];
        let end = rest
            .char_indices()
            .find(|(_, c)| !pred(*c))
            .map_or(rest.len(), |(i, _)| i);
        self.pos = start + end;
        &rest[..end]
    }

    /// Consume a quoted region starting at `start` whose delimiter is
    /// `quote`. Doubled delimiters and backslash escapes stay inside the
    /// region. Unterminated regions run to end of input.
    fn take_quoted(&mut self, start: usize, quote: char) -> &'a str {
        let rest = &self.src[start..];
        let mut chars = rest.char_indices().skip(1).peekable();
        while let Some((idx, ch)) = chars.next() {
            if ch == '\\' {
                chars.next();
                continue;
            }
            if ch == quote {
                // A doubled delimiter is an escaped delimiter, not the end.
                if let Some((_, next)) = chars.peek() {
                    if *next == quote {
                        chars.next();
                        continue;
                    }
                }
                let end = idx + ch.len_utf8();
                self.pos = start + end;
                return &rest[..end];
            }
        }
        self.pos = self.src.len();
        rest
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Fragment<'a>;

    fn next(&mut self) -> Option<Fragment<'a>> {
        let start = self.pos;
        let rest = self.rest();
        let ch = rest.chars().next()?;

        if ch.is_whitespace() {
            return Some(Fragment::Whitespace(
                self.take_while(start, char::is_whitespace),
            ));
        }
        if rest.starts_with("--") {
            return Some(Fragment::LineComment(
                self.take_while(start, |c| c != '\n'),
            ));
        }
        if rest.starts_with("/*") {
            let end = rest.find("*/").map_or(rest.len(), |i| i + 2);
            self.pos = start + end;
            return Some(Fragment::BlockComment(&rest[..end]));
        }
        match ch {
            '\'' => Some(Fragment::StringLiteral(self.take_quoted(start, '\''))),
            '"' => Some(Fragment::QuotedIdent(self.take_quoted(start, '"'))),
            '`' => Some(Fragment::QuotedIdent(self.take_quoted(start, '`'))),
            '?' => {
                self.pos += 1;
                Some(Fragment::Placeholder)
            }
            ';' => {
                self.pos += 1;
                Some(Fragment::Semicolon)
            }
            c if c.is_alphanumeric() || c == '_' || c == '$' => Some(Fragment::Word(
                self.take_while(start, |c| c.is_alphanumeric() || c == '_' || c == '$' || c == '.'),
            )),
            c => {
                let end = start + c.len_utf8();
                self.pos = end;
                Some(Fragment::Symbol(&self.src[start..end]))
            }
        }
    }
}

/// Split source into statement spans on top-level semicolons.
///
/// Returned spans exclude the separator itself; spans that contain only
/// trivia are dropped.
pub(crate) fn split_statements(src: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut scanner = Scanner::new(src);
    let mut span_start = 0usize;
    let mut has_content = false;
    loop {
        let frag_start = scanner.pos;
        match scanner.next() {
            Some(Fragment::Semicolon) => {
                if has_content {
                    spans.push(&src[span_start..frag_start]);
                }
                span_start = scanner.pos;
                has_content = false;
            }
            Some(frag) => {
                if !frag.is_trivia() {
                    has_content = true;
                }
            }
            None => break,
        }
    }
    if has_content {
        spans.push(&src[span_start..]);
    }
    spans
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fragments(src: &str) -> Vec<Fragment<'_>> {
        Scanner::new(src).collect()
    }

    #[test]
    fn test_scan_words_and_symbols() {
        let frags = fragments("SELECT a + 1");
        assert_eq!(
            frags,
            vec![
                Fragment::Word("SELECT"),
                Fragment::Whitespace(" "),
                Fragment::Word("a"),
                Fragment::Whitespace(" "),
                Fragment::Symbol("+"),
                Fragment::Whitespace(" "),
                Fragment::Word("1"),
            ]
        );
    }

    #[test]
    fn test_scan_string_with_doubled_quotes() {
        let frags = fragments("'it''s'");
        assert_eq!(frags, vec![Fragment::StringLiteral("'it''s'")]);
    }

    #[test]
    fn test_scan_string_with_backslash_escape() {
        let frags = fragments(r"'a\'b'");
        assert_eq!(frags, vec![Fragment::StringLiteral(r"'a\'b'")]);
    }

    #[test]
    fn test_scan_unterminated_string_runs_to_end() {
        let frags = fragments("'oops; SELECT 1");
        assert_eq!(frags, vec![Fragment::StringLiteral("'oops; SELECT 1")]);
    }

    #[test]
    fn test_placeholder_not_found_in_string_or_comment() {
        let frags = fragments("'?' /* ? */ -- ?");
        assert!(!frags.contains(&Fragment::Placeholder));
    }

    #[test]
    fn test_split_statements_basic() {
        assert_eq!(
            split_statements("SELECT 1; SELECT 2"),
            vec!["SELECT 1", " SELECT 2"]
        );
    }

    #[test]
    fn test_split_statements_trailing_semicolon() {
        assert_eq!(split_statements("SELECT 1;"), vec!["SELECT 1"]);
        assert_eq!(split_statements("SELECT 1; ;  "), vec!["SELECT 1"]);
    }

    #[test]
    fn test_split_statements_semicolon_inside_literal() {
        assert_eq!(
            split_statements("SELECT 'a;b'; SELECT 2"),
            vec!["SELECT 'a;b'", " SELECT 2"]
        );
    }

    #[test]
    fn test_split_statements_semicolon_inside_comment() {
        assert_eq!(
            split_statements("SELECT 1 /* ; */ + 2"),
            vec!["SELECT 1 /* ; */ + 2"]
        );
    }

    #[test]
    fn test_split_statements_empty_input() {
        assert!(split_statements("").is_empty());
        assert!(split_statements("   \n").is_empty());
    }
}
