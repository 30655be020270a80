//! Quote- and bracket-aware scanner for `CREATE TABLE` text.

use crate::error::{Error, Result};

/// Byte range into the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Result of splitting a statement around its column list.
#[derive(Debug)]
pub struct Sections {
    /// Text before the opening parenthesis.
    pub head: Span,
    /// Top-level comma separated spans inside the parentheses.
    pub clauses: Vec<Span>,
    /// Text after the matching closing parenthesis.
    pub tail: Span,
}

/// Returns the character that closes a quoted run opened by `c`.
const fn closing_quote(c: char) -> Option<char> {
    match c {
        '\'' | '"' | '`' => Some(c),
        '[' => Some(']'),
        _ => None,
    }
}

/// Walks the text one character at a time, tracking bracket depth and the
/// active quote character.
///
/// A quote character immediately repeated is a literal; only the quote that
/// opened a quoted run can close it. `[name]` is a quoted run closed by the
/// first `]`.
pub struct Scanner<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
    /// Closing character of the active quoted run.
    quote: Option<char>,
}

impl<'a> Scanner<'a> {
    /// Creates a scanner over `input`.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
            quote: None,
        }
    }

    /// Returns the current character without advancing.
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Advances to the next character and returns it.
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: &str) -> Error {
        Error::DdlParse {
            offset: self.pos,
            message: message.to_string(),
        }
    }

    /// Consumes one character, updating quote and depth state.
    ///
    /// Returns the character when it is structural: a bracket or a comma
    /// outside any quote.
    fn step(&mut self) -> Result<Option<char>> {
        let Some(c) = self.advance() else {
            return Ok(None);
        };
        if let Some(close) = self.quote {
            if c == close {
                if close != ']' && self.peek() == Some(c) {
                    self.advance();
                } else {
                    self.quote = None;
                }
            }
            return Ok(None);
        }
        if let Some(close) = closing_quote(c) {
            if close == c && self.peek() == Some(c) {
                self.advance();
            } else {
                self.quote = Some(close);
            }
            return Ok(None);
        }
        match c {
            '(' => {
                self.depth += 1;
                Ok(Some(c))
            }
            ')' => {
                self.depth = self
                    .depth
                    .checked_sub(1)
                    .ok_or_else(|| self.error("unbalanced brackets"))?;
                Ok(Some(c))
            }
            ',' => Ok(Some(c)),
            _ => Ok(None),
        }
    }

    /// Splits a `CREATE TABLE` statement into head, clauses and tail.
    pub fn sections(mut self) -> Result<Sections> {
        // Head: everything up to the first structural '('.
        let open = loop {
            let before = self.pos;
            match self.step()? {
                Some('(') => break before,
                Some(_) => {}
                None if self.peek().is_none() => {
                    if self.quote.is_some() {
                        return Err(self.error("unterminated quote"));
                    }
                    return Err(self.error("missing column list"));
                }
                None => {}
            }
        };

        let mut clauses = Vec::new();
        let mut start = self.pos;
        let close = loop {
            let before = self.pos;
            match self.step()? {
                Some(')') if self.depth == 0 => {
                    clauses.push(Span::new(start, before));
                    break before;
                }
                Some(',') if self.depth == 1 => {
                    clauses.push(Span::new(start, before));
                    start = self.pos;
                }
                Some(_) => {}
                None if self.peek().is_none() => {
                    if self.quote.is_some() {
                        return Err(self.error("unterminated quote"));
                    }
                    return Err(self.error("unbalanced brackets"));
                }
                None => {}
            }
        };

        let tail_start = close + 1;
        while self.step()?.is_some() || self.peek().is_some() {}
        if self.quote.is_some() {
            return Err(self.error("unterminated quote"));
        }
        if self.depth != 0 {
            return Err(self.error("unbalanced brackets"));
        }

        Ok(Sections {
            head: Span::new(0, open),
            clauses,
            tail: Span::new(tail_start, self.input.len()),
        })
    }
}

/// Reads the leading identifier of a clause.
///
/// Returns the unquoted name and whether it was quoted. Quoted forms are
/// `"x"`, `` `x` ``, `'x'` and `[x]`; doubled quote characters inside are
/// unescaped.
#[must_use]
pub fn leading_identifier(clause: &str) -> Option<(String, bool)> {
    let clause = clause.trim_start();
    let mut chars = clause.chars();
    let first = chars.next()?;
    let closing = match first {
        '"' | '`' | '\'' => first,
        '[' => ']',
        _ => {
            let end = clause
                .find(|c: char| c.is_whitespace() || c == '(' || c == ',')
                .unwrap_or(clause.len());
            return (end > 0).then(|| (clause[..end].to_string(), false));
        }
    };
    let mut name = String::new();
    let mut rest = chars.peekable();
    while let Some(c) = rest.next() {
        if c == closing {
            if closing != ']' && rest.peek() == Some(&closing) {
                rest.next();
                name.push(c);
                continue;
            }
            return Some((name, true));
        }
        name.push(c);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts<'a>(input: &'a str, sections: &Sections) -> Vec<&'a str> {
        sections
            .clauses
            .iter()
            .map(|s| input[s.start..s.end].trim())
            .collect()
    }

    #[test]
    fn test_split_respects_quotes_and_nesting() {
        let sql = "CREATE TABLE t (a INT, b TEXT DEFAULT 'x,y', c NUMERIC(10, 2), CHECK (a > 0))";
        let sections = Scanner::new(sql).sections().unwrap();
        assert_eq!(&sql[sections.head.start..sections.head.end], "CREATE TABLE t ");
        assert_eq!(
            texts(sql, &sections),
            vec!["a INT", "b TEXT DEFAULT 'x,y'", "c NUMERIC(10, 2)", "CHECK (a > 0)"]
        );
        assert_eq!(sections.tail.start, sql.len());
    }

    #[test]
    fn test_doubled_quotes_are_literal() {
        let sql = "CREATE TABLE t (a TEXT DEFAULT 'it''s, ok', \"we\"\"ird,\" INT)";
        let sections = Scanner::new(sql).sections().unwrap();
        assert_eq!(
            texts(sql, &sections),
            vec!["a TEXT DEFAULT 'it''s, ok'", "\"we\"\"ird,\" INT"]
        );
    }

    #[test]
    fn test_other_quote_does_not_close() {
        let sql = "CREATE TABLE t (a TEXT DEFAULT 'say \"hi, there', b INT)";
        let sections = Scanner::new(sql).sections().unwrap();
        assert_eq!(sections.clauses.len(), 2);
    }

    #[test]
    fn test_bracket_quoted_names_hide_structure() {
        let sql = "CREATE TABLE t ([a,b] INT, [c)d] TEXT, e INT)";
        let sections = Scanner::new(sql).sections().unwrap();
        assert_eq!(texts(sql, &sections), vec!["[a,b] INT", "[c)d] TEXT", "e INT"]);
        assert!(Scanner::new("CREATE TABLE t ([a INT)").sections().is_err());
    }

    #[test]
    fn test_tail_is_preserved() {
        let sql = "CREATE TABLE t (id INTEGER PRIMARY KEY) WITHOUT ROWID";
        let sections = Scanner::new(sql).sections().unwrap();
        assert_eq!(&sql[sections.tail.start..], " WITHOUT ROWID");
    }

    #[test]
    fn test_unbalanced_input() {
        assert!(Scanner::new("CREATE TABLE t (a INT").sections().is_err());
        assert!(Scanner::new("CREATE TABLE t (a INT)) x").sections().is_err());
        assert!(Scanner::new("CREATE TABLE t (a TEXT DEFAULT 'x)").sections().is_err());
        assert!(Scanner::new("CREATE TABLE t").sections().is_err());
    }

    #[test]
    fn test_leading_identifier() {
        assert_eq!(leading_identifier("`a` INT"), Some(("a".into(), true)));
        assert_eq!(leading_identifier("[my col] TEXT"), Some(("my col".into(), true)));
        assert_eq!(leading_identifier("\"x\"\"y\" INT"), Some(("x\"y".into(), true)));
        assert_eq!(leading_identifier("name TEXT"), Some(("name".into(), false)));
        assert_eq!(leading_identifier("PRIMARY KEY(a)"), Some(("PRIMARY".into(), false)));
        assert_eq!(leading_identifier("`open"), None);
    }
}
