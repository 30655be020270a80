//! String form of selectors: `status=active,age>18,role in (admin,staff),!deleted_at`.

use super::{CompareOp, Selector};
use crate::error::{Error, Result};
use crate::value::SqlValue;

impl Selector {
    /// Parses a comma separated list of requirements, all of which must hold.
    ///
    /// | form | meaning |
    /// |---|---|
    /// | `k=v`, `k==v`, `k!=v` | equality, inequality |
    /// | `k>v`, `k>=v`, `k<v`, `k<=v` | ordering |
    /// | `k in (a,b)`, `k notin (a,b)` | set membership |
    /// | `k` / `!k` | `IS NOT NULL` / `IS NULL` |
    ///
    /// Values are bound as text. An empty string selects everything.
    pub fn parse(input: &str) -> Result<Self> {
        let mut items = Vec::new();
        for part in split_requirements(input)? {
            let part = part.trim();
            if part.is_empty() {
                if input.trim().is_empty() {
                    continue;
                }
                return Err(Error::validation(format!("empty requirement in selector `{input}`")));
            }
            items.push(parse_requirement(part)?);
        }
        Ok(match items.len() {
            1 => items.remove(0),
            _ => Self::And(items),
        })
    }
}

fn split_requirements(input: &str) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::validation(format!("unbalanced `)` in selector `{input}`")))?;
            }
            ',' if depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(Error::validation(format!("unclosed `(` in selector `{input}`")));
    }
    parts.push(&input[start..]);
    Ok(parts)
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

fn parse_key(s: &str) -> Result<(&str, &str)> {
    let end = s.find(|c: char| !is_key_char(c)).unwrap_or(s.len());
    if end == 0 {
        return Err(Error::validation(format!("missing column name in `{s}`")));
    }
    Ok((&s[..end], s[end..].trim_start()))
}

fn parse_requirement(part: &str) -> Result<Selector> {
    if let Some(rest) = part.strip_prefix('!') {
        let (key, tail) = parse_key(rest.trim_start())?;
        if !tail.is_empty() {
            return Err(Error::validation(format!("unexpected `{tail}` after `!{key}`")));
        }
        return Ok(Selector::is_null(key));
    }

    let (key, rest) = parse_key(part)?;
    if rest.is_empty() {
        return Ok(Selector::is_not_null(key));
    }

    const OPS: [(&str, CompareOp); 7] = [
        ("==", CompareOp::Eq),
        ("!=", CompareOp::Ne),
        (">=", CompareOp::Gte),
        ("<=", CompareOp::Lte),
        ("=", CompareOp::Eq),
        (">", CompareOp::Gt),
        ("<", CompareOp::Lt),
    ];
    for (token, op) in OPS {
        if let Some(value) = rest.strip_prefix(token) {
            return Ok(Selector::Comparison {
                column: key.to_string(),
                op,
                value: SqlValue::Text(value.trim().to_string()),
            });
        }
    }

    if let Some(set) = rest.strip_prefix("notin") {
        let values = parse_set(set)?;
        return Ok(Selector::NotIn {
            column: key.to_string(),
            values,
        });
    }
    if let Some(set) = rest.strip_prefix("in") {
        let values = parse_set(set)?;
        return Ok(Selector::In {
            column: key.to_string(),
            values,
        });
    }

    Err(Error::validation(format!("unknown operator in requirement `{part}`")))
}

fn parse_set(s: &str) -> Result<Vec<SqlValue>> {
    let inner = s
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| Error::validation(format!("expected `(values)`, found `{}`", s.trim())))?;
    let values: Vec<SqlValue> = inner
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| SqlValue::Text(v.to_string()))
        .collect();
    if values.is_empty() {
        return Err(Error::validation("set requirement needs at least one value"));
    }
    Ok(values)
}
