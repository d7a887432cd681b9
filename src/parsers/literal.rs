//! Strict decoder for stringified Python literals.
//!
//! Older plaso exports carry the path specification, and sometimes the evtx
//! strings array, as the textual repr of a Python value instead of nested
//! JSON. This module decodes exactly the literal subset those fields use:
//! dicts, lists, quoted strings, integers, booleans and None. Everything
//! else, including anything callable, is rejected with a decode error.

use std::collections::BTreeMap;

use crate::errors::{HopTraceError, Result};

/// A decoded Python literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Literal>),
    Dict(BTreeMap<String, Literal>),
}

impl Literal {
    /// Dict field lookup. Returns `None` for missing keys and non-dicts.
    pub fn get(&self, key: &str) -> Option<&Literal> {
        match self {
            Literal::Dict(entries) => entries.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(value) => Some(value),
            _ => None,
        }
    }
}

/// Deepest container nesting the decoder will follow.
const MAX_DEPTH: usize = 128;

/// Decodes a complete literal, rejecting trailing content.
pub fn parse(input: &str) -> Result<Literal> {
    let mut decoder = Decoder {
        input,
        pos: 0,
        depth: 0,
    };
    decoder.skip_whitespace();
    let value = decoder.parse_value()?;
    decoder.skip_whitespace();
    if decoder.pos < decoder.input.len() {
        return Err(decoder.error("trailing content after literal"));
    }
    Ok(value)
}

struct Decoder<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl Decoder<'_> {
    fn error(&self, message: impl Into<String>) -> HopTraceError {
        HopTraceError::LiteralDecode {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn parse_value(&mut self) -> Result<Literal> {
        match self.peek() {
            Some('{') => self.nested(|decoder| decoder.parse_dict()),
            Some('[') => self.nested(|decoder| decoder.parse_list()),
            Some('\'') | Some('"') => self.parse_string().map(Literal::Str),
            Some(c) if c == '-' || c.is_ascii_digit() => self.parse_int(),
            // Python 2 reprs prefix strings with u or b.
            Some('u') | Some('U') | Some('b') | Some('B') if self.quote_follows() => {
                self.bump();
                self.parse_string().map(Literal::Str)
            }
            Some(c) if c.is_ascii_alphabetic() => self.parse_keyword(),
            Some(c) => Err(self.error(format!("unexpected character {:?}", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn quote_follows(&self) -> bool {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        matches!(chars.next(), Some('\'') | Some('"'))
    }

    fn nested<F>(&mut self, parse: F) -> Result<Literal>
    where
        F: FnOnce(&mut Self) -> Result<Literal>,
    {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(format!("nesting deeper than {} levels", MAX_DEPTH)));
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn parse_keyword(&mut self) -> Result<Literal> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
            self.bump();
        }
        match &self.input[start..self.pos] {
            "None" => Ok(Literal::None),
            "True" => Ok(Literal::Bool(true)),
            "False" => Ok(Literal::Bool(false)),
            word => {
                let message = format!("unknown keyword {:?}", word);
                self.pos = start;
                Err(self.error(message))
            }
        }
    }

    fn parse_int(&mut self) -> Result<Literal> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            return Err(self.error("expected digit"));
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') {
            return Err(self.error("floating point literals are not supported"));
        }
        let text = &self.input[start..self.pos];
        // Python 2 reprs suffix longs with L.
        if matches!(self.peek(), Some('L') | Some('l')) {
            self.bump();
        }
        let value = text
            .parse::<i64>()
            .map_err(|_| self.error(format!("integer out of range: {}", text)))?;
        Ok(Literal::Int(value))
    }

    fn parse_string(&mut self) -> Result<String> {
        let quote = self.bump().ok_or_else(|| self.error("expected string"))?;
        let mut out = String::new();
        loop {
            let c = self
                .bump()
                .ok_or_else(|| self.error("unterminated string"))?;
            if c == quote {
                return Ok(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            let escape = self
                .bump()
                .ok_or_else(|| self.error("unterminated escape"))?;
            match escape {
                '\\' => out.push('\\'),
                '\'' => out.push('\''),
                '"' => out.push('"'),
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '0' => out.push('\0'),
                'x' => out.push(self.parse_hex_escape(2)?),
                'u' => out.push(self.parse_hex_escape(4)?),
                other => return Err(self.error(format!("unsupported escape \\{}", other))),
            }
        }
    }

    fn parse_hex_escape(&mut self, digits: usize) -> Result<char> {
        let start = self.pos;
        for _ in 0..digits {
            match self.bump() {
                Some(c) if c.is_ascii_hexdigit() => {}
                _ => return Err(self.error("invalid hex escape")),
            }
        }
        let code = u32::from_str_radix(&self.input[start..self.pos], 16)
            .map_err(|_| self.error("invalid hex escape"))?;
        char::from_u32(code).ok_or_else(|| self.error("escape is not a valid character"))
    }

    fn parse_list(&mut self) -> Result<Literal> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(']') {
                self.bump();
                return Ok(Literal::List(items));
            }
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(']') => {
                    self.bump();
                    return Ok(Literal::List(items));
                }
                _ => return Err(self.error("expected `,` or `]` in list")),
            }
        }
    }

    fn parse_dict(&mut self) -> Result<Literal> {
        self.bump();
        let mut entries = BTreeMap::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Literal::Dict(entries));
            }
            let key = match self.parse_value()? {
                Literal::Str(key) => key,
                _ => return Err(self.error("dict keys must be strings")),
            };
            self.skip_whitespace();
            if self.peek() != Some(':') {
                return Err(self.error("expected `:` after dict key"));
            }
            self.bump();
            self.skip_whitespace();
            let value = self.parse_value()?;
            entries.insert(key, value);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some('}') => {
                    self.bump();
                    return Ok(Literal::Dict(entries));
                }
                _ => return Err(self.error("expected `,` or `}` in dict")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn should_decode_scalars() {
        assert_eq!(parse("None").unwrap(), Literal::None);
        assert_eq!(parse("True").unwrap(), Literal::Bool(true));
        assert_eq!(parse("False").unwrap(), Literal::Bool(false));
        assert_eq!(parse("42").unwrap(), Literal::Int(42));
        assert_eq!(parse("-7").unwrap(), Literal::Int(-7));
        assert_eq!(parse("'ssh'").unwrap(), Literal::Str("ssh".to_string()));
        assert_eq!(parse("\"ssh\"").unwrap(), Literal::Str("ssh".to_string()));
    }

    #[test]
    fn should_decode_python_2_artifacts() {
        assert_eq!(parse("1048576L").unwrap(), Literal::Int(1_048_576));
        assert_eq!(
            parse("u'/var/log/wtmp'").unwrap(),
            Literal::Str("/var/log/wtmp".to_string())
        );
    }

    #[test]
    fn should_decode_nested_pathspec_repr() {
        let repr = "{u'type_indicator': u'TSK', u'inode': 16, u'location': u'/var/log/wtmp', \
                    u'parent': {u'type_indicator': u'OS', \
                    u'location': u'/media/acme_images/hr_dc01.dd'}}";
        let decoded = parse(repr).unwrap();

        let parent = decoded.get("parent").unwrap();
        assert_eq!(
            parent.get("location").and_then(Literal::as_str),
            Some("/media/acme_images/hr_dc01.dd")
        );
        assert_eq!(decoded.get("inode"), Some(&Literal::Int(16)));
    }

    #[test]
    fn should_decode_string_lists() {
        let decoded = parse("['S-1-0-0', '-', 'WS-ENG-07']").unwrap();
        assert_eq!(
            decoded,
            Literal::List(vec![
                Literal::Str("S-1-0-0".to_string()),
                Literal::Str("-".to_string()),
                Literal::Str("WS-ENG-07".to_string()),
            ])
        );
    }

    #[test]
    fn should_tolerate_trailing_commas() {
        assert_eq!(
            parse("[1, 2,]").unwrap(),
            Literal::List(vec![Literal::Int(1), Literal::Int(2)])
        );
        let dict = parse("{'a': 1,}").unwrap();
        assert_eq!(dict.get("a"), Some(&Literal::Int(1)));
    }

    #[test]
    fn should_decode_escapes() {
        assert_eq!(
            parse(r"'a\'b\\c\nd'").unwrap(),
            Literal::Str("a'b\\c\nd".to_string())
        );
        assert_eq!(
            parse(r"'\x41B'").unwrap(),
            Literal::Str("AB".to_string())
        );
    }

    #[test]
    fn should_reject_anything_callable() {
        let err = parse("__import__('os').system('id')").unwrap_err();
        assert_matches!(err, HopTraceError::LiteralDecode { .. });

        assert!(parse("open('/etc/passwd')").is_err());
    }

    #[test]
    fn should_reject_malformed_input() {
        assert!(parse("").is_err());
        assert!(parse("'unterminated").is_err());
        assert!(parse("{1: 'a'}").is_err());
        assert!(parse("{'a' 1}").is_err());
        assert!(parse("[1 2]").is_err());
        assert!(parse("1.5").is_err());
        assert!(parse("{'a': 1} extra").is_err());
    }

    #[test]
    fn should_report_error_offsets() {
        let err = parse("[1, ?]").unwrap_err();
        assert_matches!(err, HopTraceError::LiteralDecode { offset: 4, .. });
    }

    #[test]
    fn should_decode_nesting_up_to_the_limit() {
        let within = format!("{}{}", "[".repeat(128), "]".repeat(128));
        assert_matches!(parse(&within).unwrap(), Literal::List(_));
    }

    #[test]
    fn should_reject_deeply_nested_literals() {
        let too_deep = format!("{}{}", "[".repeat(129), "]".repeat(129));
        let err = parse(&too_deep).unwrap_err();
        assert_matches!(err, HopTraceError::LiteralDecode { offset: 128, .. });

        assert!(parse(&"[".repeat(1_000_000)).is_err());
        assert!(parse(&"{'parent': ".repeat(200)).is_err());
    }
}
