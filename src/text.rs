//! Text codec: tagged value tree to and from a human-readable string
//!
//! A hand-rolled tokenizer and recursive-descent parser for a JSON-like
//! grammar with typed numeric literal suffixes:
//!
//! ```text
//! Compound  ::= '{' (Pair (',' Pair)*)? '}'
//! Pair      ::= String ':' Value
//! List      ::= '[' (Value (',' Value)*)? ']'
//! ByteArray ::= '[B;' base64 ']'
//! Value     ::= Compound | List | ByteArray | QuotedString | Literal
//! ```
//!
//! Suffix letters: `B` u8, `Y` i8, `S` i16, `W` u16, `U` u32, `L` i64,
//! `Q` u64, `F` f32, `D` f64, `M` decimal. An unsuffixed all-digit token is
//! a 32-bit signed integer; an unsuffixed token with a decimal point or
//! exponent is f64. `NULL`, `true`, `false` are reserved literals.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha2::{Digest, Sha256};

use crate::error::{ArborError, Result};
use crate::value::{Compound, Dec128, TaggedValue, DEPENDENCIES_KEY, ID_KEY, TYPE_KEY};

/// Reserved compound keys, printed first and in this order when present
const RESERVED_KEYS: [&str; 3] = [ID_KEY, TYPE_KEY, DEPENDENCIES_KEY];

// ============================================================
// Printer
// ============================================================

/// Render a tree in text form
pub fn to_text(value: &TaggedValue) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// SHA-256 of the canonical text form, first 16 hex chars
pub fn fingerprint(value: &TaggedValue) -> String {
    let mut hasher = Sha256::new();
    hasher.update(to_text(value).as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

fn write_value(out: &mut String, value: &TaggedValue) {
    match value {
        TaggedValue::Null => out.push_str("NULL"),
        TaggedValue::Bool(v) => out.push_str(if *v { "true" } else { "false" }),
        TaggedValue::I8(v) => {
            out.push_str(&v.to_string());
            out.push('Y');
        }
        TaggedValue::I16(v) => {
            out.push_str(&v.to_string());
            out.push('S');
        }
        TaggedValue::I32(v) => out.push_str(&v.to_string()),
        TaggedValue::I64(v) => {
            out.push_str(&v.to_string());
            out.push('L');
        }
        TaggedValue::U8(v) => {
            out.push_str(&v.to_string());
            out.push('B');
        }
        TaggedValue::U16(v) => {
            out.push_str(&v.to_string());
            out.push('W');
        }
        TaggedValue::U32(v) => {
            out.push_str(&v.to_string());
            out.push('U');
        }
        TaggedValue::U64(v) => {
            out.push_str(&v.to_string());
            out.push('Q');
        }
        TaggedValue::F32(v) => {
            out.push_str(&v.to_string());
            out.push('F');
        }
        TaggedValue::F64(v) => {
            out.push_str(&v.to_string());
            out.push('D');
        }
        TaggedValue::Decimal(d) => {
            out.push_str(&d.to_string());
            out.push('M');
        }
        TaggedValue::Str(s) => write_quoted(out, s),
        TaggedValue::Bytes(b) => {
            out.push_str("[B;");
            out.push_str(&BASE64.encode(b));
            out.push(']');
        }
        TaggedValue::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        TaggedValue::Compound(compound) => write_compound(out, compound),
    }
}

fn write_compound(out: &mut String, compound: &Compound) {
    out.push('{');
    let mut first = true;
    for key in RESERVED_KEYS {
        if let Some(value) = compound.get(key) {
            write_pair(out, key, value, &mut first);
        }
    }
    for (key, value) in compound.iter() {
        if RESERVED_KEYS.contains(&key) {
            continue;
        }
        write_pair(out, key, value, &mut first);
    }
    out.push('}');
}

fn write_pair(out: &mut String, key: &str, value: &TaggedValue, first: &mut bool) {
    if !*first {
        out.push(',');
    }
    *first = false;
    write_quoted(out, key);
    out.push(':');
    write_value(out, value);
}

fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
}

// ============================================================
// Tokenizer
// ============================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Str(String),
    Bytes(Vec<u8>),
    /// Catch-all literal token: numbers, NULL, true, false
    Scalar(String),
}

fn parse_error(message: impl Into<String>, pos: usize) -> ArborError {
    ArborError::Parse {
        message: message.into(),
        pos,
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        match c {
            c if c.is_whitespace() => {
                i += 1;
            }
            '{' => {
                tokens.push((Token::LBrace, pos));
                i += 1;
            }
            '}' => {
                tokens.push((Token::RBrace, pos));
                i += 1;
            }
            ']' => {
                tokens.push((Token::RBracket, pos));
                i += 1;
            }
            ',' => {
                tokens.push((Token::Comma, pos));
                i += 1;
            }
            ':' => {
                tokens.push((Token::Colon, pos));
                i += 1;
            }
            '[' => {
                // `[B;` opens a byte array, a bare `[` opens a list
                if chars.get(i + 1).map(|&(_, c)| c) == Some('B')
                    && chars.get(i + 2).map(|&(_, c)| c) == Some(';')
                {
                    let mut j = i + 3;
                    let mut payload = String::new();
                    loop {
                        match chars.get(j) {
                            Some(&(_, ']')) => break,
                            Some(&(_, c)) => {
                                payload.push(c);
                                j += 1;
                            }
                            None => return Err(parse_error("unterminated byte array", pos)),
                        }
                    }
                    let bytes = BASE64
                        .decode(payload.trim())
                        .map_err(|e| parse_error(format!("invalid base64: {e}"), pos))?;
                    tokens.push((Token::Bytes(bytes), pos));
                    i = j + 1;
                } else {
                    tokens.push((Token::LBracket, pos));
                    i += 1;
                }
            }
            '"' => {
                let mut s = String::new();
                let mut j = i + 1;
                loop {
                    match chars.get(j) {
                        Some(&(_, '"')) => break,
                        Some(&(esc_pos, '\\')) => match chars.get(j + 1).map(|&(_, c)| c) {
                            Some('"') => {
                                s.push('"');
                                j += 2;
                            }
                            Some('\\') => {
                                s.push('\\');
                                j += 2;
                            }
                            Some('n') => {
                                s.push('\n');
                                j += 2;
                            }
                            Some('r') => {
                                s.push('\r');
                                j += 2;
                            }
                            Some('t') => {
                                s.push('\t');
                                j += 2;
                            }
                            other => {
                                return Err(parse_error(
                                    format!("unknown escape: \\{}", other.unwrap_or(' ')),
                                    esc_pos,
                                ))
                            }
                        },
                        Some(&(_, c)) => {
                            s.push(c);
                            j += 1;
                        }
                        None => return Err(parse_error("unterminated string", pos)),
                    }
                }
                tokens.push((Token::Str(s), pos));
                i = j + 1;
            }
            _ => {
                let mut s = String::new();
                let mut j = i;
                while let Some(&(_, c)) = chars.get(j) {
                    if c.is_whitespace() || matches!(c, '{' | '}' | '[' | ']' | ',' | ':' | '"') {
                        break;
                    }
                    s.push(c);
                    j += 1;
                }
                tokens.push((Token::Scalar(s), pos));
                i = j;
            }
        }
    }
    Ok(tokens)
}

// ============================================================
// Parser
// ============================================================

/// Parse text form back into a tree
pub fn from_text(input: &str) -> Result<TaggedValue> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, index: 0 };
    let value = parser.parse_value()?;
    if parser.index != parser.tokens.len() {
        let (_, pos) = parser.tokens[parser.index];
        return Err(parse_error("unexpected trailing token", pos));
    }
    Ok(value)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    index: usize,
}

impl Parser {
    fn next(&mut self) -> Result<(Token, usize)> {
        let end = self.tokens.last().map(|&(_, p)| p).unwrap_or(0);
        let item = self
            .tokens
            .get(self.index)
            .cloned()
            .ok_or_else(|| parse_error("unexpected end of input", end))?;
        self.index += 1;
        Ok(item)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index).map(|(t, _)| t)
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<()> {
        let (found, pos) = self.next()?;
        if found != token {
            return Err(parse_error(format!("expected {what}"), pos));
        }
        Ok(())
    }

    fn parse_value(&mut self) -> Result<TaggedValue> {
        let (token, pos) = self.next()?;
        match token {
            Token::LBrace => self.parse_compound(),
            Token::LBracket => self.parse_list(),
            Token::Bytes(b) => Ok(TaggedValue::Bytes(b)),
            Token::Str(s) => Ok(TaggedValue::Str(s)),
            Token::Scalar(s) => parse_scalar(&s, pos),
            other => Err(parse_error(format!("unexpected token {other:?}"), pos)),
        }
    }

    fn parse_compound(&mut self) -> Result<TaggedValue> {
        let mut compound = Compound::new();
        if self.peek() == Some(&Token::RBrace) {
            self.index += 1;
            return Ok(TaggedValue::Compound(compound));
        }
        loop {
            let (token, pos) = self.next()?;
            let key = match token {
                Token::Str(s) => s,
                other => return Err(parse_error(format!("expected string key, got {other:?}"), pos)),
            };
            self.expect(Token::Colon, "':' after key")?;
            let value = self.parse_value()?;
            compound.insert(key, value);

            let (token, pos) = self.next()?;
            match token {
                Token::Comma => continue,
                Token::RBrace => return Ok(TaggedValue::Compound(compound)),
                other => return Err(parse_error(format!("expected ',' or '}}', got {other:?}"), pos)),
            }
        }
    }

    fn parse_list(&mut self) -> Result<TaggedValue> {
        let mut items = Vec::new();
        if self.peek() == Some(&Token::RBracket) {
            self.index += 1;
            return Ok(TaggedValue::List(items));
        }
        loop {
            items.push(self.parse_value()?);
            let (token, pos) = self.next()?;
            match token {
                Token::Comma => continue,
                Token::RBracket => return Ok(TaggedValue::List(items)),
                other => return Err(parse_error(format!("expected ',' or ']', got {other:?}"), pos)),
            }
        }
    }
}

fn parse_scalar(token: &str, pos: usize) -> Result<TaggedValue> {
    match token {
        "NULL" => return Ok(TaggedValue::Null),
        "true" => return Ok(TaggedValue::Bool(true)),
        "false" => return Ok(TaggedValue::Bool(false)),
        "" => return Err(parse_error("empty literal", pos)),
        _ => {}
    }

    let last = token.chars().last().unwrap_or(' ');
    let body = &token[..token.len() - last.len_utf8()];
    let invalid = |e: &dyn std::fmt::Display| parse_error(format!("invalid literal '{token}': {e}"), pos);

    if last.is_ascii_alphabetic() {
        if body.is_empty() {
            return Err(parse_error(format!("invalid literal '{token}'"), pos));
        }
        return match last.to_ascii_uppercase() {
            'Y' => body.parse::<i8>().map(TaggedValue::I8).map_err(|e| invalid(&e)),
            'S' => body.parse::<i16>().map(TaggedValue::I16).map_err(|e| invalid(&e)),
            'L' => body.parse::<i64>().map(TaggedValue::I64).map_err(|e| invalid(&e)),
            'B' => body.parse::<u8>().map(TaggedValue::U8).map_err(|e| invalid(&e)),
            'W' => body.parse::<u16>().map(TaggedValue::U16).map_err(|e| invalid(&e)),
            'U' => body.parse::<u32>().map(TaggedValue::U32).map_err(|e| invalid(&e)),
            'Q' => body.parse::<u64>().map(TaggedValue::U64).map_err(|e| invalid(&e)),
            'F' => body.parse::<f32>().map(TaggedValue::F32).map_err(|e| invalid(&e)),
            'D' => body.parse::<f64>().map(TaggedValue::F64).map_err(|e| invalid(&e)),
            'M' => body
                .parse::<Dec128>()
                .map(TaggedValue::Decimal)
                .map_err(|e| invalid(&e)),
            _ => Err(parse_error(format!("unknown literal suffix '{last}'"), pos)),
        };
    }

    // No suffix: all-digit tokens are 32-bit signed, a decimal point or
    // exponent makes it a double
    if token.contains('.') || token.contains('e') || token.contains('E') {
        token.parse::<f64>().map(TaggedValue::F64).map_err(|e| invalid(&e))
    } else {
        token.parse::<i32>().map(TaggedValue::I32).map_err(|e| invalid(&e))
    }
}

mod hex {
    pub fn encode(data: &[u8]) -> String {
        data.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
