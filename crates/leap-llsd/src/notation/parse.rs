use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ParseError;
use crate::value::{Map, Value};

/// Nesting deeper than this is rejected rather than risking the stack.
pub const MAX_DEPTH: usize = 256;

const UUID_TEXT_LEN: usize = 36;

/// Parse one LLSD notation value occupying all of `data` (surrounding
/// whitespace aside).
pub fn from_notation(data: &[u8]) -> Result<Value, ParseError> {
    let mut parser = Parser {
        data,
        pos: 0,
        depth: 0,
    };
    let value = parser.parse_value()?;
    parser.skip_ws();
    if parser.pos != data.len() {
        return Err(parser.error("trailing data after value"));
    }
    Ok(value)
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

type PResult<T> = Result<T, ParseError>;

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> ParseError {
        self.error_at(self.pos, message)
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> ParseError {
        ParseError::new(offset, message, self.data.to_vec())
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn next_byte(&mut self) -> PResult<u8> {
        let b = self
            .peek()
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;
        Ok(b)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, literal: &[u8]) -> bool {
        if self.data[self.pos..].starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: u8) -> PResult<()> {
        let at = self.pos;
        match self.next_byte()? {
            b if b == expected => Ok(()),
            b => Err(self.error_at(
                at,
                format!(
                    "expected '{}', found '{}'",
                    char::from(expected),
                    b.escape_ascii()
                ),
            )),
        }
    }

    fn parse_value(&mut self) -> PResult<Value> {
        self.skip_ws();
        let start = self.pos;
        let Some(b) = self.peek() else {
            return Err(self.error("unexpected end of input"));
        };
        match b {
            b'{' => self.nested(Self::parse_map),
            b'[' => self.nested(Self::parse_array),
            b'!' => {
                self.pos += 1;
                Ok(Value::Undefined)
            }
            b'1' => {
                self.pos += 1;
                Ok(Value::Boolean(true))
            }
            b'0' => {
                self.pos += 1;
                Ok(Value::Boolean(false))
            }
            b't' | b'T' => {
                if !(self.eat(b"true") || self.eat(b"TRUE")) {
                    self.pos += 1;
                }
                Ok(Value::Boolean(true))
            }
            b'f' | b'F' => {
                if !(self.eat(b"false") || self.eat(b"FALSE")) {
                    self.pos += 1;
                }
                Ok(Value::Boolean(false))
            }
            b'i' => {
                self.pos += 1;
                self.parse_integer()
            }
            b'r' => {
                self.pos += 1;
                self.parse_real()
            }
            b'u' => {
                self.pos += 1;
                self.parse_uuid()
            }
            b'\'' | b'"' => Ok(Value::String(self.parse_quoted_string()?)),
            b's' => {
                self.pos += 1;
                let raw = self.parse_sized_raw()?;
                Ok(Value::String(self.utf8(raw, start)?))
            }
            b'l' => {
                self.pos += 1;
                Ok(Value::Uri(self.parse_quoted_string()?))
            }
            b'd' => {
                self.pos += 1;
                self.parse_date()
            }
            b'b' => {
                self.pos += 1;
                self.parse_binary()
            }
            other => Err(self.error(format!(
                "unexpected byte '{}' at start of value",
                other.escape_ascii()
            ))),
        }
    }

    fn nested(&mut self, parse: fn(&mut Self) -> PResult<Value>) -> PResult<Value> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(format!("nesting deeper than {MAX_DEPTH}")));
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn parse_map(&mut self) -> PResult<Value> {
        self.expect(b'{')?;
        let mut map = Map::new();
        self.skip_ws();
        if self.eat(b"}") {
            return Ok(Value::Map(map));
        }
        loop {
            self.skip_ws();
            let key = self.parse_key()?;
            self.skip_ws();
            self.expect(b':')?;
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_ws();
            let at = self.pos;
            match self.next_byte()? {
                b',' => continue,
                b'}' => return Ok(Value::Map(map)),
                b => {
                    return Err(self.error_at(
                        at,
                        format!("expected ',' or '}}' in map, found '{}'", b.escape_ascii()),
                    ))
                }
            }
        }
    }

    fn parse_key(&mut self) -> PResult<String> {
        let start = self.pos;
        match self.peek() {
            Some(b'\'' | b'"') => self.parse_quoted_string(),
            Some(b's') => {
                self.pos += 1;
                let raw = self.parse_sized_raw()?;
                self.utf8(raw, start)
            }
            _ => Err(self.error("expected quoted map key")),
        }
    }

    fn parse_array(&mut self) -> PResult<Value> {
        self.expect(b'[')?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.eat(b"]") {
            return Ok(Value::Array(items));
        }
        loop {
            items.push(self.parse_value()?);
            self.skip_ws();
            let at = self.pos;
            match self.next_byte()? {
                b',' => continue,
                b']' => return Ok(Value::Array(items)),
                b => {
                    return Err(self.error_at(
                        at,
                        format!("expected ',' or ']' in array, found '{}'", b.escape_ascii()),
                    ))
                }
            }
        }
    }

    fn parse_integer(&mut self) -> PResult<Value> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.data[start..self.pos]).unwrap_or_default();
        text.parse::<i64>()
            .map(Value::Integer)
            .map_err(|err| self.error_at(start, format!("bad integer {text:?}: {err}")))
    }

    fn parse_real(&mut self) -> PResult<Value> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b"+-.".contains(&b)) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.data[start..self.pos]).unwrap_or_default();
        text.parse::<f64>()
            .map(Value::Real)
            .map_err(|err| self.error_at(start, format!("bad real {text:?}: {err}")))
    }

    fn parse_uuid(&mut self) -> PResult<Value> {
        let start = self.pos;
        let end = start + UUID_TEXT_LEN;
        let Some(raw) = self.data.get(start..end) else {
            return Err(self.error_at(start, "truncated uuid"));
        };
        let text = std::str::from_utf8(raw).map_err(|_| self.error_at(start, "bad uuid"))?;
        let id = Uuid::parse_str(text)
            .map_err(|err| self.error_at(start, format!("bad uuid {text:?}: {err}")))?;
        self.pos = end;
        Ok(Value::Uuid(id))
    }

    fn parse_date(&mut self) -> PResult<Value> {
        let start = self.pos;
        let text = self.parse_quoted_string()?;
        let date = DateTime::parse_from_rfc3339(&text)
            .map_err(|err| self.error_at(start, format!("bad date {text:?}: {err}")))?;
        Ok(Value::Date(date.with_timezone(&Utc)))
    }

    fn parse_binary(&mut self) -> PResult<Value> {
        let start = self.pos;
        if self.eat(b"64") {
            let text = self.parse_quoted_string()?;
            let compact: String = text.split_ascii_whitespace().collect();
            return STANDARD
                .decode(compact.as_bytes())
                .map(Value::Binary)
                .map_err(|err| self.error_at(start, format!("bad base64: {err}")));
        }
        if self.eat(b"16") {
            let text = self.parse_quoted_string()?;
            return decode_hex(&text)
                .map(Value::Binary)
                .ok_or_else(|| self.error_at(start, "bad base16"));
        }
        if self.peek() == Some(b'(') {
            return Ok(Value::Binary(self.parse_sized_raw()?.to_vec()));
        }
        Err(self.error("expected b64, b16 or b(N) binary"))
    }

    /// `(N)` followed by a quote, exactly N raw bytes, and the same quote.
    fn parse_sized_raw(&mut self) -> PResult<&'a [u8]> {
        self.expect(b'(')?;
        let digits_start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        let len: usize = std::str::from_utf8(&self.data[digits_start..self.pos])
            .unwrap_or_default()
            .parse()
            .map_err(|_| self.error_at(digits_start, "bad length in sized value"))?;
        self.expect(b')')?;

        let quote_at = self.pos;
        let quote = self.next_byte()?;
        if quote != b'"' && quote != b'\'' {
            return Err(self.error_at(quote_at, "expected quote after sized length"));
        }
        let end = self.pos.saturating_add(len);
        let data = self.data;
        let Some(raw) = data.get(self.pos..end) else {
            return Err(self.error(format!("sized value declares {len} bytes past end of input")));
        };
        self.pos = end;
        self.expect(quote)?;
        Ok(raw)
    }

    /// A `'..'` or `".."` string with backslash escapes.
    fn parse_quoted_string(&mut self) -> PResult<String> {
        let start = self.pos;
        let quote = self.next_byte()?;
        if quote != b'"' && quote != b'\'' {
            return Err(self.error_at(start, "expected quoted string"));
        }
        let mut buf = Vec::new();
        loop {
            let b = self
                .next_byte()
                .map_err(|_| self.error_at(start, "unterminated string"))?;
            match b {
                b'\\' => buf.push(self.parse_escape()?),
                b if b == quote => break,
                b => buf.push(b),
            }
        }
        self.utf8(&buf, start)
    }

    fn parse_escape(&mut self) -> PResult<u8> {
        let at = self.pos;
        Ok(match self.next_byte()? {
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'v' => 0x0b,
            b'x' => {
                let hex = self
                    .data
                    .get(self.pos..self.pos + 2)
                    .and_then(|pair| std::str::from_utf8(pair).ok())
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| self.error_at(at, "bad \\x escape"))?;
                self.pos += 2;
                hex
            }
            other => other,
        })
    }

    fn utf8(&self, raw: &[u8], start: usize) -> PResult<String> {
        String::from_utf8(raw.to_vec()).map_err(|err| {
            self.error_at(
                start + err.utf8_error().valid_up_to(),
                "string is not valid UTF-8",
            )
        })
    }
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
        })
        .collect()
}
