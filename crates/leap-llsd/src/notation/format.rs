use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::SecondsFormat;

use crate::value::Value;

/// Serialize `value` as LLSD notation.
pub fn to_notation(value: &Value) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    write_notation(value, &mut out);
    out
}

/// Append the notation form of `value` to `out`.
pub fn write_notation(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Undefined => out.push(b'!'),
        Value::Boolean(b) => out.push(if *b { b'1' } else { b'0' }),
        Value::Integer(i) => {
            out.push(b'i');
            out.extend_from_slice(i.to_string().as_bytes());
        }
        Value::Real(r) => {
            out.push(b'r');
            out.extend_from_slice(format_real(*r).as_bytes());
        }
        Value::String(s) => write_quoted(s, b'\'', out),
        Value::Uuid(u) => {
            out.push(b'u');
            out.extend_from_slice(u.hyphenated().to_string().as_bytes());
        }
        Value::Date(d) => {
            out.push(b'd');
            write_quoted(&d.to_rfc3339_opts(SecondsFormat::AutoSi, true), b'"', out);
        }
        Value::Uri(u) => {
            out.push(b'l');
            write_quoted(u, b'"', out);
        }
        Value::Binary(bytes) => {
            out.extend_from_slice(b"b64");
            write_quoted(&STANDARD.encode(bytes), b'"', out);
        }
        Value::Array(items) => {
            out.push(b'[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(b',');
                }
                write_notation(item, out);
            }
            out.push(b']');
        }
        Value::Map(map) => {
            out.push(b'{');
            for (idx, (key, item)) in map.iter().enumerate() {
                if idx > 0 {
                    out.push(b',');
                }
                write_quoted(key, b'\'', out);
                out.push(b':');
                write_notation(item, out);
            }
            out.push(b'}');
        }
    }
}

fn format_real(r: f64) -> String {
    if r.is_nan() {
        "nan".to_string()
    } else if r == f64::INFINITY {
        "inf".to_string()
    } else if r == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        // Debug gives the shortest repr that parses back to the same f64.
        format!("{r:?}")
    }
}

fn write_quoted(s: &str, quote: u8, out: &mut Vec<u8>) {
    out.push(quote);
    for &b in s.as_bytes() {
        if b == b'\\' || b == quote {
            out.push(b'\\');
        }
        out.push(b);
    }
    out.push(quote);
}
