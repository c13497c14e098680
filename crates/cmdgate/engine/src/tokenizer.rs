//! Splits raw argument text into tokens and coerces them against an
//! [`ArgSpec`].

use cmdgate_types::{ArgFlags, ArgValue, DispatchError, ErrorKind};
use serde_json::json;

use crate::context::ScratchBuffer;
use crate::spec::ArgSpec;

struct Token {
    text: String,
    quoted: bool,
}

/// Parse `text` into coerced values, one per slot.
///
/// Tokens past `limit` are reported as extraneous without being coerced.
pub fn parse_arguments(
    text: &str,
    spec: &ArgSpec,
    buffer: &mut ScratchBuffer,
    limit: usize,
) -> Result<Vec<ArgValue>, DispatchError> {
    let mut values = Vec::new();
    let mut rest = text.trim_start();

    while !rest.is_empty() {
        let index = values.len();
        if index >= limit {
            return Err(DispatchError::new(
                ErrorKind::ExtraneousArgs,
                format!("more than {limit} arguments supplied"),
            )
            .with_detail(json!({ "limit": limit })));
        }

        let slot = spec.slot(index);
        if slot.contains(ArgFlags::GREEDY) {
            let remainder = rest.trim_end();
            buffer.push(remainder)?;
            values.push(ArgValue::String(remainder.to_string()));
            break;
        }

        let (token, remainder) = next_token(rest, index)?;
        buffer.push(&token.text)?;
        values.push(coerce(token, slot, index)?);
        rest = remainder.trim_start();
    }

    Ok(values)
}

fn next_token(input: &str, index: usize) -> Result<(Token, &str), DispatchError> {
    let mut chars = input.char_indices();
    let quote = match input.chars().next() {
        Some(q @ ('\'' | '"')) => q,
        _ => {
            let end = input.find(char::is_whitespace).unwrap_or(input.len());
            let token = Token {
                text: input[..end].to_string(),
                quoted: false,
            };
            return Ok((token, &input[end..]));
        }
    };

    chars.next();
    let mut text = String::new();
    while let Some((pos, ch)) = chars.next() {
        if ch == '\\' {
            match chars.clone().next() {
                Some((_, next)) if next == quote || next == '\\' => {
                    text.push(next);
                    chars.next();
                }
                _ => text.push(ch),
            }
            continue;
        }
        if ch == quote {
            let remainder = &input[pos + ch.len_utf8()..];
            if remainder.chars().next().is_some_and(|c| !c.is_whitespace()) {
                return Err(DispatchError::new(
                    ErrorKind::SyntaxError,
                    format!("unexpected character after closing quote of argument {index}"),
                )
                .with_detail(json!({ "index": index })));
            }
            return Ok((Token { text, quoted: true }, remainder));
        }
        text.push(ch);
    }

    Err(DispatchError::new(
        ErrorKind::SyntaxError,
        format!("missing closing quote ({quote}) for argument {index}"),
    )
    .with_detail(json!({ "index": index, "quote": quote.to_string() })))
}

fn coerce(token: Token, slot: ArgFlags, index: usize) -> Result<ArgValue, DispatchError> {
    if token.quoted {
        if !slot.accepts(ArgFlags::STRING) {
            return Err(unsupported(&token.text, slot, index));
        }
        return Ok(ArgValue::String(fold_case(token.text, slot)));
    }

    let text = token.text;
    if slot.accepts(ArgFlags::INTEGER) {
        if let Ok(v) = text.parse::<i64>() {
            return Ok(ArgValue::Integer(v));
        }
    }
    if slot.accepts(ArgFlags::FLOAT) && looks_numeric(&text) {
        if let Ok(v) = text.parse::<f64>() {
            return Ok(ArgValue::Float(v));
        }
    }
    if slot.accepts(ArgFlags::BOOLEAN) {
        if let Some(v) = parse_bool(&text) {
            return Ok(ArgValue::Boolean(v));
        }
    }
    if slot.accepts(ArgFlags::STRING) {
        return Ok(ArgValue::String(fold_case(text, slot)));
    }

    let out_of_range = slot.contains(ArgFlags::INTEGER) && is_integer_literal(&text);
    let malformed = slot.intersects(ArgFlags::INTEGER | ArgFlags::FLOAT)
        && looks_numeric(&text)
        && text.parse::<f64>().is_err();
    if out_of_range || malformed {
        return Err(DispatchError::new(
            ErrorKind::SyntaxError,
            format!("malformed number {text:?} for argument {index}"),
        )
        .with_detail(json!({ "index": index, "token": text })));
    }
    Err(unsupported(&text, slot, index))
}

fn is_integer_literal(text: &str) -> bool {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    !body.is_empty() && body.chars().all(|c| c.is_ascii_digit())
}

fn unsupported(text: &str, slot: ArgFlags, index: usize) -> DispatchError {
    DispatchError::new(
        ErrorKind::UnsupportedArg,
        format!("argument {index} expects {}, got {text:?}", slot.describe()),
    )
    .with_detail(json!({
        "index": index,
        "expected": slot.describe(),
        "token": text,
    }))
}

fn fold_case(text: String, slot: ArgFlags) -> String {
    if slot.contains(ArgFlags::LOWER) {
        text.to_lowercase()
    } else if slot.contains(ArgFlags::UPPER) {
        text.to_uppercase()
    } else {
        text
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "on" => Some(true),
        "false" | "off" => Some(false),
        _ => None,
    }
}

/// Digits with an optional sign, at most one decimal point and an optional
/// signed exponent. Keeps words like `inf` or `nan` from turning into floats.
fn looks_numeric(text: &str) -> bool {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    let mut digits = 0;
    let mut dots = 0;
    let mut exponent = false;
    let mut prev = None;
    for ch in body.chars() {
        match ch {
            '0'..='9' => digits += 1,
            '.' if !exponent => dots += 1,
            'e' | 'E' if digits > 0 && !exponent => exponent = true,
            '+' | '-' if matches!(prev, Some('e' | 'E')) => {}
            _ => return false,
        }
        prev = Some(ch);
    }
    digits > 0 && dots <= 1
}
