use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use winnow::ascii::till_line_ending;
use winnow::combinator::{alt, cut_err, opt, repeat, terminated};
use winnow::error::{ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};

use crate::types::value::{Struct, Value};

// -- Whitespace & comments --------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    let _: () = repeat(
        0..,
        alt((
            take_while(1.., |c: char| c.is_ascii_whitespace()).void(),
            ("//", till_line_ending).void(),
            block_comment,
        )),
    )
    .parse_next(input)?;
    Ok(())
}

fn block_comment(input: &mut &str) -> ModalResult<()> {
    "/*".parse_next(input)?;
    loop {
        if opt("*/").parse_next(input)?.is_some() {
            return Ok(());
        }
        let _ = any.parse_next(input)?;
    }
}

// -- Symbols, field names & annotations -------------------------------------

fn identifier<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '_' || c == '$'),
        take_while(0.., |c: char| {
            c.is_ascii_alphanumeric() || c == '_' || c == '$'
        }),
    )
        .take()
        .parse_next(input)
}

/// Body of a quoted token; the opening delimiter is already consumed.
fn quoted_text(input: &mut &str, delimiter: char) -> ModalResult<String> {
    let mut text = String::new();
    loop {
        let ch = any.parse_next(input)?;
        if ch == delimiter {
            return Ok(text);
        }
        if ch == '\\' {
            let escaped = any.parse_next(input)?;
            match escaped {
                'n' => text.push('\n'),
                't' => text.push('\t'),
                'r' => text.push('\r'),
                '0' => text.push('\0'),
                '\'' | '"' | '\\' | '/' => text.push(escaped),
                other => {
                    text.push('\\');
                    text.push(other);
                }
            }
        } else {
            text.push(ch);
        }
    }
}

fn string_literal(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    quoted_text(input, '"')
}

fn quoted_symbol(input: &mut &str) -> ModalResult<String> {
    '\''.parse_next(input)?;
    quoted_text(input, '\'')
}

fn symbol_text(input: &mut &str) -> ModalResult<String> {
    alt((identifier.map(ToOwned::to_owned), quoted_symbol, string_literal)).parse_next(input)
}

fn annotations(input: &mut &str) -> ModalResult<Vec<String>> {
    repeat(0.., terminated(symbol_text, (ws, "::", ws))).parse_next(input)
}

// -- Scalars ----------------------------------------------------------------

/// `null`, a typed null, `true`/`false`, `nan`, or a bare symbol.
fn keyword_or_symbol(input: &mut &str) -> ModalResult<Value> {
    let word = identifier.parse_next(input)?;
    match word {
        "null" => {
            // Typed nulls such as null.struct all collapse to plain null.
            let _ = opt(('.', identifier)).parse_next(input)?;
            Ok(Value::null())
        }
        "true" => Ok(Value::from(true)),
        "false" => Ok(Value::from(false)),
        "nan" => Ok(Value::from(f64::NAN)),
        _ => Ok(Value::symbol(word)),
    }
}

/// Integers, decimals (`1.5`, `2d3`), and floats (`1e0`, `2.5e-3`).
fn number(input: &mut &str) -> ModalResult<Value> {
    let token = (
        opt('-'),
        take_while(1.., |c: char| c.is_ascii_digit()),
        opt(('.', take_while(0.., |c: char| c.is_ascii_digit()))),
        opt((
            one_of(['e', 'E', 'd', 'D']),
            opt(one_of(['+', '-'])),
            take_while(1.., |c: char| c.is_ascii_digit()),
        )),
    )
        .take()
        .parse_next(input)?;

    let fail = || ErrMode::from_input(input).cut();
    if token.contains(['e', 'E']) {
        let float: f64 = token.parse().map_err(|_| fail())?;
        Ok(Value::from(float))
    } else if token.contains(['d', 'D']) {
        let scientific = token.replace(['d', 'D'], "e");
        let decimal = Decimal::from_scientific(&scientific).map_err(|_| fail())?;
        Ok(Value::from(decimal))
    } else if token.contains('.') {
        let trimmed = token.trim_end_matches('.');
        let decimal: Decimal = trimmed.parse().map_err(|_| fail())?;
        Ok(Value::from(decimal))
    } else {
        let int: i128 = token.parse().map_err(|_| fail())?;
        Ok(Value::from(int))
    }
}

/// `2018-01-02` or `2018-01-02T01:23:45.678Z` (offsets allowed).
fn timestamp(input: &mut &str) -> ModalResult<Value> {
    let digits = |n: usize| take_while(n..=n, |c: char| c.is_ascii_digit());
    let token = (
        digits(4),
        '-',
        digits(2),
        '-',
        digits(2),
        opt((
            'T',
            digits(2),
            ':',
            digits(2),
            ':',
            digits(2),
            opt(('.', take_while(1.., |c: char| c.is_ascii_digit()))),
            alt((
                'Z'.void(),
                (one_of(['+', '-']), digits(2), ':', digits(2)).void(),
            )),
        )),
    )
        .take()
        .parse_next(input)?;

    let fail = || ErrMode::from_input(input).cut();
    let parsed: DateTime<FixedOffset> = if token.contains('T') {
        DateTime::parse_from_rfc3339(token).map_err(|_| fail())?
    } else {
        let date = NaiveDate::parse_from_str(token, "%Y-%m-%d").map_err(|_| fail())?;
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(fail)?;
        let utc = FixedOffset::east_opt(0).ok_or_else(fail)?;
        DateTime::from_naive_utc_and_offset(midnight, utc)
    };
    Ok(Value::from(parsed))
}

fn blob(input: &mut &str) -> ModalResult<Value> {
    "{{".parse_next(input)?;
    let content = take_while(0.., |c: char| {
        c.is_ascii_alphanumeric() || c.is_ascii_whitespace() || matches!(c, '+' | '/' | '=')
    })
    .parse_next(input)?;
    let bytes = decode_base64(content).ok_or_else(|| ErrMode::from_input(input).cut())?;
    cut_err("}}").parse_next(input)?;
    Ok(Value::from(bytes))
}

fn decode_base64(text: &str) -> Option<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for c in text.chars().filter(|c| !c.is_ascii_whitespace()) {
        if c == '=' {
            break;
        }
        let sextet = match c {
            'A'..='Z' => c as u32 - 'A' as u32,
            'a'..='z' => c as u32 - 'a' as u32 + 26,
            '0'..='9' => c as u32 - '0' as u32 + 52,
            '+' => 62,
            '/' => 63,
            _ => return None,
        };
        buffer = (buffer << 6) | sextet;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            bytes.push((buffer >> bits) as u8);
        }
    }
    Some(bytes)
}

// -- Containers -------------------------------------------------------------

fn list(input: &mut &str) -> ModalResult<Value> {
    '['.parse_next(input)?;
    let mut elements = Vec::new();
    loop {
        ws.parse_next(input)?;
        if opt(']').parse_next(input)?.is_some() {
            break;
        }
        elements.push(value.parse_next(input)?);
        ws.parse_next(input)?;
        if opt(',').parse_next(input)?.is_none() {
            cut_err(']')
                .context(StrContext::Expected(StrContextValue::Description(
                    "',' or ']'",
                )))
                .parse_next(input)?;
            break;
        }
    }
    Ok(Value::from(elements))
}

fn struct_value(input: &mut &str) -> ModalResult<Value> {
    '{'.parse_next(input)?;
    let mut fields = Struct::new();
    loop {
        ws.parse_next(input)?;
        if opt('}').parse_next(input)?.is_some() {
            break;
        }
        let name = cut_err(symbol_text)
            .context(StrContext::Expected(StrContextValue::Description(
                "field name",
            )))
            .parse_next(input)?;
        ws.parse_next(input)?;
        cut_err(':').parse_next(input)?;
        let field_value = cut_err(value).parse_next(input)?;
        fields.push(name, field_value);
        ws.parse_next(input)?;
        if opt(',').parse_next(input)?.is_none() {
            cut_err('}')
                .context(StrContext::Expected(StrContextValue::Description(
                    "',' or '}'",
                )))
                .parse_next(input)?;
            break;
        }
    }
    Ok(Value::from(fields))
}

// -- Values -----------------------------------------------------------------

fn value(input: &mut &str) -> ModalResult<Value> {
    ws.parse_next(input)?;
    let annotations = annotations.parse_next(input)?;
    let base = base_value.parse_next(input)?;
    if annotations.is_empty() {
        Ok(base)
    } else {
        Ok(base.with_annotations(annotations))
    }
}

fn base_value(input: &mut &str) -> ModalResult<Value> {
    alt((
        blob,
        struct_value,
        list,
        string_literal.map(Value::from),
        quoted_symbol.map(Value::symbol),
        timestamp,
        "+inf".value(Value::from(f64::INFINITY)),
        "-inf".value(Value::from(f64::NEG_INFINITY)),
        number,
        keyword_or_symbol,
    ))
    .context(StrContext::Expected(StrContextValue::Description("value")))
    .parse_next(input)
}

// -- Top-level parser -------------------------------------------------------

pub(super) fn document(input: &mut &str) -> ModalResult<Vec<Value>> {
    let values: Vec<Value> = repeat(0.., value).parse_next(input)?;
    ws.parse_next(input)?;
    Ok(values)
}
