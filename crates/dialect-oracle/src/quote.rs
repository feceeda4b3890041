use tablelink_core::{Error, HostType, Result, StatementBuffer};

const IDENT_QUOTE: char = '"';
const STRING_QUOTE: char = '\'';

#[must_use]
pub fn quote_identifier(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push(IDENT_QUOTE);
    for ch in name.chars() {
        if ch == IDENT_QUOTE {
            quoted.push(IDENT_QUOTE);
        }
        quoted.push(ch);
    }
    quoted.push(IDENT_QUOTE);
    quoted
}

pub fn append_identifier(buf: &mut StatementBuffer, name: &str) -> Result<()> {
    buf.append(&quote_identifier(name))
}

/// Appends `text` with single quotes doubled, without surrounding quotes.
pub fn append_escaped(buf: &mut StatementBuffer, text: &str) -> Result<()> {
    buf.reserve(text.len() + text.len() / 8)?;
    for (index, segment) in text.split(STRING_QUOTE).enumerate() {
        if index > 0 {
            buf.append("''")?;
        }
        buf.append(segment)?;
    }
    Ok(())
}

pub fn append_string_literal(buf: &mut StatementBuffer, text: &str) -> Result<()> {
    buf.append_char(STRING_QUOTE)?;
    append_escaped(buf, text)?;
    buf.append_char(STRING_QUOTE)
}

pub fn append_hex_literal(buf: &mut StatementBuffer, bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return buf.append("EMPTY_BLOB()");
    }
    buf.reserve(bytes.len() * 2 + 12)?;
    buf.append("HEXTORAW('")?;
    for byte in bytes {
        buf.append_fmt(format_args!("{byte:02X}"))?;
    }
    buf.append("')")
}

/// Renders a host field value as a literal for a column of `host_type`.
pub fn append_column_value(
    buf: &mut StatementBuffer,
    host_type: HostType,
    value: Option<&[u8]>,
) -> Result<()> {
    let Some(bytes) = value else {
        return buf.append("NULL");
    };

    match host_type {
        HostType::Blob => append_hex_literal(buf, bytes),
        HostType::Date => {
            let text = utf8(bytes)?;
            if text.len() == 10 {
                buf.append_char(STRING_QUOTE)?;
                append_escaped(buf, text)?;
                buf.append(" 00:00:00'")
            } else {
                append_string_literal(buf, text)
            }
        }
        host_type if host_type.is_numeric() => {
            let text = utf8(bytes)?;
            if !is_numeric_literal(text) {
                return Err(Error::marshal(format!(
                    "`{text}` is not a numeric literal"
                )));
            }
            buf.append(text)
        }
        _ => append_string_literal(buf, utf8(bytes)?),
    }
}

#[must_use]
pub fn is_numeric_literal(text: &str) -> bool {
    let body = text.strip_prefix(['-', '+']).unwrap_or(text);
    let mut digits = 0;
    let mut seen_dot = false;
    let mut seen_exponent = false;
    let mut previous = ' ';
    for ch in body.chars() {
        match ch {
            '0'..='9' => digits += 1,
            '.' if !seen_dot && !seen_exponent => seen_dot = true,
            'e' | 'E' if digits > 0 && !seen_exponent => seen_exponent = true,
            '-' | '+' if matches!(previous, 'e' | 'E') => {}
            _ => return false,
        }
        previous = ch;
    }
    digits > 0 && !matches!(previous, 'e' | 'E' | '-' | '+')
}

/// Remote column type used when staging host values.
#[must_use]
pub fn oracle_column_type(host_type: HostType, national: bool) -> String {
    let varchar = if national { "NVARCHAR2" } else { "VARCHAR2" };
    match host_type {
        HostType::TinyInt => "NUMBER(3)".to_string(),
        HostType::SmallInt => "NUMBER(5)".to_string(),
        HostType::Int => "NUMBER(10)".to_string(),
        HostType::BigInt => "NUMBER(19)".to_string(),
        HostType::Decimal { precision, scale } => format!("NUMBER({precision},{scale})"),
        HostType::Float | HostType::Double => "BINARY_DOUBLE".to_string(),
        HostType::Char { length } => {
            let char_type = if national { "NCHAR" } else { "CHAR" };
            format!("{char_type}({length})")
        }
        HostType::Varchar { length } => format!("{varchar}({length})"),
        HostType::Text => format!("{varchar}(4000)"),
        HostType::Blob => "RAW(2000)".to_string(),
        HostType::Date | HostType::DateTime | HostType::Timestamp => "DATE".to_string(),
        HostType::Time => format!("{varchar}(8)"),
        HostType::Year => "NUMBER(4)".to_string(),
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| Error::marshal("field value is not valid UTF-8"))
}
