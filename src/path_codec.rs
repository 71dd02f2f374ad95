//! Decoder for git's quoted/escaped path encoding.
//!
//! `git ls-tree` wraps paths containing special or non-ASCII bytes in double
//! quotes and escapes the offending bytes, either as 3-digit octal values
//! (`\303\251`) or as single-character C escapes (`\t`, `\"`, `\\`). The
//! decoder must be bit-exact: a path decoded wrongly becomes a snapshot key
//! that silently diverges from the real file.

/// A listed path that cannot be decoded. Always fatal: a corrupt path cannot
/// be safely attributed a metadata record.
#[derive(Debug)]
pub enum PathCodecError {
    /// Opening quote without a matching closing quote.
    IllQuoted(Vec<u8>),
    /// Input ends in the middle of an escape sequence.
    DanglingBackslash(Vec<u8>),
    /// Octal escape with fewer than 3 digits, a non-octal digit, or a value
    /// above 0xFF.
    BadOctalEscape(Vec<u8>),
    /// Escape character outside git's C-escape table.
    BadEscapeChar(u8),
    /// Decoded bytes are not valid UTF-8.
    NotUtf8(std::string::FromUtf8Error),
}

impl std::fmt::Display for PathCodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathCodecError::IllQuoted(raw) => {
                write!(f, "path ill-quoted: `{}`", String::from_utf8_lossy(raw))
            }
            PathCodecError::DanglingBackslash(raw) => write!(
                f,
                "path ill-escaped, ends with dangling backslash: `{}`",
                String::from_utf8_lossy(raw)
            ),
            PathCodecError::BadOctalEscape(raw) => write!(
                f,
                "path ill-escaped, wrong octal escape sequence: `{}`",
                String::from_utf8_lossy(raw)
            ),
            PathCodecError::BadEscapeChar(c) => {
                write!(f, "path ill-escaped, wrong escaped character: `\\{}`", *c as char)
            }
            PathCodecError::NotUtf8(e) => write!(f, "decoded path is not valid UTF-8: {e}"),
        }
    }
}

impl std::error::Error for PathCodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PathCodecError::NotUtf8(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::string::FromUtf8Error> for PathCodecError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        PathCodecError::NotUtf8(e)
    }
}

/// Decodes one raw path field from `git ls-tree` output into canonical text.
pub fn decode(raw: &[u8]) -> Result<String, PathCodecError> {
    let content = if raw.starts_with(b"\"") {
        if raw.len() < 2 || !raw.ends_with(b"\"") {
            return Err(PathCodecError::IllQuoted(raw.to_vec()));
        }
        &raw[1..raw.len() - 1]
    } else {
        raw
    };

    let mut decoded = Vec::with_capacity(content.len());
    let mut idx = 0;
    while idx < content.len() {
        let c = content[idx];
        if c != b'\\' {
            decoded.push(c);
            idx += 1;
            continue;
        }

        // c is a backslash: the next byte selects the escape form.
        idx += 1;
        let escape = match content.get(idx) {
            Some(&b) => b,
            None => return Err(PathCodecError::DanglingBackslash(raw.to_vec())),
        };

        if escape.is_ascii_digit() {
            // Exactly 3 octal digits encoding a single byte.
            if idx + 3 > content.len() {
                return Err(PathCodecError::BadOctalEscape(raw.to_vec()));
            }
            let digits = &content[idx..idx + 3];
            let mut value: u16 = 0;
            for &d in digits {
                if !(b'0'..=b'7').contains(&d) {
                    return Err(PathCodecError::BadOctalEscape(raw.to_vec()));
                }
                value = value * 8 + u16::from(d - b'0');
            }
            if value > 0xFF {
                return Err(PathCodecError::BadOctalEscape(raw.to_vec()));
            }
            decoded.push(value as u8);
            idx += 3;
            continue;
        }

        decoded.push(decode_c_escape(escape)?);
        idx += 1;
    }

    Ok(String::from_utf8(decoded)?)
}

// The escape table git's own quoting emits.
fn decode_c_escape(c: u8) -> Result<u8, PathCodecError> {
    match c {
        b'a' => Ok(0x07),
        b'b' => Ok(0x08),
        b'f' => Ok(0x0c),
        b'n' => Ok(b'\n'),
        b'r' => Ok(b'\r'),
        b't' => Ok(b'\t'),
        b'v' => Ok(0x0b),
        b'\\' => Ok(b'\\'),
        b'"' => Ok(b'"'),
        other => Err(PathCodecError::BadEscapeChar(other)),
    }
}
