use crate::error::CodecError;
use std::collections::BTreeMap;

const DELIMITER: u8 = b'&';
const LENGTH_OPEN: u8 = b'[';
const LENGTH_CLOSE: u8 = b']';
const ASSIGN: u8 = b'=';

/// A single `name`/`value` pair as it travels on the wire.
///
/// The value may contain any character, including the `&` and `=` delimiters;
/// the explicit length prefix is what keeps such values unambiguous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldToken {
    pub name: String,
    pub value: String,
}

impl FieldToken {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

fn check_name(name: &str) -> Result<(), CodecError> {
    let reserved = [DELIMITER, LENGTH_OPEN, LENGTH_CLOSE, ASSIGN];
    if name.is_empty() || name.bytes().any(|b| reserved.contains(&b)) {
        return Err(CodecError::InvalidFieldName(name.to_string()));
    }
    Ok(())
}

/// Encodes one field as `NAME[LEN]=VALUE&`, where `LEN` is the byte length of
/// `value`.
///
/// An empty value is encoded as a zero-length token (`NAME[0]=&`). Omitting an
/// absent field is the caller's decision, see [`RequestBuilder::push_opt`].
pub fn encode_field(name: &str, value: &str) -> Result<String, CodecError> {
    check_name(name)?;
    Ok(format!("{name}[{}]={value}&", value.len()))
}

/// Saved position of a [`RequestBuilder`], used to roll back a partially
/// written contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    bytes: usize,
    tokens: usize,
}

/// The in-progress request buffer a transaction hands to each contributor.
///
/// Tokens are appended in call order; duplicate names are kept as separate
/// tokens.
#[derive(Debug, Default, Clone)]
pub struct RequestBuilder {
    buf: String,
    tokens: usize,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field, including an empty value as a zero-length token.
    pub fn push(&mut self, name: &str, value: &str) -> Result<(), CodecError> {
        let token = encode_field(name, value)?;
        self.buf.push_str(&token);
        self.tokens += 1;
        Ok(())
    }

    /// Appends a field only when a value is present.
    pub fn push_opt(&mut self, name: &str, value: Option<&str>) -> Result<(), CodecError> {
        match value {
            Some(value) => self.push(name, value),
            None => Ok(()),
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            bytes: self.buf.len(),
            tokens: self.tokens,
        }
    }

    /// Discards everything appended since `checkpoint` was taken.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.buf.truncate(checkpoint.bytes);
        self.tokens = checkpoint.tokens;
    }

    pub fn token_count(&self) -> usize {
        self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens == 0
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Returns the assembled record without its trailing delimiter.
    pub fn finish(mut self) -> String {
        if self.buf.ends_with(DELIMITER as char) {
            self.buf.pop();
        }
        self.buf
    }
}

/// Encodes a whole record from already-built tokens, without the trailing
/// delimiter.
pub fn encode_record<'a, I>(tokens: I) -> Result<String, CodecError>
where
    I: IntoIterator<Item = &'a FieldToken>,
{
    let mut builder = RequestBuilder::new();
    for token in tokens {
        builder.push(&token.name, &token.value)?;
    }
    Ok(builder.finish())
}

/// Decodes a record into its tokens, honouring each declared length.
///
/// The value of every token is taken as exactly `LEN` bytes regardless of
/// content; only then is a `&` (or end of input) expected. An empty record
/// decodes to no tokens and a single trailing `&` is accepted.
pub fn decode_record(record: &str) -> Result<Vec<FieldToken>, CodecError> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < record.len() {
        let (token, next) = decode_token(record, pos)?;
        tokens.push(token);
        pos = next;
    }
    Ok(tokens)
}

/// Decodes a record into a name/value map. Later duplicates win.
pub fn decode_map(record: &str) -> Result<BTreeMap<String, String>, CodecError> {
    Ok(into_map(decode_record(record)?))
}

pub fn into_map(tokens: impl IntoIterator<Item = FieldToken>) -> BTreeMap<String, String> {
    tokens
        .into_iter()
        .map(|token| (token.name, token.value))
        .collect()
}

fn decode_token(record: &str, start: usize) -> Result<(FieldToken, usize), CodecError> {
    let bytes = record.as_bytes();
    let rest = bytes.get(start..).unwrap_or_default();

    let open = rest
        .iter()
        .position(|&b| b == LENGTH_OPEN)
        .ok_or(CodecError::MissingLength { offset: start })?;
    // '[' is ASCII, so both slice bounds below sit on char boundaries.
    let name = &record[start..start + open];
    if check_name(name).is_err() {
        return Err(CodecError::MissingLength { offset: start });
    }

    let len_start = start + open + 1;
    let close = bytes[len_start..]
        .iter()
        .position(|&b| b == LENGTH_CLOSE)
        .ok_or(CodecError::MissingSeparator { offset: len_start })?;
    let digits = &record[len_start..len_start + close];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CodecError::InvalidLength { offset: len_start });
    }
    let declared: usize = digits
        .parse()
        .map_err(|_| CodecError::InvalidLength { offset: len_start })?;

    let assign = len_start + close + 1;
    if bytes.get(assign) != Some(&ASSIGN) {
        return Err(CodecError::MissingSeparator {
            offset: len_start + close,
        });
    }

    let value_start = assign + 1;
    let remaining = bytes.len() - value_start;
    if declared > remaining {
        return Err(CodecError::LengthOverrun {
            offset: value_start,
            declared,
            remaining,
        });
    }
    let value_end = value_start + declared;
    let value = std::str::from_utf8(&bytes[value_start..value_end])
        .map_err(|_| CodecError::InvalidUtf8 {
            offset: value_start,
        })?;

    let next = match bytes.get(value_end) {
        None => value_end,
        Some(&DELIMITER) => value_end + 1,
        Some(_) => return Err(CodecError::MissingDelimiter { offset: value_end }),
    };

    Ok((FieldToken::new(name, value), next))
}
