//! Base64 VLQ codec for the compact mapping grammar.
//!
//! A mapping stream is a list of generated lines separated by `;`, each a list
//! of segments separated by `,`. A segment holds 1, 4 or 5 signed integers:
//! generated column, source index, original line, original column, name index.
//! Every field is a delta against the previous segment's value of the same
//! field; only the generated column resets at a line boundary.

use smallvec::SmallVec;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const VLQ_SHIFT: u32 = 5;
const VLQ_CONTINUATION: i64 = 1 << VLQ_SHIFT;
const VLQ_MASK: i64 = VLQ_CONTINUATION - 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VlqError {
    #[error("invalid base64 digit {0:?}")]
    InvalidDigit(char),

    #[error("segment ends in the middle of a value")]
    Truncated,

    #[error("value does not fit in 32 bits")]
    Overflow,

    #[error("segment has {0} fields, expected 1, 4 or 5")]
    FieldCount(usize),
}

fn digit_value(byte: u8) -> Option<i64> {
    let v = match byte {
        b'A'..=b'Z' => byte - b'A',
        b'a'..=b'z' => byte - b'a' + 26,
        b'0'..=b'9' => byte - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(v as i64)
}

/// Append the VLQ encoding of `value` to `out`.
pub fn encode_value(value: i64, out: &mut String) {
    // Sign goes in the least significant bit.
    let mut vlq = if value < 0 { ((-value) << 1) | 1 } else { value << 1 };

    loop {
        let mut digit = vlq & VLQ_MASK;
        vlq >>= VLQ_SHIFT;
        if vlq > 0 {
            digit |= VLQ_CONTINUATION;
        }
        out.push(ALPHABET[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// Decode every value in one segment's text.
pub fn decode_values(text: &str) -> Result<SmallVec<[i64; 5]>, VlqError> {
    let mut values = SmallVec::new();
    let mut acc: i64 = 0;
    let mut shift: u32 = 0;
    let mut pending = false;

    for byte in text.bytes() {
        let digit = digit_value(byte).ok_or(VlqError::InvalidDigit(byte as char))?;

        if shift > 31 {
            return Err(VlqError::Overflow);
        }
        acc += (digit & VLQ_MASK) << shift;

        if digit & VLQ_CONTINUATION != 0 {
            shift += VLQ_SHIFT;
            pending = true;
            continue;
        }

        let negative = acc & 1 == 1;
        let magnitude = acc >> 1;
        values.push(if negative { -magnitude } else { magnitude });

        acc = 0;
        shift = 0;
        pending = false;
    }

    if pending {
        return Err(VlqError::Truncated);
    }

    Ok(values)
}

/// Position in an original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Original {
    pub source: i64,
    pub line: i64,
    pub column: i64,
    pub name: Option<i64>,
}

/// One decoded segment with absolute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub generated_column: i64,
    pub original: Option<Original>,
}

impl Segment {
    pub fn anchored(generated_column: i64, source: i64) -> Self {
        Self {
            generated_column,
            original: Some(Original { source, line: 0, column: 0, name: None }),
        }
    }
}

/// Relative-delta state shared by encoding and decoding.
///
/// The same type serves both directions: an encoder turns absolute segments
/// into deltas against its previous values, a decoder accumulates deltas back
/// into absolute values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Coder {
    pub(crate) prev_generated_column: i64,
    pub(crate) prev_source: i64,
    pub(crate) prev_line: i64,
    pub(crate) prev_column: i64,
    pub(crate) prev_name: i64,
}

impl Coder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start of a new generated line.
    pub fn reset_column(&mut self) {
        self.prev_generated_column = 0;
    }

    /// Account for `lines` original lines emitted without going through `encode`.
    pub fn adjust_line(&mut self, lines: i64) {
        self.prev_line += lines;
    }

    pub fn encode(&mut self, segment: &Segment) -> String {
        let mut out = String::with_capacity(8);
        self.encode_into(segment, &mut out);
        out
    }

    pub fn encode_into(&mut self, segment: &Segment, out: &mut String) {
        encode_value(segment.generated_column - self.prev_generated_column, out);
        self.prev_generated_column = segment.generated_column;

        let Some(original) = segment.original else {
            return;
        };

        encode_value(original.source - self.prev_source, out);
        self.prev_source = original.source;

        encode_value(original.line - self.prev_line, out);
        self.prev_line = original.line;

        encode_value(original.column - self.prev_column, out);
        self.prev_column = original.column;

        if let Some(name) = original.name {
            encode_value(name - self.prev_name, out);
            self.prev_name = name;
        }
    }

    pub fn decode(&mut self, text: &str) -> Result<Segment, VlqError> {
        let values = decode_values(text)?;

        match values.len() {
            1 | 4 | 5 => {}
            n => return Err(VlqError::FieldCount(n)),
        }

        self.prev_generated_column += values[0];
        let mut segment = Segment {
            generated_column: self.prev_generated_column,
            original: None,
        };

        if values.len() >= 4 {
            self.prev_source += values[1];
            self.prev_line += values[2];
            self.prev_column += values[3];

            let name = values.get(4).map(|delta| {
                self.prev_name += delta;
                self.prev_name
            });

            segment.original = Some(Original {
                source: self.prev_source,
                line: self.prev_line,
                column: self.prev_column,
                name,
            });
        }

        Ok(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: i64) -> String {
        let mut s = String::new();
        encode_value(value, &mut s);
        s
    }

    #[test]
    fn encodes_known_values() {
        assert_eq!(encoded(0), "A");
        assert_eq!(encoded(1), "C");
        assert_eq!(encoded(-1), "D");
        assert_eq!(encoded(3), "G");
        assert_eq!(encoded(5), "K");
        assert_eq!(encoded(16), "gB");
        assert_eq!(encoded(-17), "jB");
        assert_eq!(encoded(1000), "w+B");
    }

    #[test]
    fn decodes_multi_digit_values() {
        assert_eq!(decode_values("w+BjBA").unwrap().as_slice(), &[1000, -17, 0]);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(decode_values("A!"), Err(VlqError::InvalidDigit('!')));
        assert_eq!(decode_values("g"), Err(VlqError::Truncated));
        assert_eq!(Coder::new().decode("AA"), Err(VlqError::FieldCount(2)));
    }

    #[test]
    fn line_advance_token_is_aaca() {
        let mut coder = Coder::new();
        assert_eq!(coder.encode(&Segment::anchored(0, 0)), "AAAA");

        coder.reset_column();
        let next = Segment {
            generated_column: 0,
            original: Some(Original { source: 0, line: 1, column: 0, name: None }),
        };
        assert_eq!(coder.encode(&next), "AACA");
    }

    #[test]
    fn encoder_tracks_deltas_across_segments() {
        let mut coder = Coder::new();
        let stream: Vec<String> = [(0, 0), (3, 1), (8, 2)]
            .into_iter()
            .map(|(col, src)| coder.encode(&Segment::anchored(col, src)))
            .collect();

        assert_eq!(stream, ["AAAA", "GCAA", "KCAA"]);
    }

    #[test]
    fn decoder_accumulates_names_only_when_present() {
        let mut coder = Coder::new();
        let first = coder.decode("AAAAC").unwrap();
        let second = coder.decode("EAAA").unwrap();
        let third = coder.decode("CAAAC").unwrap();

        assert_eq!(first.original.unwrap().name, Some(1));
        assert_eq!(second.original.unwrap().name, None);
        assert_eq!(second.generated_column, 2);
        assert_eq!(third.original.unwrap().name, Some(2));
    }
}
