//! Character encodings a formatter can read and write.
//!
//! Decoding is lossy (bad sequences become U+FFFD). Before any formatting
//! happens, [`encoding_error_message`] tells apart a replacement character
//! that really is in the file from one produced by an encoding mismatch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Character produced by lossy decoding for unmappable input.
pub const UNREPRESENTABLE: char = '\u{FFFD}';

/// Characters of context shown on each side of an encoding error.
const CONTEXT: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "iso-8859-1")]
    Iso8859_1,
    #[serde(rename = "us-ascii")]
    UsAscii,
}

impl Encoding {
    pub const ALL: [Encoding; 3] = [Encoding::Utf8, Encoding::Iso8859_1, Encoding::UsAscii];

    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Iso8859_1 => "ISO-8859-1",
            Encoding::UsAscii => "US-ASCII",
        }
    }

    /// Decode `bytes`, replacing anything unmappable with [`UNREPRESENTABLE`].
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Iso8859_1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Encoding::UsAscii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { char::from(b) } else { UNREPRESENTABLE })
                .collect(),
        }
    }

    /// Decode `bytes`, or `None` if any sequence is malformed or unmappable.
    pub fn decode_strict(self, bytes: &[u8]) -> Option<String> {
        match self {
            Encoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_string),
            Encoding::Iso8859_1 => Some(self.decode(bytes)),
            Encoding::UsAscii => bytes.is_ascii().then(|| self.decode(bytes)),
        }
    }

    /// Encode `text`; characters the encoding cannot hold become `?`.
    pub fn encode(self, text: &str) -> Vec<u8> {
        let limit = match self {
            Encoding::Utf8 => return text.as_bytes().to_vec(),
            Encoding::Iso8859_1 => 0xFF,
            Encoding::UsAscii => 0x7F,
        };
        text.chars()
            .map(|c| u8::try_from(u32::from(c)).ok().filter(|&b| u32::from(b) <= limit))
            .map(|b| b.unwrap_or(b'?'))
            .collect()
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin1" => Ok(Encoding::Iso8859_1),
            "us-ascii" | "ascii" => Ok(Encoding::UsAscii),
            other => Err(format!("unsupported encoding '{other}'")),
        }
    }
}

/// Describe why `bytes` did not decode cleanly under `encoding`.
///
/// `chars` is the lossy decoding of `bytes`. Returns `None` when there is
/// nothing to report, including when U+FFFD is genuinely part of the file.
pub fn encoding_error_message(chars: &str, bytes: &[u8], encoding: Encoding) -> Option<String> {
    let decoded: Vec<char> = chars.chars().collect();
    let unrepresentable = decoded.iter().position(|&c| c == UNREPRESENTABLE)?;
    if encoding.decode_strict(bytes).is_some() {
        return None;
    }

    let mut message = String::from("Encoding error! ");
    if encoding == Encoding::Utf8 {
        message.push_str("Settle uses UTF-8 by default.");
    } else {
        message.push_str(&format!("You configured Settle to use {}.", encoding.name()));
    }

    let mut line = 1;
    let mut col = 1;
    for &c in &decoded[..unrepresentable] {
        if c == '\n' {
            line += 1;
            col = 1;
        } else if c != '\r' {
            col += 1;
        }
    }
    message.push_str(&format!("  At line {line} col {col}:"));

    append_example(&mut message, encoding, bytes, unrepresentable, true);
    for candidate in Encoding::ALL {
        if candidate != encoding {
            append_example(&mut message, candidate, bytes, unrepresentable, false);
        }
    }
    Some(message)
}

fn append_example(
    message: &mut String,
    encoding: Encoding,
    bytes: &[u8],
    start_point: usize,
    must: bool,
) {
    let decoded = if must {
        encoding.decode(bytes)
    } else {
        match encoding.decode_strict(bytes) {
            Some(decoded) => decoded,
            None => return,
        }
    };
    let chars: Vec<char> = decoded.chars().collect();
    let end = chars.len().min(start_point + CONTEXT + 1);
    let start = start_point.saturating_sub(CONTEXT).min(end);
    let snippet: String = chars[start..end]
        .iter()
        .map(|&c| match c {
            '\n' => '␤',
            '\r' => '␍',
            '\t' => '⇥',
            other => other,
        })
        .collect();
    message.push('\n');
    message.push_str(&snippet);
    message.push_str(" <- ");
    message.push_str(encoding.name());
}
