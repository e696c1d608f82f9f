//! Text encodings for socket payloads.
//!
//! Outgoing string payloads are encoded to bytes with [`Encoding::encode`].
//! Incoming socket chunks go through a [`StreamDecoder`], which holds back a
//! trailing partial character (or base64 group) until the next chunk arrives
//! so a multi-byte sequence split by TCP is never mangled.

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;

use crate::errors::ProtocolError;

const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const LENIENT_URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A supported payload encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// UTF-8 text (default).
    #[default]
    Utf8,
    /// 7-bit ASCII; the high bit is dropped when decoding.
    Ascii,
    /// ISO-8859-1, one character per byte. Also accepted as `binary`.
    Latin1,
    /// UTF-16 little endian. Also accepted as `ucs2`.
    Utf16Le,
    /// Standard base64 with padding.
    Base64,
    /// Lowercase hexadecimal.
    Hex,
}

impl Encoding {
    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "utf8",
            Self::Ascii => "ascii",
            Self::Latin1 => "latin1",
            Self::Utf16Le => "utf16le",
            Self::Base64 => "base64",
            Self::Hex => "hex",
        }
    }

    /// Encode a client string payload into the bytes written to the socket.
    ///
    /// `ascii` and `latin1` keep the low byte of every UTF-16 code unit.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, ProtocolError> {
        match self {
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            #[allow(clippy::cast_possible_truncation)]
            Self::Ascii | Self::Latin1 => Ok(text.encode_utf16().map(|unit| unit as u8).collect()),
            Self::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            Self::Base64 => decode_base64(text).ok_or(ProtocolError::InvalidPayloadEncoding(self)),
            Self::Hex => decode_hex(text).ok_or(ProtocolError::InvalidPayloadEncoding(self)),
        }
    }

    /// Create a streaming decoder for socket data in this encoding.
    pub fn decoder(self) -> StreamDecoder {
        StreamDecoder::new(self)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = ProtocolError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "ascii" => Ok(Self::Ascii),
            "latin1" | "binary" => Ok(Self::Latin1),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(Self::Utf16Le),
            "base64" => Ok(Self::Base64),
            "hex" => Ok(Self::Hex),
            _ => Err(ProtocolError::UnknownEncoding(name.to_owned())),
        }
    }
}

fn decode_base64(text: &str) -> Option<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.contains(['-', '_']) {
        LENIENT_URL_SAFE.decode(compact).ok()
    } else {
        LENIENT_STANDARD.decode(compact).ok()
    }
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    text.as_bytes()
        .chunks_exact(2)
        .map(|pair| {
            let hi = char::from(pair[0]).to_digit(16)?;
            let lo = char::from(pair[1]).to_digit(16)?;
            u8::try_from((hi << 4) | lo).ok()
        })
        .collect()
}

fn encode_hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(DIGITS[usize::from(byte >> 4)]));
        out.push(char::from(DIGITS[usize::from(byte & 0x0f)]));
    }
    out
}

/// Incremental bytes-to-text decoder for one socket.
#[derive(Debug, Clone)]
pub struct StreamDecoder {
    encoding: Encoding,
    pending: Vec<u8>,
}

impl StreamDecoder {
    /// Create an empty decoder.
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            pending: Vec::new(),
        }
    }

    /// The encoding this decoder produces.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Decode a chunk, holding back any incomplete trailing sequence.
    pub fn write(&mut self, chunk: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);

        let held = match self.encoding {
            Encoding::Utf8 => incomplete_utf8_tail(&buf),
            Encoding::Utf16Le => incomplete_utf16_tail(&buf),
            Encoding::Base64 => buf.len() % 3,
            Encoding::Ascii | Encoding::Latin1 | Encoding::Hex => 0,
        };
        let split = buf.len() - held;
        self.pending = buf.split_off(split);
        self.decode_complete(&buf)
    }

    /// Flush whatever is still held back. Incomplete sequences decode to
    /// U+FFFD.
    pub fn end(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        self.decode_complete(&rest)
    }

    /// Whether bytes are being held back.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn decode_complete(&self, bytes: &[u8]) -> String {
        match self.encoding {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Ascii => bytes.iter().map(|b| char::from(b & 0x7f)).collect(),
            Encoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Encoding::Utf16Le => {
                let units = bytes
                    .chunks(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]));
                char::decode_utf16(units)
                    .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect()
            }
            Encoding::Base64 => STANDARD.encode(bytes),
            Encoding::Hex => encode_hex(bytes),
        }
    }
}

/// Number of trailing bytes that start a UTF-8 sequence but do not finish it.
fn incomplete_utf8_tail(buf: &[u8]) -> usize {
    let start = buf.len().saturating_sub(3);
    for i in (start..buf.len()).rev() {
        let byte = buf[i];
        if byte & 0xc0 == 0x80 {
            continue;
        }
        let needed = match byte {
            b if b & 0xe0 == 0xc0 => 2,
            b if b & 0xf0 == 0xe0 => 3,
            b if b & 0xf8 == 0xf0 => 4,
            _ => 1,
        };
        let have = buf.len() - i;
        return if have < needed { have } else { 0 };
    }
    0
}

/// An odd trailing byte, or a trailing high surrogate waiting for its pair.
fn incomplete_utf16_tail(buf: &[u8]) -> usize {
    let odd = buf.len() % 2;
    let even = buf.len() - odd;
    if even >= 2 {
        let last = u16::from_le_bytes([buf[even - 2], buf[even - 1]]);
        if (0xd800..=0xdbff).contains(&last) {
            return odd + 2;
        }
    }
    odd
}
