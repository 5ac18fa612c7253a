//! Text-encoding probing for raw payloads.

/// Encodings tried, in order, when decoding a source payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16,
    Latin1,
}

pub const PROBE_ORDER: [TextEncoding; 3] = [TextEncoding::Utf8, TextEncoding::Utf16, TextEncoding::Latin1];

impl TextEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf16 => "utf-16",
            TextEncoding::Latin1 => "latin-1",
        }
    }

    /// Decode `bytes`, or `None` if they are not valid in this encoding.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => {
                let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
                std::str::from_utf8(body).ok().map(str::to_string)
            }
            TextEncoding::Utf16 => decode_utf16(bytes),
            // Every byte sequence is valid Latin-1.
            TextEncoding::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

/// BOM-aware UTF-16; little-endian when no BOM is present.
fn decode_utf16(bytes: &[u8]) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let (big_endian, body) = match bytes {
        [0xFE, 0xFF, rest @ ..] => (true, rest),
        [0xFF, 0xFE, rest @ ..] => (false, rest),
        _ => (false, bytes),
    };
    let units = body.chunks_exact(2).map(|pair| {
        if big_endian {
            u16::from_be_bytes([pair[0], pair[1]])
        } else {
            u16::from_le_bytes([pair[0], pair[1]])
        }
    });
    char::decode_utf16(units).collect::<Result<String, _>>().ok()
}

/// Try each encoding in probe order, handing the decoded text to `parse`.
/// Returns the first successful parse, or every failure reason.
pub fn decode_with<T, E: std::fmt::Display>(
    bytes: &[u8],
    mut parse: impl FnMut(&str) -> Result<T, E>,
) -> Result<(TextEncoding, T), Vec<String>> {
    let mut reasons = Vec::new();
    for encoding in PROBE_ORDER {
        match encoding.decode(bytes) {
            Some(text) => match parse(&text) {
                Ok(parsed) => return Ok((encoding, parsed)),
                Err(e) => reasons.push(format!("{}: {}", encoding.name(), e)),
            },
            None => reasons.push(format!("{}: invalid byte sequence", encoding.name())),
        }
    }
    Err(reasons)
}
