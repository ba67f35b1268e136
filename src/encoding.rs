//! Encoding and line-ending detection from a byte prefix.
//!
//! Grounded on `flux_mcp/utils/encoding_detector.py`: BOM first, then a short list of common
//! encodings tried in order, with a Latin-1 fallback that never fails to decode. Detection is a
//! pure function of the prefix bytes, so it is deterministic given the same input.

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf16Le => "utf-16le",
            Encoding::Utf16Be => "utf-16be",
            Encoding::Latin1 => "latin-1",
        }
    }

    /// Parse a caller-supplied encoding name (as accepted by `read_file`/`write_file`'s
    /// `encoding` parameter). Unrecognized names fall back to `None` so the caller can detect
    /// the prefix bytes instead.
    pub fn parse(name: &str) -> Option<Encoding> {
        match name.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Encoding::Utf8),
            "utf-16le" | "utf16le" => Some(Encoding::Utf16Le),
            "utf-16be" | "utf16be" => Some(Encoding::Utf16Be),
            "latin-1" | "latin1" | "iso-8859-1" => Some(Encoding::Latin1),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

const DETECT_PREFIX_LEN: usize = 1024;

/// Inspect up to the first 1 KiB of `bytes` and report the encoding to decode with.
pub fn detect_encoding(bytes: &[u8]) -> Encoding {
    let prefix = &bytes[..bytes.len().min(DETECT_PREFIX_LEN)];

    if prefix.starts_with(&[0xFF, 0xFE]) {
        return Encoding::Utf16Le;
    }
    if prefix.starts_with(&[0xFE, 0xFF]) {
        return Encoding::Utf16Be;
    }
    if prefix.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Encoding::Utf8;
    }

    if std::str::from_utf8(prefix).is_ok() {
        return Encoding::Utf8;
    }

    if looks_like_utf16(prefix, true) {
        return Encoding::Utf16Le;
    }
    if looks_like_utf16(prefix, false) {
        return Encoding::Utf16Be;
    }

    Encoding::Latin1
}

/// Heuristic used only when there is no BOM and the bytes are not valid UTF-8: a run of
/// printable ASCII interleaved with null bytes on alternating sides strongly suggests UTF-16
/// without a BOM.
fn looks_like_utf16(prefix: &[u8], little_endian: bool) -> bool {
    if prefix.len() < 4 || prefix.len() % 2 != 0 {
        return false;
    }
    let zero_idx = if little_endian { 1 } else { 0 };
    let char_idx = 1 - zero_idx;
    let mut zero_count = 0;
    let mut pairs = 0;
    for chunk in prefix.chunks_exact(2) {
        pairs += 1;
        if chunk[zero_idx] == 0 && chunk[char_idx] != 0 {
            zero_count += 1;
        }
    }
    pairs > 0 && zero_count * 4 >= pairs * 3
}

/// Decode `bytes` using `encoding`, replacing undecodable sequences rather than failing.
pub fn decode_lossy(bytes: &[u8], encoding: Encoding) -> String {
    match encoding {
        Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        Encoding::Utf16Le => decode_utf16_lossy(bytes, true),
        Encoding::Utf16Be => decode_utf16_lossy(bytes, false),
        Encoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn decode_utf16_lossy(bytes: &[u8], little_endian: bool) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| {
            if little_endian {
                u16::from_le_bytes([chunk[0], chunk[1]])
            } else {
                u16::from_be_bytes([chunk[0], chunk[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}

/// Re-encode `text`, replacing anything that doesn't fit the target encoding rather than
/// raising (§6: "re-encoding errors are replaced, never raised").
pub fn encode_lossy(text: &str, encoding: Encoding) -> Vec<u8> {
    match encoding {
        Encoding::Utf8 => text.as_bytes().to_vec(),
        Encoding::Utf16Le => text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect(),
        Encoding::Utf16Be => text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect(),
        Encoding::Latin1 => text
            .chars()
            .map(|c| if c as u32 <= 0xFF { c as u8 } else { b'?' })
            .collect(),
    }
}

/// Detect whichever of `\r\n`/`\n` occurs first in `bytes`; defaults to `\n` when neither is
/// present.
pub fn detect_line_ending(bytes: &[u8]) -> LineEnding {
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' {
            if i > 0 && bytes[i - 1] == b'\r' {
                return LineEnding::CrLf;
            }
            return LineEnding::Lf;
        }
    }
    LineEnding::Lf
}

/// Normalize every line ending in `text` to `target`.
pub fn normalize_line_endings(text: &str, target: LineEnding) -> String {
    let unified = text.replace("\r\n", "\n");
    match target {
        LineEnding::Lf => unified,
        LineEnding::CrLf => unified.replace('\n', "\r\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_utf8_bom() {
        let bytes = [0xEF, 0xBB, 0xBF, b'h', b'i'];
        assert_eq!(detect_encoding(&bytes), Encoding::Utf8);
    }

    #[test]
    fn detects_utf16le_bom() {
        let bytes = [0xFF, 0xFE, b'h', 0x00];
        assert_eq!(detect_encoding(&bytes), Encoding::Utf16Le);
    }

    #[test]
    fn plain_ascii_is_utf8() {
        assert_eq!(detect_encoding(b"fn main() {}"), Encoding::Utf8);
    }

    #[test]
    fn round_trips_utf16le() {
        let original = "hello world";
        let encoded = encode_lossy(original, Encoding::Utf16Le);
        let bom_prefixed: Vec<u8> = [0xFF, 0xFE].iter().chain(encoded.iter()).copied().collect();
        assert_eq!(detect_encoding(&bom_prefixed), Encoding::Utf16Le);
        assert_eq!(decode_lossy(&encoded, Encoding::Utf16Le), original);
    }

    #[test]
    fn line_ending_detection() {
        assert_eq!(detect_line_ending(b"a\r\nb\n"), LineEnding::CrLf);
        assert_eq!(detect_line_ending(b"a\nb\r\n"), LineEnding::Lf);
        assert_eq!(detect_line_ending(b"no newline here"), LineEnding::Lf);
    }

    #[test]
    fn normalizes_to_crlf_and_back() {
        let text = "a\nb\nc";
        let crlf = normalize_line_endings(text, LineEnding::CrLf);
        assert_eq!(crlf, "a\r\nb\r\nc");
        let lf = normalize_line_endings(&crlf, LineEnding::Lf);
        assert_eq!(lf, text);
    }

    #[test]
    fn parse_accepts_common_aliases() {
        assert_eq!(Encoding::parse("UTF-8"), Some(Encoding::Utf8));
        assert_eq!(Encoding::parse("utf16le"), Some(Encoding::Utf16Le));
        assert_eq!(Encoding::parse("nonsense"), None);
    }
}
