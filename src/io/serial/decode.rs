// src/io/serial/decode.rs
//
// Byte-to-text decoding for received serial chunks.
// Device output is arbitrary, so decoding never fails: UTF-8 first,
// then Latin-1, then a `\xHH` escape of every byte.

/// Decode a received chunk into displayable text.
pub fn decode_bytes(data: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(data) {
        return text.to_string();
    }
    decode_latin1(data).unwrap_or_else(|| hex_escape(data))
}

/// Latin-1 maps each byte to the code point of the same value.
/// Returns `None` if any byte has no character mapping.
fn decode_latin1(data: &[u8]) -> Option<String> {
    data.iter().map(|&b| char::from_u32(u32::from(b))).collect()
}

/// Render every byte as a lowercase `\xHH` escape, in order, with no separator.
pub fn hex_escape(data: &[u8]) -> String {
    let encoded = hex::encode(data);
    let mut out = String::with_capacity(data.len() * 4);
    for pair in encoded.as_bytes().chunks(2) {
        out.push_str("\\x");
        out.extend(pair.iter().map(|&c| char::from(c)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_utf8_is_verbatim() {
        assert_eq!(decode_bytes(b"Hello"), "Hello");
        assert_eq!(decode_bytes("温度: 23°C\r\n".as_bytes()), "温度: 23°C\r\n");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(decode_bytes(&[]), "");
    }

    #[test]
    fn test_lone_ff_uses_latin1() {
        let text = decode_bytes(&[0xFF]);
        assert_eq!(text, "\u{00FF}");
        assert_eq!(text.chars().count(), 1);
    }

    #[test]
    fn test_invalid_utf8_mixed_with_ascii() {
        // Truncated multi-byte sequence in the middle of ASCII
        let text = decode_bytes(&[b'o', b'k', 0xE2, 0x82, b'!']);
        assert_eq!(text, "ok\u{00E2}\u{0082}!");
    }

    #[test]
    fn test_arbitrary_binary_decodes_to_one_char_per_byte() {
        let data: Vec<u8> = (0u8..=255).rev().collect();
        let text = decode_bytes(&data);
        assert_eq!(text.chars().count(), 256);
        assert_eq!(text.chars().next(), Some('\u{00FF}'));
    }

    #[test]
    fn test_hex_escape_preserves_order() {
        assert_eq!(hex_escape(&[0x00, 0xAB, 0x0F]), "\\x00\\xab\\x0f");
        assert_eq!(hex_escape(&[]), "");
    }

    #[test]
    fn test_hex_escape_every_byte() {
        let data: Vec<u8> = (0u8..=255).collect();
        let escaped = hex_escape(&data);
        assert_eq!(escaped.len(), 256 * 4);
        assert!(escaped.starts_with("\\x00\\x01"));
        assert!(escaped.ends_with("\\xfe\\xff"));
    }
}
