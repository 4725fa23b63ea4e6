//! Content fingerprint: the text is cut into equal character chunks and
//! each chunk is hashed with SHA-512 on its own.

use sha2::{Digest, Sha512};

/// Returns one lowercase hex SHA-512 digest per chunk, in chunk order.
///
/// The chunk size is `ceil(len / parts)` characters, so the final chunk may
/// be shorter and fewer than `parts` chunks come out for short inputs.
/// Empty text yields no digests. Lengths count Unicode scalar values, not
/// UTF-16 code units, so text with characters outside the Basic
/// Multilingual Plane (emoji, for one) is chunked differently than by a
/// UTF-16 based splitter.
pub fn chunk_digests(text: &str, parts: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || parts == 0 {
        return Vec::new();
    }
    let chunk_size = chars.len().div_ceil(parts);
    chars
        .chunks(chunk_size)
        .map(|chunk| {
            let piece: String = chunk.iter().collect();
            hex::encode(Sha512::digest(piece.as_bytes()))
        })
        .collect()
}

pub fn fingerprint(text: &str, parts: usize) -> String {
    chunk_digests(text, parts).join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABC_SHA512: &str = "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f";

    #[test]
    fn hundred_chars_give_ten_digests() {
        let text = "x".repeat(100);
        let output = fingerprint(&text, 10);
        assert_eq!(output.lines().count(), 10);
    }

    #[test]
    fn same_content_same_fingerprint() {
        let text = "This is a test file";
        assert_eq!(fingerprint(text, 10), fingerprint(text, 10));
    }

    #[test]
    fn single_part_is_plain_sha512() {
        assert_eq!(chunk_digests("abc", 1), vec![ABC_SHA512.to_string()]);
    }

    #[test]
    fn short_tail_chunk_is_hashed_separately() {
        // 11 chars over 10 parts: chunk size 2, six chunks, last one "k".
        let digests = chunk_digests("abcdefghijk", 10);
        assert_eq!(digests.len(), 6);
        assert_eq!(digests[5], chunk_digests("k", 1)[0]);
    }

    #[test]
    fn empty_text_has_no_digests() {
        assert_eq!(fingerprint("", 10), "");
    }

    #[test]
    fn astral_characters_count_once() {
        // Four emoji are four chars here, eight UTF-16 units elsewhere.
        let digests = chunk_digests("😀😀😀😀", 4);
        assert_eq!(digests.len(), 4);
        assert_eq!(digests[0], chunk_digests("😀", 1)[0]);
    }

    #[test]
    fn chunks_count_characters_not_bytes() {
        let digests = chunk_digests("ééé", 3);
        assert_eq!(digests.len(), 3);
        assert_eq!(digests[0], chunk_digests("é", 1)[0]);
    }
}
