//! XOR obfuscation applied to transferred chunks when a session is data-safe.
//!
//! This is a scrambling toggle, not encryption. Each byte is XORed with a
//! fixed mask, so the transform is its own inverse and does not depend on
//! where chunk boundaries fall.

/// Mask applied to every byte.
pub const MASK: u8 = 0x5A;

/// Scramble (or unscramble) `buf` in place.
pub fn xor_in_place(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b ^= MASK;
    }
}

/// Return a scrambled copy of `data`.
pub fn xor(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    xor_in_place(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_inverse() {
        let data: Vec<u8> = (0..=255u8).collect();
        assert_eq!(xor(&xor(&data)), data);
    }

    #[test]
    fn test_changes_every_byte() {
        let data = b"hello world";
        let scrambled = xor(data);
        assert!(data.iter().zip(&scrambled).all(|(a, b)| a != b));
    }

    #[test]
    fn test_chunking_does_not_matter() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let whole = xor(&data);

        let mut pieces = data.clone();
        for chunk in pieces.chunks_mut(4096) {
            xor_in_place(chunk);
        }
        assert_eq!(pieces, whole);
    }

    #[test]
    fn test_empty() {
        assert!(xor(&[]).is_empty());
    }
}
