// src/process/decode.rs

//! Byte-to-text conversion for output read one chunk at a time.
//!
//! A read may end in the middle of a multi-byte UTF-8 sequence. Those
//! trailing bytes are held back and prepended to the next read instead of
//! being decoded (and replaced) early.

/// Number of trailing bytes that start a multi-byte UTF-8 sequence whose
/// continuation bytes have not arrived yet. `0` when the tail is complete
/// (or simply invalid, which lossy decoding handles).
pub fn incomplete_tail_len(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(4) {
        let byte = bytes[len - back];
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        if byte < 0x80 {
            return 0;
        }
        let expected = if byte & 0b1110_0000 == 0b1100_0000 {
            2
        } else if byte & 0b1111_0000 == 0b1110_0000 {
            3
        } else if byte & 0b1111_1000 == 0b1111_0000 {
            4
        } else {
            return 0;
        };
        return if back < expected { back } else { 0 };
    }
    0
}

/// Incremental UTF-8 decoder carrying incomplete sequences between reads.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes` together with anything carried from the previous call.
    /// May return an empty string if only a partial sequence is available.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.carry.extend_from_slice(bytes);
        let complete = self.carry.len() - incomplete_tail_len(&self.carry);
        let text = String::from_utf8_lossy(&self.carry[..complete]).into_owned();
        self.carry.drain(..complete);
        text
    }

    /// Flush whatever is still carried, replacing broken sequences.
    pub fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.carry).into_owned();
        self.carry.clear();
        text
    }
}

/// Collapse every run of `\r` that ends in `\n` into a single `\n`.
///
/// A bare `\r` (progress bars, spinners) is kept as is.
pub fn normalize_newlines(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut pending_cr = 0usize;
    for ch in text.chars() {
        match ch {
            '\r' => pending_cr += 1,
            '\n' => {
                pending_cr = 0;
                out.push('\n');
            }
            other => {
                for _ in 0..pending_cr {
                    out.push('\r');
                }
                pending_cr = 0;
                out.push(other);
            }
        }
    }
    for _ in 0..pending_cr {
        out.push('\r');
    }
    out
}
