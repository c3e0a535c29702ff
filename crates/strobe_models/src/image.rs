//! Line-oriented hex memory images.
//!
//! One word per line as a fixed-width hexadecimal string, loaded in file
//! order starting at address 0. Anything after the word on a line is
//! ignored, so images may carry trailing comments. Loading happens at
//! construction time; a bad line is an error before any simulation step.

use std::fs;
use std::path::Path;

use strobe_sim::SimError;

/// Reads a hex image whose words are `width` bits wide.
///
/// Each line must start with exactly `ceil(width / 4)` hex digits and the
/// value must fit in `width` bits. Fails with [`SimError::MalformedImage`]
/// naming the 1-based line, or [`SimError::Io`] if the file cannot be read.
pub fn read_hex_image(path: &Path, width: u32) -> Result<Vec<u64>, SimError> {
    let digits = width.div_ceil(4) as usize;
    let mask = u64::MAX >> (64 - width);
    let text = fs::read_to_string(path)?;

    let mut words = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let malformed = |reason: String| SimError::MalformedImage {
            path: path.display().to_string(),
            line,
            reason,
        };

        let token = raw
            .split_whitespace()
            .next()
            .ok_or_else(|| malformed("empty line".to_string()))?;
        if token.len() != digits {
            return Err(malformed(format!(
                "expected {digits} hex digits, found {}",
                token.len()
            )));
        }
        let value = u64::from_str_radix(token, 16)
            .map_err(|_| malformed(format!("{token:?} is not a hexadecimal word")))?;
        if value > mask {
            return Err(malformed(format!(
                "value {value:#x} does not fit in {width} bits"
            )));
        }
        words.push(value);
    }
    Ok(words)
}
