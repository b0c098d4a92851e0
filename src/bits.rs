/// Bit addressing inside a ChaCha state.
use crate::chacha::State;
use crate::error::{Error, Result};

use serde::{Deserialize, Serialize};
use std::fmt;

/// First and one-past-last state words holding the key.
pub const KEY_WORDS: std::ops::Range<usize> = 4..12;

/// A single bit of the 16-word state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitPos {
    pub word: usize,
    pub bit: u32,
}

impl BitPos {
    /// Returns a checked bit position.
    pub fn new(word: usize, bit: u32) -> Result<Self> {
        if word >= 16 || bit >= 32 {
            return Err(Error::Domain(format!(
                "bit position ({}, {}) is outside the 16x32 state",
                word, bit
            )));
        }

        Ok(BitPos { word, bit })
    }

    /// Returns the key bit with index `k` (0..256 over words 4..11).
    pub fn key_bit(k: usize) -> Result<Self> {
        if k >= 256 {
            return Err(Error::Domain(format!("key bit {} out of range", k)));
        }

        Ok(BitPos {
            word: KEY_WORDS.start + k / 32,
            bit: (k % 32) as u32,
        })
    }

    /// Returns the key bit index of this position, if it lies in the key.
    pub fn key_index(&self) -> Option<usize> {
        if KEY_WORDS.contains(&self.word) {
            Some((self.word - KEY_WORDS.start) * 32 + self.bit as usize)
        } else {
            None
        }
    }

    pub fn mask(&self) -> u32 {
        1u32 << self.bit
    }

    /// Reads this bit (0 or 1) from a state.
    pub fn get(&self, s: &State) -> u32 {
        (s[self.word] >> self.bit) & 1
    }

    /// Flips this bit in a state.
    pub fn flip(&self, s: &mut State) {
        s[self.word] ^= self.mask();
    }
}

impl fmt::Display for BitPos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.word, self.bit)
    }
}

/// A set of key bits, stored as per-word masks over the full state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyMask([u32; 16]);

impl KeyMask {
    /// Builds a mask from key bit indices.
    pub fn from_indices(indices: &[usize]) -> Result<Self> {
        let mut out = KeyMask::default();

        for &k in indices {
            let pos = BitPos::key_bit(k)?;
            out.0[pos.word] |= pos.mask();
        }

        Ok(out)
    }

    pub fn single(pos: BitPos) -> Self {
        let mut out = KeyMask::default();
        out.0[pos.word] |= pos.mask();
        out
    }

    pub fn count(&self) -> u32 {
        self.0.iter().map(|w| w.count_ones()).sum()
    }

    pub fn words(&self) -> &[u32; 16] {
        &self.0
    }
}
