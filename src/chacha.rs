/// ChaCha permutation, its inverse, and the block function.
use crate::constants;

use rand::RngCore;

/// The 4x4 ChaCha state, row-major.
pub type State = [u32; 16];

const COLUMNS: [[usize; 4]; 4] = [[0, 4, 8, 12], [1, 5, 9, 13], [2, 6, 10, 14], [3, 7, 11, 15]];
const DIAGONALS: [[usize; 4]; 4] = [[0, 5, 10, 15], [1, 6, 11, 12], [2, 7, 8, 13], [3, 4, 9, 14]];

/// Applies the quarter round to words a, b, c, d of the state.
pub fn quarter_round(s: &mut State, a: usize, b: usize, c: usize, d: usize) {
    s[a] = s[a].wrapping_add(s[b]);
    s[d] = (s[d] ^ s[a]).rotate_left(16);
    s[c] = s[c].wrapping_add(s[d]);
    s[b] = (s[b] ^ s[c]).rotate_left(12);
    s[a] = s[a].wrapping_add(s[b]);
    s[d] = (s[d] ^ s[a]).rotate_left(8);
    s[c] = s[c].wrapping_add(s[d]);
    s[b] = (s[b] ^ s[c]).rotate_left(7);
}

/// Undoes `quarter_round` on the same four words.
pub fn quarter_round_inverse(s: &mut State, a: usize, b: usize, c: usize, d: usize) {
    s[b] = s[b].rotate_right(7) ^ s[c];
    s[c] = s[c].wrapping_sub(s[d]);
    s[d] = s[d].rotate_right(8) ^ s[a];
    s[a] = s[a].wrapping_sub(s[b]);
    s[b] = s[b].rotate_right(12) ^ s[c];
    s[c] = s[c].wrapping_sub(s[d]);
    s[d] = s[d].rotate_right(16) ^ s[a];
    s[a] = s[a].wrapping_sub(s[b]);
}

fn lanes(index: usize) -> &'static [[usize; 4]; 4] {
    if index % 2 == 0 {
        &COLUMNS
    } else {
        &DIAGONALS
    }
}

/// Applies round `index`: even rounds are column rounds, odd rounds diagonal rounds.
pub fn round(s: &mut State, index: usize) {
    for &[a, b, c, d] in lanes(index) {
        quarter_round(s, a, b, c, d);
    }
}

/// Undoes round `index`.
pub fn round_inverse(s: &mut State, index: usize) {
    for &[a, b, c, d] in lanes(index).iter().rev() {
        quarter_round_inverse(s, a, b, c, d);
    }
}

/// Applies rounds `from..to`.
pub fn forward(s: &mut State, from: usize, to: usize) {
    for i in from..to {
        round(s, i);
    }
}

/// Undoes rounds `to..from`, last round first.
pub fn backward(s: &mut State, from: usize, to: usize) {
    for i in (to..from).rev() {
        round_inverse(s, i);
    }
}

/// Word-wise wrapping addition.
pub fn add(x: &State, y: &State) -> State {
    let mut out = [0u32; 16];

    for i in 0..16 {
        out[i] = x[i].wrapping_add(y[i]);
    }

    out
}

/// Word-wise wrapping subtraction.
pub fn sub(x: &State, y: &State) -> State {
    let mut out = [0u32; 16];

    for i in 0..16 {
        out[i] = x[i].wrapping_sub(y[i]);
    }

    out
}

/// Computes a reduced-round block: permutation followed by feed-forward.
pub fn block(input: &State, rounds: usize) -> State {
    let mut out = *input;
    forward(&mut out, 0, rounds);
    add(&out, input)
}

/// Recovers the permutation input from a block output, given the feed-forward words.
pub fn invert_block(output: &State, input: &State, rounds: usize) -> State {
    let mut out = sub(output, input);
    backward(&mut out, rounds, 0);
    out
}

/// Samples a state with random key, counter and nonce words.
pub fn random_state<R: RngCore>(rng: &mut R) -> State {
    let mut s = [0u32; 16];

    for w in s.iter_mut() {
        *w = rng.next_u32();
    }

    s[..4].copy_from_slice(&constants::SIGMA);
    s
}

/// Formats a state as four rows of hex words.
pub fn format_state(s: &State) -> String {
    s.chunks(4)
        .map(|row| {
            row.iter()
                .map(|w| format!("{:08x}", w))
                .collect::<Vec<String>>()
                .join(" ")
        })
        .collect::<Vec<String>>()
        .join("\n")
}
