/// Several configuration constants.

pub const EPSILON_D: f64 = 0.000792; // forward differential bias
pub const EPSILON_A: f64 = 0.2; // backward bias over the PNB set
pub const PNB_COUNT: u32 = 137; // number of probabilistic neutral bits
pub const ALPHA: u32 = 100; // success probability parameter
pub const KEY_BITS: u32 = 256; // ChaCha key size in bits

pub const SIGMA: [u32; 4] = [0x61707865, 0x3320646e, 0x79622d32, 0x6b206574]; // "expand 32-byte k"

pub const ROUNDS: usize = 6; // total rounds attacked
pub const MID_ROUNDS: usize = 3; // rounds covered by the forward differential
pub const INPUT_DIFF: (usize, u32) = (13, 13); // (word, bit) of the input difference
pub const OUTPUT_BIT: (usize, u32) = (11, 0); // (word, bit) observed after MID_ROUNDS
pub const BIAS_TRIALS: u64 = 1 << 20; // samples for the forward bias
pub const PNB_TRIALS: u64 = 10000; // samples per key bit for the neutrality measure
pub const BACKWARD_TRIALS: u64 = 1 << 16; // samples for the backward bias
pub const NEUTRALITY_THRESHOLD: f64 = 0.6; // |gamma| at or above this marks a PNB

pub const WORKER_CHUNK: u64 = 4096; // trials between stop flag checks
pub const DATA_DIR_NAME: &str = "chacha-pnb";
