/// Probabilistic neutral bits.
///
/// The forward half runs the full `rounds` on a state and its differential
/// partner, snapshotting both after `mid_rounds`. The backward half subtracts a
/// guessed key from the outputs and undoes the last `rounds - mid_rounds`
/// rounds. The guessed key equals the real one except on a noise mask; a trial
/// matches when the differential bit recovered backward equals the forward one.
use crate::bits::{BitPos, KeyMask};
use crate::chacha::{self, State};
use crate::error::{Error, Result};
use crate::params::AttackParams;
use crate::worker::{self, Tally, Trial};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::RngCore;
use serde::Serialize;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// How the noise mask is applied to the guessed key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Noise {
    /// Flip every masked bit.
    Flip,
    /// Replace masked bits with fresh random values.
    Randomize,
}

/// One forward-backward trial.
pub struct BackwardTrial {
    pub input_diff: BitPos,
    pub output_bit: BitPos,
    pub rounds: usize,
    pub mid_rounds: usize,
    pub mask: KeyMask,
    pub noise: Noise,
}

impl BackwardTrial {
    pub fn new(params: &AttackParams, mask: KeyMask, noise: Noise) -> Self {
        BackwardTrial {
            input_diff: params.input_diff,
            output_bit: params.output_bit,
            rounds: params.rounds,
            mid_rounds: params.mid_rounds,
            mask,
            noise,
        }
    }

    fn noise_words<R: RngCore>(&self, rng: &mut R) -> State {
        let mut out = *self.mask.words();

        if self.noise == Noise::Randomize {
            for w in out.iter_mut().filter(|w| **w != 0) {
                *w &= rng.next_u32();
            }
        }

        out
    }
}

impl Trial for BackwardTrial {
    fn run(&self, rng: &mut StdRng) -> bool {
        let x = chacha::random_state(rng);
        let mut x_prime = x;
        self.input_diff.flip(&mut x_prime);

        let mut a = x;
        let mut b = x_prime;
        chacha::forward(&mut a, 0, self.mid_rounds);
        chacha::forward(&mut b, 0, self.mid_rounds);
        let forward_bit = self.output_bit.get(&a) ^ self.output_bit.get(&b);

        chacha::forward(&mut a, self.mid_rounds, self.rounds);
        chacha::forward(&mut b, self.mid_rounds, self.rounds);
        let z = chacha::add(&a, &x);
        let z_prime = chacha::add(&b, &x_prime);

        let noise = self.noise_words(rng);
        let mut guess = x;
        let mut guess_prime = x_prime;

        for i in 0..16 {
            guess[i] ^= noise[i];
            guess_prime[i] ^= noise[i];
        }

        let mut t = chacha::sub(&z, &guess);
        let mut t_prime = chacha::sub(&z_prime, &guess_prime);
        chacha::backward(&mut t, self.rounds, self.mid_rounds);
        chacha::backward(&mut t_prime, self.rounds, self.mid_rounds);
        let backward_bit = self.output_bit.get(&t) ^ self.output_bit.get(&t_prime);

        forward_bit == backward_bit
    }
}

/// Neutrality measure of one key bit.
#[derive(Clone, Debug, Serialize)]
pub struct Neutrality {
    pub index: usize,
    pub position: BitPos,
    pub probability: f64,
    pub gamma: f64,
}

/// Result of a PNB search over all 256 key bits.
#[derive(Clone, Debug, Serialize)]
pub struct PnbSearch {
    pub rounds: usize,
    pub mid_rounds: usize,
    pub trials: u64,
    pub threshold: f64,
    pub seed: u64,
    pub measures: Vec<Neutrality>,
    pub pnbs: Vec<usize>,
}

impl PnbSearch {
    pub fn count(&self) -> u32 {
        self.pnbs.len() as u32
    }

    pub fn print(&self) {
        for n in self.measures.iter().filter(|n| self.pnbs.contains(&n.index)) {
            println!(
                "f={:2}, I={:2}, Bit={:3}, prob={:.6}, gamma={:.6}",
                n.position.word, n.position.bit, n.index, n.probability, n.gamma
            );
        }

        println!("Total PNBs (|gamma| >= {}): {}", self.threshold, self.count());
    }
}

/// Measures the neutrality of a single key bit.
pub fn neutrality(
    params: &AttackParams,
    index: usize,
    seed: u64,
    stopflag: &Arc<AtomicBool>,
) -> Result<Neutrality> {
    let position = BitPos::key_bit(index)?;
    debug_assert_eq!(position.key_index(), Some(index));
    let trial = BackwardTrial::new(params, KeyMask::single(position), Noise::Flip);
    let tally = worker::run(
        Arc::new(trial),
        params.pnb_trials,
        params.num_threads(),
        seed,
        stopflag,
    )?;

    Ok(Neutrality {
        index,
        position,
        probability: tally.probability(),
        gamma: tally.bias(),
    })
}

/// Measures every key bit and selects those with `|gamma| >= threshold`.
/// Every bit is measured on the same sample of states.
pub fn search(params: &AttackParams, stopflag: &Arc<AtomicBool>) -> Result<PnbSearch> {
    let seed = params.seed_or_random();
    let mut measures = Vec::with_capacity(256);

    info!(
        "Measuring neutrality of 256 key bits, {} trials each, {} rounds back from {}",
        params.pnb_trials,
        params.rounds - params.mid_rounds,
        params.rounds
    );

    for index in 0..256 {
        if stopflag.load(Ordering::Relaxed) {
            break;
        }

        let n = neutrality(params, index, seed, stopflag)?;
        debug!("bit {:3} {}: gamma = {:.6}", index, n.position, n.gamma);
        measures.push(n);
    }

    if measures.len() < 256 {
        return Err(Error::Interrupted);
    }

    let pnbs = measures
        .iter()
        .filter(|n| n.gamma.abs() >= params.threshold)
        .map(|n| n.index)
        .collect();

    Ok(PnbSearch {
        rounds: params.rounds,
        mid_rounds: params.mid_rounds,
        trials: params.pnb_trials,
        threshold: params.threshold,
        seed,
        measures,
        pnbs,
    })
}

/// Backward bias estimate over a set of PNBs.
#[derive(Clone, Debug, Serialize)]
pub struct BackwardBias {
    pub pnbs: Vec<usize>,
    pub seed: u64,
    pub tally: Tally,
    pub bias: f64,
}

/// Estimates `epsilon_a` with all PNBs set to random values in the guessed key.
pub fn backward_bias(
    params: &AttackParams,
    pnbs: &[usize],
    stopflag: &Arc<AtomicBool>,
) -> Result<BackwardBias> {
    let seed = params.seed_or_random();
    let mask = KeyMask::from_indices(pnbs)?;

    info!(
        "Estimating backward bias over {} PNBs with {} trials",
        mask.count(),
        params.backward_trials
    );

    let trial = BackwardTrial::new(params, mask, Noise::Randomize);
    let tally = worker::run(
        Arc::new(trial),
        params.backward_trials,
        params.num_threads(),
        seed,
        stopflag,
    )?;

    Ok(BackwardBias {
        pnbs: pnbs.to_vec(),
        seed,
        tally,
        bias: tally.bias(),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;

    fn params(trials: u64) -> AttackParams {
        AttackParams {
            pnb_trials: trials,
            backward_trials: trials,
            seed: Some(7),
            threads: Some(2),
            ..AttackParams::default()
        }
    }

    /// Tests the top key bit is fully neutral over 3 backward rounds.
    #[test]
    fn high_bits_neutral() {
        let stop = Arc::new(AtomicBool::new(false));

        for &k in &[127, 255] {
            let n = neutrality(&params(512), k, 7, &stop).expect("neutrality failed");
            assert!(n.gamma >= 0.9, "bit {} gamma {}", k, n.gamma);
        }
    }

    /// Tests the lowest key bit is far from neutral.
    #[test]
    fn low_bit_not_neutral() {
        let stop = Arc::new(AtomicBool::new(false));
        let n = neutrality(&params(1024), 0, 7, &stop).expect("neutrality failed");

        assert!(n.gamma.abs() < 0.3, "gamma {}", n.gamma);
    }

    /// Tests an empty noise mask always recovers the forward bit.
    #[test]
    fn empty_mask_always_matches() {
        let trial = BackwardTrial::new(&params(1), KeyMask::default(), Noise::Randomize);
        let mut rng = StdRng::seed_from_u64(3);

        assert!((0..200).all(|_| trial.run(&mut rng)));
    }

    /// Tests a full search selects the neutral bits and keeps every measure.
    #[test]
    fn search_selects_neutral_bits() {
        let stop = Arc::new(AtomicBool::new(false));
        let s = search(&params(128), &stop).expect("search failed");

        assert_eq!(s.measures.len(), 256);
        assert!(s.pnbs.contains(&255));
        assert!(!s.pnbs.contains(&0));
        assert!(s
            .pnbs
            .iter()
            .all(|&k| s.measures[k].gamma.abs() >= s.threshold));
    }

    /// Tests a raised stop flag interrupts the search.
    #[test]
    fn search_interrupted() {
        let stop = Arc::new(AtomicBool::new(true));

        assert!(matches!(search(&params(128), &stop), Err(Error::Interrupted)));
    }

    /// Tests the backward bias over fully neutral bits stays high.
    #[test]
    fn backward_bias_neutral_set() {
        let stop = Arc::new(AtomicBool::new(false));
        let b = backward_bias(&params(2048), &[127, 159, 191, 255], &stop)
            .expect("backward bias failed");

        assert_eq!(b.tally.trials, 2048);
        assert!(b.bias > 0.8, "bias {}", b.bias);
    }

    /// Tests invalid key bit indices are rejected.
    #[test]
    fn backward_bias_rejects_bad_index() {
        let stop = Arc::new(AtomicBool::new(false));

        assert!(backward_bias(&params(16), &[300], &stop).is_err());
    }
}
