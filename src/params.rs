use crate::bits::BitPos;
use crate::constants;
use crate::error::{Error, Result};

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Inputs to the complexity formula.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityParams {
    pub epsilon_d: f64,
    pub epsilon_a: f64,
    pub pnb: u32,
    pub alpha: u32,
}

impl Default for ComplexityParams {
    fn default() -> Self {
        ComplexityParams {
            epsilon_d: constants::EPSILON_D,
            epsilon_a: constants::EPSILON_A,
            pnb: constants::PNB_COUNT,
            alpha: constants::ALPHA,
        }
    }
}

/// Tunable options for the Monte Carlo experiments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackParams {
    pub rounds: usize,
    pub mid_rounds: usize,
    pub input_diff: BitPos,
    pub output_bit: BitPos,
    pub bias_trials: u64,
    pub pnb_trials: u64,
    pub backward_trials: u64,
    pub threshold: f64,
    pub seed: Option<u64>,
    pub threads: Option<usize>,
}

impl Default for AttackParams {
    fn default() -> Self {
        AttackParams {
            rounds: constants::ROUNDS,
            mid_rounds: constants::MID_ROUNDS,
            input_diff: BitPos {
                word: constants::INPUT_DIFF.0,
                bit: constants::INPUT_DIFF.1,
            },
            output_bit: BitPos {
                word: constants::OUTPUT_BIT.0,
                bit: constants::OUTPUT_BIT.1,
            },
            bias_trials: constants::BIAS_TRIALS,
            pnb_trials: constants::PNB_TRIALS,
            backward_trials: constants::BACKWARD_TRIALS,
            threshold: constants::NEUTRALITY_THRESHOLD,
            seed: None,
            threads: None,
        }
    }
}

impl AttackParams {
    /// Number of worker threads, defaulting to the CPU count.
    pub fn num_threads(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Returns the configured seed or draws a fresh one.
    pub fn seed_or_random(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}

/// Parameter structure, defines all tunable options.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub complexity: ComplexityParams,
    pub attack: AttackParams,
}

impl Params {
    /// Loads parameters from a JSON file. Missing fields take their defaults.
    pub fn load(p: &Path) -> Result<Params> {
        let params: Params = serde_json::from_reader(BufReader::new(File::open(p)?))?;
        params.validate()?;

        Ok(params)
    }

    /// Writes parameters to a JSON file.
    pub fn save(&self, p: &Path) -> Result<()> {
        serde_json::to_writer_pretty(BufWriter::new(File::create(p)?), self)?;
        Ok(())
    }

    /// Checks the experiment options are consistent.
    /// The complexity inputs are checked when the formula is evaluated.
    pub fn validate(&self) -> Result<()> {
        let a = &self.attack;

        BitPos::new(a.input_diff.word, a.input_diff.bit)?;
        BitPos::new(a.output_bit.word, a.output_bit.bit)?;

        if a.mid_rounds == 0 || a.mid_rounds > a.rounds {
            return Err(Error::Config(format!(
                "mid_rounds must be in 1..={} (got {})",
                a.rounds, a.mid_rounds
            )));
        }

        if !(a.threshold >= 0.0 && a.threshold <= 1.0) {
            return Err(Error::Config(format!(
                "threshold must be in [0, 1] (got {})",
                a.threshold
            )));
        }

        if a.threads == Some(0) {
            return Err(Error::Config("threads must be positive".to_string()));
        }

        Ok(())
    }
}
