/// chacha-pnb entry point.
mod bits;
mod chacha;
mod complexity;
mod constants;
mod differential;
mod disk;
mod error;
mod params;
mod pnb;
mod report;
mod worker;

use complexity::Complexity;
use disk::Disk;
use params::Params;

use clap::{Args, Parser, Subcommand};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Differential-linear attack complexity for reduced-round ChaCha.
#[derive(Parser, Debug)]
#[command(name = "chacha-pnb", version)]
struct Cli {
    /// JSON parameter file; missing fields take their defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also print the exact value of C.
    #[arg(long, global = true)]
    exact: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print N and C (the default action).
    Complexity {
        #[arg(long, allow_negative_numbers = true)]
        epsilon_d: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        epsilon_a: Option<f64>,
        /// Number of probabilistic neutral bits.
        #[arg(long)]
        pnb: Option<u32>,
        #[arg(long)]
        alpha: Option<u32>,
    },

    /// Estimate the forward differential bias epsilon_d.
    Bias {
        /// Rounds covered by the differential.
        #[arg(long)]
        rounds: Option<usize>,
        #[arg(long)]
        trials: Option<u64>,
        #[command(flatten)]
        run: RunArgs,
    },

    /// Search the key for probabilistic neutral bits.
    Pnb {
        /// Trials per key bit.
        #[arg(long)]
        trials: Option<u64>,
        /// Minimum |gamma| for a bit to count as neutral.
        #[arg(long)]
        threshold: Option<f64>,
        /// Also estimate the backward bias epsilon_a over the PNBs found.
        #[arg(long)]
        backward: bool,
        /// Print the complexity report for the PNB count found.
        #[arg(long)]
        report: bool,
        #[command(flatten)]
        run: RunArgs,
    },

    /// Compute a block and recover its input state.
    Invert {
        #[arg(long, default_value_t = 20)]
        rounds: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
}

/// Options shared by the Monte Carlo experiments.
#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    threads: Option<usize>,
    /// Save the result as JSON, to PATH or to the data directory.
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    save: Option<Option<PathBuf>>,
}

impl RunArgs {
    fn apply(&self, params: &mut Params) {
        if self.seed.is_some() {
            params.attack.seed = self.seed;
        }

        if self.threads.is_some() {
            params.attack.threads = self.threads;
        }
    }
}

/// Saves a result if requested, with the parameters that produced it
/// written beside it as `<name>.params.json`.
fn save<T: Serialize>(
    target: &Option<Option<PathBuf>>,
    kind: &str,
    value: &T,
    params: &Params,
) -> Result<Option<PathBuf>, Box<dyn Error>> {
    let path = match target {
        None => return Ok(None),
        Some(Some(p)) => {
            disk::write_json(p, value)?;
            p.clone()
        }
        Some(None) => Disk::default_location()?.save_result(kind, value)?,
    };

    params.save(&path.with_extension("params.json"))?;

    println!("Saved {} result to {}", kind, path.display());
    Ok(Some(path))
}

fn print_complexity(params: &Params, exact: bool) -> Result<(), Box<dyn Error>> {
    let c = Complexity::evaluate(&params.complexity)?;
    debug!(
        "Evaluated complexity for {:?}, double precision C = {:e}",
        params.complexity,
        c.c_double()
    );

    report::print(&c, exact)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut params = match &cli.config {
        Some(p) => {
            info!("Loading parameters from {}", p.display());
            Params::load(p)?
        }
        None => Params::default(),
    };

    let stopflag = Arc::new(AtomicBool::new(false));
    let handler_flag = stopflag.clone();

    ctrlc::set_handler(move || {
        warn!("Interrupted, stopping workers.");
        handler_flag.store(true, Ordering::Relaxed);
    })?;

    match cli.command {
        None => print_complexity(&params, cli.exact)?,
        Some(Command::Complexity {
            epsilon_d,
            epsilon_a,
            pnb,
            alpha,
        }) => {
            let c = &mut params.complexity;
            c.epsilon_d = epsilon_d.unwrap_or(c.epsilon_d);
            c.epsilon_a = epsilon_a.unwrap_or(c.epsilon_a);
            c.pnb = pnb.unwrap_or(c.pnb);
            c.alpha = alpha.unwrap_or(c.alpha);

            print_complexity(&params, cli.exact)?;
        }
        Some(Command::Bias { rounds, trials, run }) => {
            run.apply(&mut params);

            if let Some(r) = rounds {
                params.attack.mid_rounds = r;
                params.attack.rounds = params.attack.rounds.max(r);
            }

            params.attack.bias_trials = trials.unwrap_or(params.attack.bias_trials);
            params.validate()?;

            let est = differential::estimate(&params.attack, &stopflag)?;
            est.print();
            save(&run.save, "bias", &est, &params)?;
        }
        Some(Command::Pnb {
            trials,
            threshold,
            backward,
            report,
            run,
        }) => {
            run.apply(&mut params);
            params.attack.pnb_trials = trials.unwrap_or(params.attack.pnb_trials);
            params.attack.threshold = threshold.unwrap_or(params.attack.threshold);
            params.validate()?;

            let found = pnb::search(&params.attack, &stopflag)?;
            found.print();
            save(&run.save, "pnb", &found, &params)?;

            params.complexity.pnb = found.count();

            if backward {
                let b = pnb::backward_bias(&params.attack, &found.pnbs, &stopflag)?;
                println!("epsilon_a = {:.6}", b.bias);

                let target = match &run.save {
                    Some(Some(p)) => Some(Some(p.with_extension("backward.json"))),
                    other => other.clone(),
                };
                save(&target, "backward", &b, &params)?;

                params.complexity.epsilon_a = b.bias.abs();
            }

            if report {
                print_complexity(&params, cli.exact)?;
            }
        }
        Some(Command::Invert { rounds, seed }) => {
            let seed = seed.unwrap_or_else(rand::random);
            let mut rng = StdRng::seed_from_u64(seed);

            let state = chacha::random_state(&mut rng);
            let output = chacha::block(&state, rounds);
            let recovered = chacha::invert_block(&output, &state, rounds);

            println!("Randomly generated initial state (seed {}):", seed);
            println!("{}", chacha::format_state(&state));
            println!("\nChaCha output block after {} rounds:", rounds);
            println!("{}", chacha::format_state(&output));
            println!("\nRecovered initial state:");
            println!("{}", chacha::format_state(&recovered));

            if recovered != state {
                return Err(error::Error::Mismatch.into());
            }
        }
    }

    Ok(())
}
