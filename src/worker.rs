/// Worker threads for Monte Carlo trials.
use crate::constants;
use crate::error::{Error, Result};

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{channel, Sender},
    Arc,
};
use std::thread::{spawn, JoinHandle};
use std::time::{Duration, Instant};

const STATUS_INTERVAL: Duration = Duration::from_millis(1000);

/// A single randomized experiment with a yes/no outcome.
pub trait Trial: Send + Sync + 'static {
    fn run(&self, rng: &mut StdRng) -> bool;
}

/// Counts of matching outcomes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub matches: u64,
    pub trials: u64,
}

impl Tally {
    pub fn merge(&mut self, other: Tally) {
        self.matches += other.matches;
        self.trials += other.trials;
    }

    /// Fraction of matching trials.
    pub fn probability(&self) -> f64 {
        self.matches as f64 / self.trials as f64
    }

    /// Correlation `2p - 1`.
    pub fn bias(&self) -> f64 {
        2.0 * self.probability() - 1.0
    }
}

/// Outgoing messages from workers.
enum WorkerMsg {
    Progress(u64),
    Done(Tally),
}

/// Manages a single worker thread.
struct Worker {
    handle: JoinHandle<()>,
}

impl Worker {
    /// Starts a worker running `trials` trials from its own seeded generator.
    fn new(
        trial: Arc<dyn Trial>,
        trials: u64,
        seed: u64,
        stopflag: Arc<AtomicBool>,
        outgoing: Sender<WorkerMsg>,
    ) -> Self {
        let handle = spawn(move || {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut tally = Tally::default();

            while tally.trials < trials && !stopflag.load(Ordering::Relaxed) {
                let chunk = constants::WORKER_CHUNK.min(trials - tally.trials);

                for _ in 0..chunk {
                    if trial.run(&mut rng) {
                        tally.matches += 1;
                    }
                }

                tally.trials += chunk;

                if outgoing.send(WorkerMsg::Progress(chunk)).is_err() {
                    return;
                }
            }

            let _ = outgoing.send(WorkerMsg::Done(tally));
        });

        Worker { handle }
    }

    fn join(self) -> bool {
        self.handle.join().is_ok()
    }
}

/// Splits `trials` as evenly as possible over `threads` workers.
pub fn split(trials: u64, threads: usize) -> Vec<u64> {
    let threads = threads.max(1) as u64;
    let base = trials / threads;
    let extra = trials % threads;

    (0..threads).map(|i| base + if i < extra { 1 } else { 0 }).collect()
}

/// Runs `trials` trials over `threads` workers and returns the combined tally.
/// Worker `i` draws from a generator seeded with `seed + i`.
/// Setting `stopflag` ends the run early with whatever has been counted.
pub fn run(
    trial: Arc<dyn Trial>,
    trials: u64,
    threads: usize,
    seed: u64,
    stopflag: &Arc<AtomicBool>,
) -> Result<Tally> {
    if trials == 0 {
        return Err(Error::Config("trial count must be positive".to_string()));
    }

    let (tx, rx) = channel();

    let workers: Vec<Worker> = split(trials, threads)
        .into_iter()
        .enumerate()
        .map(|(i, n)| {
            Worker::new(
                trial.clone(),
                n,
                seed.wrapping_add(i as u64),
                stopflag.clone(),
                tx.clone(),
            )
        })
        .collect();

    drop(tx);

    let start = Instant::now();
    let mut last_status = start;
    let mut completed: u64 = 0;
    let mut total = Tally::default();
    let mut finished = 0;

    while finished < workers.len() {
        match rx.recv() {
            Ok(WorkerMsg::Progress(n)) => {
                completed += n;

                if last_status.elapsed() > STATUS_INTERVAL {
                    last_status = Instant::now();
                    debug!(
                        "{}/{} trials ({:.1}%), {} ms elapsed",
                        completed,
                        trials,
                        completed as f64 * 100.0 / trials as f64,
                        start.elapsed().as_millis()
                    );
                }
            }
            Ok(WorkerMsg::Done(t)) => {
                total.merge(t);
                finished += 1;
            }
            Err(_) => break,
        }
    }

    let count = workers.len();
    let joined = workers.into_iter().map(Worker::join).filter(|ok| *ok).count();

    if joined < count {
        return Err(Error::WorkerFailed(count - joined));
    }

    if total.trials == 0 {
        return Err(Error::Interrupted);
    }

    if total.trials < trials {
        warn!("Stopped early after {}/{} trials", total.trials, trials);
    }

    Ok(total)
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::RngCore;

    /// Always matches.
    struct Always;

    impl Trial for Always {
        fn run(&self, _rng: &mut StdRng) -> bool {
            true
        }
    }

    /// Matches when the low bit of a random word is set.
    struct Coin;

    impl Trial for Coin {
        fn run(&self, rng: &mut StdRng) -> bool {
            rng.next_u32() & 1 == 1
        }
    }

    /// Tests trials are split without loss.
    #[test]
    fn split_sums_to_total() {
        assert_eq!(split(10, 3), vec![4, 3, 3]);
        assert_eq!(split(2, 4), vec![1, 1, 0, 0]);
        assert_eq!(split(7, 0), vec![7]);

        for threads in 1..9 {
            assert_eq!(split(12345, threads).iter().sum::<u64>(), 12345);
        }
    }

    /// Tests every requested trial is run.
    #[test]
    fn run_counts_all_trials() {
        let stop = Arc::new(AtomicBool::new(false));
        let t = run(Arc::new(Always), 10000, 3, 0, &stop).expect("run failed");

        assert_eq!(t, Tally { matches: 10000, trials: 10000 });
        assert_eq!(t.bias(), 1.0);
    }

    /// Tests a fixed seed and thread count reproduce the same tally.
    #[test]
    fn run_reproducible() {
        let stop = Arc::new(AtomicBool::new(false));
        let a = run(Arc::new(Coin), 20000, 2, 99, &stop).expect("run failed");
        let b = run(Arc::new(Coin), 20000, 2, 99, &stop).expect("run failed");

        assert_eq!(a, b);
        assert!((a.probability() - 0.5).abs() < 0.05);
    }

    /// Tests a raised stop flag interrupts the run.
    #[test]
    fn run_interrupted() {
        let stop = Arc::new(AtomicBool::new(true));

        assert!(matches!(
            run(Arc::new(Always), 1000, 2, 0, &stop),
            Err(Error::Interrupted)
        ));
    }

    /// Tests zero trials are rejected.
    #[test]
    fn run_rejects_zero_trials() {
        let stop = Arc::new(AtomicBool::new(false));

        assert!(run(Arc::new(Always), 0, 1, 0, &stop).is_err());
    }
}
