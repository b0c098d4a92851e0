use crate::constants;
use crate::error::{Error, Result};

use log::info;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Performs all disk related operations.
pub struct Disk {
    results_dir: PathBuf,
}

impl Disk {
    /// Returns a new Disk instance rooted at `data_dir`.
    /// Initializes the results directory if it is not already.
    pub fn new(data_dir: &Path) -> Result<Self> {
        let results_dir = data_dir.join("results");
        fs::create_dir_all(&results_dir)?;

        Ok(Disk { results_dir })
    }

    /// Returns a Disk in the per-user data directory.
    pub fn default_location() -> Result<Self> {
        match dirs::data_dir() {
            Some(dd) => Disk::new(&dd.join(constants::DATA_DIR_NAME)),
            None => Err(Error::Config("No data directory available!".to_string())),
        }
    }

    /// Returns the first unused path for a result of the given kind.
    pub fn next_result_path(&self, kind: &str) -> PathBuf {
        let mut cur: usize = 0;

        loop {
            let path = self.results_dir.join(format!("{}_{}.json", kind, cur));

            if !path.exists() {
                return path;
            }

            cur += 1;
        }
    }

    /// Saves a result under the next free name for its kind.
    pub fn save_result<T: Serialize>(&self, kind: &str, result: &T) -> Result<PathBuf> {
        let path = self.next_result_path(kind);
        write_json(&path, result)?;

        Ok(path)
    }
}

/// Writes a value as pretty JSON.
/// Refuses to overwrite anything that is not a regular file.
pub fn write_json<T: Serialize>(p: &Path, value: &T) -> Result<()> {
    if p.exists() && !p.is_file() {
        return Err(Error::Config(format!(
            "{} exists but is not a file, refusing to proceed!",
            p.display()
        )));
    }

    if let Some(parent) = p.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    serde_json::to_writer_pretty(BufWriter::new(File::create(p)?), value)?;
    info!("Wrote {}", p.display());

    Ok(())
}
