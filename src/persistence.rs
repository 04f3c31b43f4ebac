//! Saving and restoring learned models
//!
//! Estimators are stored as a versioned `Parameters` snapshot tagged with
//! the input and output sizes they were trained for; Q-tables are stored
//! whole. Both use bincode.

use std::{
    fs::File,
    io::{BufReader, BufWriter, ErrorKind, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    agent::QTable,
    error::{Error, Result},
    estimator::{Parameters, QEstimator},
};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedEstimator {
    pub version: u32,
    pub input_size: usize,
    pub output_size: usize,
    pub parameters: Parameters,
}

/// What to do when there is no model to resume from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// A missing file is an error.
    #[default]
    Require,
    /// A missing file keeps the estimator's fresh weights. Corrupt or
    /// incompatible files are still errors.
    FreshIfMissing,
}

pub fn save_estimator<E: QEstimator + ?Sized>(estimator: &E, path: impl AsRef<Path>) -> Result<()> {
    let saved = SavedEstimator {
        version: FORMAT_VERSION,
        input_size: estimator.input_size(),
        output_size: estimator.output_size(),
        parameters: estimator.parameters(),
    };
    write(path.as_ref(), &saved)
}

/// Read a saved estimator and check it fits a `input_size -> output_size` network.
pub fn load_parameters(path: impl AsRef<Path>, input_size: usize, output_size: usize) -> Result<Parameters> {
    let path = path.as_ref();
    let saved: SavedEstimator = read(path)?;
    if saved.version != FORMAT_VERSION {
        return Err(Error::IncompatibleShape {
            expected: format!("format version {FORMAT_VERSION}"),
            found: format!("format version {}", saved.version),
        });
    }
    if (saved.input_size, saved.output_size) != (input_size, output_size) {
        return Err(Error::IncompatibleShape {
            expected: format!("{input_size} inputs -> {output_size} outputs"),
            found: format!("{} inputs -> {} outputs", saved.input_size, saved.output_size),
        });
    }
    Ok(saved.parameters)
}

/// Load saved weights into `estimator`. Returns whether anything was loaded.
pub fn restore_estimator<E: QEstimator + ?Sized>(
    estimator: &mut E,
    path: impl AsRef<Path>,
    policy: LoadPolicy,
) -> Result<bool> {
    let path = path.as_ref();
    match load_parameters(path, estimator.input_size(), estimator.output_size()) {
        Ok(parameters) => {
            estimator.set_parameters(&parameters)?;
            info!(path = %path.display(), "restored model");
            Ok(true)
        }
        Err(Error::ModelNotFound { .. }) if policy == LoadPolicy::FreshIfMissing => {
            warn!(path = %path.display(), "no saved model, starting from fresh weights");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

pub fn save_q_table(table: &QTable, path: impl AsRef<Path>) -> Result<()> {
    write(path.as_ref(), table)
}

pub fn load_q_table(path: impl AsRef<Path>) -> Result<QTable> {
    read(path.as_ref())
}

fn write<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|source| Error::io(format!("create directory {}", parent.display()), source))?;
    }
    let file = File::create(path).map_err(|source| Error::io(format!("create {}", path.display()), source))?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, value)?;
    writer
        .flush()
        .map_err(|source| Error::io(format!("write {}", path.display()), source))
}

fn read<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(source) if source.kind() == ErrorKind::NotFound => {
            return Err(Error::ModelNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(source) => return Err(Error::io(format!("open {}", path.display()), source)),
    };
    bincode::deserialize_from(BufReader::new(file)).map_err(|source| Error::CorruptModel {
        path: path.to_path_buf(),
        source,
    })
}
