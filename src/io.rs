//! Model persistence and report files.
//!
//! The model file is a JSON document with a single `trees` field; its
//! per-tree sub-documents are the serde shape of [`Tree`]. The feature
//! importance report is a companion text file with one
//! `id <tab> importance <tab> name` line per feature.
//!
//! [`Tree`]: crate::model::Tree

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::model::{Forest, TreeValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ModelIoError {
    #[error("failed to access model file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode model file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("model file {path} holds a malformed tree: {source}")]
    InvalidTree {
        path: PathBuf,
        source: TreeValidationError,
    },
}

/// Write the model document.
pub fn save_model(path: &Path, forest: &Forest) -> Result<(), ModelIoError> {
    let io_err = |source| ModelIoError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, forest).map_err(|source| ModelIoError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_err)
}

/// Read and structurally validate a model document.
///
/// `n_features` is the current config's schema width; a model trained under
/// a wider schema is rejected here instead of indexing past the row at
/// prediction time.
pub fn load_model(path: &Path, n_features: usize) -> Result<Forest, ModelIoError> {
    let file = File::open(path).map_err(|source| ModelIoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let forest: Forest =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ModelIoError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    for tree in forest.trees() {
        tree.validate(n_features)
            .map_err(|source| ModelIoError::InvalidTree {
                path: path.to_path_buf(),
                source,
            })?;
    }
    Ok(forest)
}

/// Write the feature-importance report next to the model.
pub fn write_importance(
    path: &Path,
    config: &Config,
    importance: &[f64],
) -> Result<(), ModelIoError> {
    debug_assert_eq!(importance.len(), config.n_features());
    let io_err = |source| ModelIoError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    for (fid, &imp) in importance.iter().enumerate() {
        writeln!(writer, "{fid}\t{imp}\t{}", config.feature_name(fid)).map_err(io_err)?;
    }
    writer.flush().map_err(io_err)
}
