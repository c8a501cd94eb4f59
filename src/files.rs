//! On-disk naming conventions and file preconditions for ply data files,
//! chunk files and table files

use anyhow::{ensure, Context, Result};

use std::fs::File;
use std::path::{Path, PathBuf};

/// The pair of filename prefixes a solving run writes under
///
/// # Notes
/// Ply data files and chunk files share the data prefix; table files use
/// the table prefix. A prefix may include directory components, e.g.
/// `/mnt/h/C4DATA-`. The file name proper encodes the board size and ply:
///
/// * ply data file: `<DATA_PREFIX><CC>-<RR>-<PPPP>`
/// * chunk file: `<DATA_PREFIX><CC>-<RR>-<PPPP>-<CCCCCCCC>`
/// * table file: `<TABLE_PREFIX><CC>-<RR>-<PPPP>`
///
/// with columns, rows, ply and chunk index zero-padded to 2, 2, 4 and 8
/// digits.
#[derive(Clone, Debug)]
pub struct TablePaths {
    data_prefix: String,
    table_prefix: String,
}

impl TablePaths {
    /// Creates a path provider from the two filename prefixes
    pub fn new<S: Into<String>, T: Into<String>>(data_prefix: S, table_prefix: T) -> Self {
        Self {
            data_prefix: data_prefix.into(),
            table_prefix: table_prefix.into(),
        }
    }

    /// Returns the path of the data file holding all positions at `ply`
    pub fn ply_path(&self, cols: u32, rows: u32, ply: u32) -> PathBuf {
        PathBuf::from(format!(
            "{}{:02}-{:02}-{:04}",
            self.data_prefix, cols, rows, ply
        ))
    }

    /// Returns the path of one sorted chunk of the positions at `ply`
    pub fn chunk_path(&self, cols: u32, rows: u32, ply: u32, chunk: u32) -> PathBuf {
        PathBuf::from(format!(
            "{}{:02}-{:02}-{:04}-{:08}",
            self.data_prefix, cols, rows, ply, chunk
        ))
    }

    /// Returns the path of the scored table file for `ply`
    pub fn table_path(&self, cols: u32, rows: u32, ply: u32) -> PathBuf {
        PathBuf::from(format!(
            "{}{:02}-{:02}-{:04}",
            self.table_prefix, cols, rows, ply
        ))
    }
}

/// Fails if an output path already exists. A fresh run must never
/// overwrite the artifacts of a previous one.
pub fn assert_fresh(path: &Path) -> Result<()> {
    ensure!(!path.exists(), "{} already exists", path.display());
    Ok(())
}

/// Opens an input file of fixed-size records, validating that it is a
/// regular file whose size is a whole number of records
///
/// Returns the open file together with the record count.
pub fn open_record_file(path: &Path, record_size: u64) -> Result<(File, u64)> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("could not stat input file {}", path.display()))?;
    ensure!(
        metadata.is_file(),
        "{} exists but is not a regular file",
        path.display()
    );
    ensure!(
        metadata.len() % record_size == 0,
        "{} is malformed: {} bytes is not a multiple of the {}-byte record size",
        path.display(),
        metadata.len(),
        record_size
    );
    let file = File::open(path)
        .with_context(|| format!("could not open input file {}", path.display()))?;
    Ok((file, metadata.len() / record_size))
}
