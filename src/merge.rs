//! K-way merge of one ply's chunk files into a single sorted, unique data
//! file

use anyhow::{ensure, Context, Result};
use log::{debug, info};

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};

use crate::compressed::POSITION_SIZE;
use crate::files::{assert_fresh, open_record_file, TablePaths};

/// One open chunk file with a single-entry front buffer
struct ChunkReader {
    reader: BufReader<File>,
    front: u64,
}

impl ChunkReader {
    fn new(file: File) -> Self {
        Self {
            reader: BufReader::new(file),
            front: 0,
        }
    }

    /// Reads the next position into the front buffer, returning `false` at
    /// end of file
    fn refill(&mut self) -> Result<bool> {
        let mut bytes = [0u8; POSITION_SIZE];
        match self.reader.read_exact(&mut bytes) {
            Ok(()) => {
                self.front = u64::from_le_bytes(bytes);
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(false),
            Err(err) => Err(err).context("could not read from chunk file"),
        }
    }
}

/// Merges all chunk files of `ply` into its single ply data file, then
/// deletes them
///
/// # Notes
/// Chunk files are opened by ascending index until the first missing one.
/// Each is individually sorted and unique, so one front entry per reader
/// suffices: the minimum over all fronts is emitted once, and every reader
/// whose front equals it advances, which removes duplicates across chunks
/// without any auxiliary structure. The linear scan over fronts costs
/// O(n) comparisons per output position, acceptable for the chunk counts
/// these board sizes produce.
pub fn merge_step<const ROWS: u32, const COLS: u32>(paths: &TablePaths, ply: u32) -> Result<()> {
    let mut readers = Vec::new();
    let mut num_chunks = 0;
    let mut total = 0;
    loop {
        let path = paths.chunk_path(COLS, ROWS, ply, num_chunks);
        if !path.exists() {
            break;
        }
        let (file, count) = open_record_file(&path, POSITION_SIZE as u64)?;
        readers.push(ChunkReader::new(file));
        num_chunks += 1;
        total += count;
    }
    ensure!(num_chunks > 0, "found no chunk files to merge for ply {}", ply);
    info!(
        "merging {} positions from {} chunk files into ply {}",
        total, num_chunks, ply
    );

    let output_path = paths.ply_path(COLS, ROWS, ply);
    assert_fresh(&output_path)?;
    let file = File::create(&output_path)
        .with_context(|| format!("could not create ply file {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);

    let mut active = Vec::with_capacity(readers.len());
    for mut reader in readers {
        if reader.refill()? {
            active.push(reader);
        } else {
            debug!("closed empty chunk file");
        }
    }

    let mut written = 0u64;
    while !active.is_empty() {
        let minimum = active.iter().fold(u64::MAX, |min, r| min.min(r.front));
        writer
            .write_all(&minimum.to_le_bytes())
            .with_context(|| format!("could not write to ply file {}", output_path.display()))?;
        written += 1;
        let mut i = 0;
        while i < active.len() {
            if active[i].front == minimum {
                if active[i].refill()? {
                    i += 1;
                } else {
                    active.remove(i);
                    debug!("closed chunk file");
                }
            } else {
                i += 1;
            }
        }
    }
    writer
        .flush()
        .with_context(|| format!("could not write to ply file {}", output_path.display()))?;
    info!("wrote {} unique positions to {}", written, output_path.display());

    for chunk in 0..num_chunks {
        let path = paths.chunk_path(COLS, ROWS, ply, chunk);
        std::fs::remove_file(&path)
            .with_context(|| format!("could not delete chunk file {}", path.display()))?;
    }
    Ok(())
}
