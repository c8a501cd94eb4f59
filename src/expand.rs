//! Forward expansion of one ply into sorted, deduplicated chunk files

use anyhow::{Context, Result};
use log::info;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};

use crate::compressed::{CompressedPosition, POSITION_SIZE};
use crate::files::{assert_fresh, open_record_file, TablePaths};
use crate::position::{Evaluation, Player};

/// Expands every position at `ply` into its undecided successors, writing
/// them as sorted, duplicate-free chunk files for `ply + 1`
///
/// # Notes
/// For each parent, a move is attempted in every column for the side to
/// move. A successor is kept only when the shallow evaluator at `depth`
/// returns [`Evaluation::Unknown`] for the opponent: successors it can
/// already decide are re-derived on demand during back-propagation, so
/// storing them would only bloat the frontier. Children accumulate in
/// memory and are flushed to a numbered chunk file after every
/// `chunk_size` parents.
pub fn expand_step<const ROWS: u32, const COLS: u32>(
    paths: &TablePaths,
    ply: u32,
    depth: u32,
    chunk_size: usize,
) -> Result<()> {
    let input_path = paths.ply_path(COLS, ROWS, ply);
    let (file, num_parents) = open_record_file(&input_path, POSITION_SIZE as u64)?;
    info!(
        "found {} positions to expand in {}",
        num_parents,
        input_path.display()
    );

    let player = Player::to_move(ply);
    let mut reader = BufReader::new(file);
    let mut children: Vec<u64> = Vec::new();
    let mut chunk = 0;
    let mut bytes = [0u8; POSITION_SIZE];

    for parent in 1..=num_parents {
        reader
            .read_exact(&mut bytes)
            .with_context(|| format!("could not read from {}", input_path.display()))?;
        let position = CompressedPosition::from_bytes(bytes).decompress();
        for col in 0..COLS {
            if let Some(next) = position.play::<ROWS>(player, col) {
                if next.evaluate::<ROWS, COLS>(player.other(), depth) == Evaluation::Unknown {
                    children.push(CompressedPosition::from(next).data());
                }
            }
        }
        if parent % chunk_size as u64 == 0 {
            info!("expanded {} positions", parent);
            write_chunk::<ROWS, COLS>(&mut children, paths, ply + 1, chunk)?;
            chunk += 1;
        }
    }
    if !children.is_empty() {
        info!("expanded {} positions", num_parents);
        write_chunk::<ROWS, COLS>(&mut children, paths, ply + 1, chunk)?;
    }
    Ok(())
}

/// Sorts and deduplicates the buffered children, writes them as one chunk
/// file and clears the buffer
fn write_chunk<const ROWS: u32, const COLS: u32>(
    children: &mut Vec<u64>,
    paths: &TablePaths,
    ply: u32,
    chunk: u32,
) -> Result<()> {
    children.sort_unstable();
    children.dedup();

    let path = paths.chunk_path(COLS, ROWS, ply, chunk);
    assert_fresh(&path)?;
    info!(
        "writing {} positions to chunk file {}",
        children.len(),
        path.display()
    );
    let file =
        File::create(&path).with_context(|| format!("could not create chunk file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for &child in children.iter() {
        writer
            .write_all(&child.to_le_bytes())
            .with_context(|| format!("could not write to chunk file {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("could not write to chunk file {}", path.display()))?;
    children.clear();
    Ok(())
}
