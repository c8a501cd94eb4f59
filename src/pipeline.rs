//! The phase driver: seed, expand and merge forward, score the terminal
//! ply, then propagate scores backward

use anyhow::{ensure, Context, Result};
use log::info;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};

use crate::compressed::{CompressedPosition, POSITION_SIZE};
use crate::expand::expand_step;
use crate::files::{assert_fresh, open_record_file, TablePaths};
use crate::merge::merge_step;
use crate::position::{Player, UNKNOWN_SCORE};
use crate::table::MemoryMappedTable;

/// A complete solving run over a `COLS` x `ROWS` board
///
/// # Notes
/// Phases execute strictly in order and each phase owns its files
/// exclusively, so the whole run is single-threaded and needs no
/// synchronization. Every error is fatal: partial outputs stay on disk for
/// post-mortem inspection, and a rerun requires the operator to delete
/// them first.
pub struct Pipeline<const ROWS: u32, const COLS: u32> {
    paths: TablePaths,
    depth: u32,
    chunk_size: usize,
}

impl<const ROWS: u32, const COLS: u32> Pipeline<ROWS, COLS> {
    /// Creates a solving run from its path provider, shallow search depth
    /// and chunk buffer size
    pub fn new(paths: TablePaths, depth: u32, chunk_size: usize) -> Self {
        Self {
            paths,
            depth,
            chunk_size,
        }
    }

    /// The last ply whose positions are enumerated; all later positions
    /// are within reach of the shallow search
    pub fn terminal_ply(&self) -> u32 {
        ROWS * COLS - self.depth
    }

    /// Runs every phase: seed ply 0, expand and merge each forward ply,
    /// score the terminal ply, then back-propagate to ply 0
    pub fn run(&self) -> Result<()> {
        ensure!(COLS >= 1 && COLS <= 8, "column count {} out of range", COLS);
        ensure!(ROWS >= 1 && ROWS <= 7, "row count {} out of range", ROWS);
        ensure!(
            self.depth < ROWS * COLS,
            "search depth {} leaves no ply to enumerate",
            self.depth
        );
        ensure!(self.chunk_size > 0, "chunk size must be positive");

        self.zero_step()?;
        for ply in 0..self.terminal_ply() {
            expand_step::<ROWS, COLS>(&self.paths, ply, self.depth, self.chunk_size)?;
            merge_step::<ROWS, COLS>(&self.paths, ply + 1)?;
        }
        self.end_step()?;
        for ply in (1..=self.terminal_ply()).rev() {
            self.back_step(ply)?;
        }
        Ok(())
    }

    /// Seeds ply 0 with the single empty position
    pub fn zero_step(&self) -> Result<()> {
        let path = self.paths.ply_path(COLS, ROWS, 0);
        assert_fresh(&path)?;
        let mut file = File::create(&path)
            .with_context(|| format!("could not create ply file {}", path.display()))?;
        file.write_all(&CompressedPosition::EMPTY.to_bytes())
            .with_context(|| format!("could not write to ply file {}", path.display()))?;
        Ok(())
    }

    /// Scores every position at the terminal ply with a shallow search one
    /// ply past the pruning depth and writes the first table file
    ///
    /// The deeper search is conclusive by construction of the terminal
    /// ply; an unknown result here means the configuration is broken and
    /// aborts the run. The consumed ply data file is deleted.
    pub fn end_step(&self) -> Result<()> {
        let ply = self.terminal_ply();
        let input_path = self.paths.ply_path(COLS, ROWS, ply);
        let output_path = self.paths.table_path(COLS, ROWS, ply);
        let (file, num_positions) = open_record_file(&input_path, POSITION_SIZE as u64)?;
        assert_fresh(&output_path)?;
        info!(
            "scoring {} terminal positions at ply {}",
            num_positions, ply
        );

        let player = Player::to_move(ply);
        let mut reader = BufReader::new(file);
        let output = File::create(&output_path)
            .with_context(|| format!("could not create table file {}", output_path.display()))?;
        let mut writer = BufWriter::new(output);
        let mut bytes = [0u8; POSITION_SIZE];

        for count in 1..=num_positions {
            reader
                .read_exact(&mut bytes)
                .with_context(|| format!("could not read from {}", input_path.display()))?;
            let position = CompressedPosition::from_bytes(bytes);
            let score = position
                .decompress()
                .score::<ROWS, COLS>(player, self.depth + 1);
            ensure!(
                score != UNKNOWN_SCORE,
                "inconclusive search at terminal ply {} for position:\n{}",
                ply,
                position
            );
            write_entry(&mut writer, position, score)
                .with_context(|| format!("could not write to table file {}", output_path.display()))?;
            if count % self.chunk_size as u64 == 0 {
                info!("evaluated {} positions", count);
            }
        }
        writer
            .flush()
            .with_context(|| format!("could not write to table file {}", output_path.display()))?;
        info!("evaluated {} positions", num_positions);

        std::fs::remove_file(&input_path)
            .with_context(|| format!("could not delete ply file {}", input_path.display()))?;
        Ok(())
    }

    /// Scores every position at `ply - 1` by combining its children's
    /// scores from the memory-mapped table of `ply`
    ///
    /// The consumed ply data file is deleted; the mapping is released
    /// before the method returns, so adjacent tables are never mapped
    /// simultaneously.
    pub fn back_step(&self, ply: u32) -> Result<()> {
        info!("back-propagating from ply {} to ply {}", ply, ply - 1);
        let input_path = self.paths.ply_path(COLS, ROWS, ply - 1);
        let output_path = self.paths.table_path(COLS, ROWS, ply - 1);
        let table_path = self.paths.table_path(COLS, ROWS, ply);
        let (file, num_positions) = open_record_file(&input_path, POSITION_SIZE as u64)?;
        assert_fresh(&output_path)?;
        let table = MemoryMappedTable::open(&table_path)?;

        let player = Player::to_move(ply - 1);
        let mut reader = BufReader::new(file);
        let output = File::create(&output_path)
            .with_context(|| format!("could not create table file {}", output_path.display()))?;
        let mut writer = BufWriter::new(output);
        let mut bytes = [0u8; POSITION_SIZE];

        for count in 1..=num_positions {
            reader
                .read_exact(&mut bytes)
                .with_context(|| format!("could not read from {}", input_path.display()))?;
            let position = CompressedPosition::from_bytes(bytes);
            let score = table.evaluate_children::<ROWS, COLS>(player, position, self.depth)?;
            write_entry(&mut writer, position, score)
                .with_context(|| format!("could not write to table file {}", output_path.display()))?;
            if count % self.chunk_size as u64 == 0 {
                info!("evaluated {} positions", count);
            }
        }
        writer
            .flush()
            .with_context(|| format!("could not write to table file {}", output_path.display()))?;
        info!("evaluated {} positions", num_positions);

        std::fs::remove_file(&input_path)
            .with_context(|| format!("could not delete ply file {}", input_path.display()))?;
        Ok(())
    }
}

/// Appends one 9-byte `(position, score)` record, narrowing the score to
/// its on-disk width
fn write_entry<W: Write>(writer: &mut W, position: CompressedPosition, score: i32) -> Result<()> {
    let score = i8::try_from(score)
        .with_context(|| format!("score {} does not fit the 8-bit table format", score))?;
    writer.write_all(&position.to_bytes())?;
    writer.write_all(&score.to_le_bytes())?;
    Ok(())
}
