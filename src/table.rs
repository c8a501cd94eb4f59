//! A read-only, memory-mapped view of one ply's scored position table

use anyhow::{ensure, Context, Result};
use memmap2::Mmap;

use std::fs::File;
use std::path::Path;

use crate::compressed::{CompressedPosition, POSITION_SIZE};
use crate::position::{Player, Position, UNKNOWN_SCORE};

/// The number of bytes one `(position, score)` table record occupies
pub const ENTRY_SIZE: usize = POSITION_SIZE + 1;

/// One ply's table file mapped into memory
///
/// # Notes
/// A table file is a strictly ascending array of 9-byte records: a
/// little-endian compressed position followed by its signed 8-bit score.
/// The strict ordering supports O(log n) lookup by binary search, and the
/// kernel's page cache keeps random access over the mapping cheap while a
/// whole ply is combined against it.
///
/// The mapping and the underlying descriptor are released when the table
/// is dropped, on every exit path.
pub struct MemoryMappedTable {
    map: Mmap,
    num_entries: usize,
}

impl MemoryMappedTable {
    /// Maps a table file read-only
    ///
    /// Returns `Err` if the file is missing, cannot be mapped, or its size
    /// is not a whole number of records.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("could not open table file {}", path.display()))?;
        let metadata = file
            .metadata()
            .with_context(|| format!("could not stat table file {}", path.display()))?;
        ensure!(
            metadata.len() % ENTRY_SIZE as u64 == 0,
            "table file {} is malformed: {} bytes is not a multiple of the {}-byte entry size",
            path.display(),
            metadata.len(),
            ENTRY_SIZE
        );
        let map = unsafe { Mmap::map(&file) }
            .with_context(|| format!("could not memory-map table file {}", path.display()))?;
        Ok(Self {
            num_entries: map.len() / ENTRY_SIZE,
            map,
        })
    }

    /// Returns the number of `(position, score)` records in the table
    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    /// Reads the compressed position of the record at `index`
    pub fn position_at(&self, index: usize) -> CompressedPosition {
        let offset = ENTRY_SIZE * index;
        let mut bytes = [0u8; POSITION_SIZE];
        bytes.copy_from_slice(&self.map[offset..offset + POSITION_SIZE]);
        CompressedPosition::from_bytes(bytes)
    }

    /// Reads the score of the record at `index`
    pub fn score_at(&self, index: usize) -> i32 {
        self.map[ENTRY_SIZE * index + POSITION_SIZE] as i8 as i32
    }

    /// Looks up the score of a position for `player` to move
    ///
    /// # Notes
    /// A position absent from the table was pruned during expansion, which
    /// only happens when the shallow evaluator at `depth` was decisive for
    /// it. Such a miss is resolved on the fly by searching one ply deeper;
    /// that search failing to conclude means the configuration's horizon is
    /// inadequate, and the run is aborted rather than letting the unknown
    /// sentinel reach a combiner.
    pub fn lookup_score<const ROWS: u32, const COLS: u32>(
        &self,
        player: Player,
        position: Position,
        depth: u32,
    ) -> Result<i32> {
        let target = CompressedPosition::from(position);
        let mut lower = 0;
        let mut upper = self.num_entries;
        while lower < upper {
            let middle = lower + (upper - lower) / 2;
            let center = self.position_at(middle);
            if center < target {
                lower = middle + 1;
            } else if center > target {
                upper = middle;
            } else {
                return Ok(self.score_at(middle));
            }
        }
        let score = position.score::<ROWS, COLS>(player, depth + 1);
        ensure!(
            score != UNKNOWN_SCORE,
            "inconclusive search resolving a position missing from the table:\n{}",
            position
        );
        Ok(score)
    }

    /// Scores a parent position one ply below this table by combining the
    /// scores of all its children
    ///
    /// # Notes
    /// Mirrors the recurrence of [`Position::score`], with child scores
    /// taken from the table instead of a recursive search. Misses are
    /// resolved inside [`MemoryMappedTable::lookup_score`], so no unknown
    /// path exists here.
    pub fn evaluate_children<const ROWS: u32, const COLS: u32>(
        &self,
        player: Player,
        compressed: CompressedPosition,
        depth: u32,
    ) -> Result<i32> {
        let position = compressed.decompress();
        if position.won(player.other()) != 0 {
            return Ok(-1);
        }
        let mut best_negative = i32::MIN;
        let mut best_positive = 0;
        let mut has_draw = false;
        for col in 0..COLS {
            if let Some(next) = position.play::<ROWS>(player, col) {
                let score = self.lookup_score::<ROWS, COLS>(player.other(), next, depth)?;
                if score == -1 {
                    return Ok(1);
                } else if score < 0 {
                    best_negative = best_negative.max(score);
                } else if score > 0 {
                    best_positive = best_positive.max(score);
                } else {
                    has_draw = true;
                }
            }
        }
        Ok(if best_negative > i32::MIN {
            1 - best_negative
        } else if has_draw {
            0
        } else if best_positive > 0 {
            -best_positive - 1
        } else {
            0
        })
    }
}
