//! A retrograde-analysis solver for the board game 'Connect 4'
//!
//! This crate enumerates every reachable position layer by layer from the
//! empty board, prunes positions whose outcome a shallow search already
//! decides, and then propagates exact minimax scores backward until the
//! empty board itself is scored. Because the position count vastly exceeds
//! memory, each layer is built out-of-core: expansion writes sorted chunk
//! files, a k-way merge produces one sorted, duplicate-free file per ply,
//! and back-propagation looks up child scores through a memory-mapped table.
//!
//! # Basic Usage
//!
//! ```no_run
//! use connect4_tables::{Pipeline, TablePaths, CHUNK_SIZE, DEPTH, NUM_COLS, NUM_ROWS};
//!
//!# use std::error::Error;
//!# fn main() -> Result<(), Box<dyn Error>> {
//! let paths = TablePaths::new("C4DATA-", "C4TABLE-");
//! let pipeline = Pipeline::<NUM_ROWS, NUM_COLS>::new(paths, DEPTH, CHUNK_SIZE);
//! pipeline.run()?;
//!# Ok(())
//!# }
//! ```
//!
//! The output is one table file per ply: a sorted array of 9-byte records
//! pairing each compressed position with its signed score (see
//! [`CompressedPosition`] and [`MemoryMappedTable`]).

use static_assertions::*;
pub use anyhow;

pub mod bitboard;

pub mod position;

pub mod compressed;

pub mod table;

pub mod files;

pub mod expand;

pub mod merge;

pub mod pipeline;

mod test;

pub use bitboard::BitBoard;
pub use compressed::CompressedPosition;
pub use files::TablePaths;
pub use pipeline::Pipeline;
pub use position::{Evaluation, Player, Position};
pub use table::MemoryMappedTable;

/// The width of the game board in columns
pub const NUM_COLS: u32 = 7;

/// The height of the game board in rows
pub const NUM_ROWS: u32 = 6;

/// The fixed depth of the shallow search used to prune the frontier
pub const DEPTH: u32 = 2;

/// The number of positions buffered in memory before a chunk file is flushed
pub const CHUNK_SIZE: usize = 10_000_000;

// the bitboard packs 8 columns of 8 bits, with the top bit of every column
// reserved as a sentinel
const_assert!(NUM_COLS >= 1 && NUM_COLS <= 8);
const_assert!(NUM_ROWS >= 1 && NUM_ROWS <= 7);
const_assert!(DEPTH < NUM_ROWS * NUM_COLS);
