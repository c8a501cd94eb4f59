use anyhow::Result;
use clap::Parser;

use connect4_tables::{Pipeline, TablePaths, CHUNK_SIZE, DEPTH, NUM_COLS, NUM_ROWS};

/// Strongly solve Connect 4 by retrograde analysis
///
/// Enumerates every reachable position ply by ply, then propagates exact
/// scores backward, writing one sorted table file per ply.
#[derive(Parser)]
#[command(name = "c4tables", version, about)]
struct Cli {
    /// Filename prefix for ply data files and chunk files
    #[arg(long, default_value = "C4DATA-")]
    data_prefix: String,

    /// Filename prefix for table files
    #[arg(long, default_value = "C4TABLE-")]
    table_prefix: String,

    /// Shallow search depth used to prune the frontier
    #[arg(long, default_value_t = DEPTH)]
    depth: u32,

    /// Positions buffered in memory before a chunk file is flushed
    #[arg(long, default_value_t = CHUNK_SIZE)]
    chunk_size: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let paths = TablePaths::new(cli.data_prefix, cli.table_prefix);
    let pipeline = Pipeline::<NUM_ROWS, NUM_COLS>::new(paths, cli.depth, cli.chunk_size);
    pipeline.run()
}
