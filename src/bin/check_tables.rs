use anyhow::{ensure, Result};
use clap::Parser;
use log::info;

use connect4_tables::{
    Evaluation, MemoryMappedTable, Player, TablePaths, DEPTH, NUM_COLS, NUM_ROWS,
};

/// Verify one ply's table file against an independent forward search
///
/// Re-evaluates every entry with a deeper shallow search and fails on any
/// entry whose stored score contradicts the search result. Entries the
/// search cannot decide are counted but not judged.
#[derive(Parser)]
#[command(name = "check_tables", version, about)]
struct Cli {
    /// The ply whose table file to verify
    ply: u32,

    /// Filename prefix for table files
    #[arg(long, default_value = "C4TABLE-")]
    table_prefix: String,

    /// Depth of the verifying search
    #[arg(long, default_value_t = DEPTH + 4)]
    depth: u32,

    /// Print every entry as a board grid with its score
    #[arg(long)]
    dump: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let paths = TablePaths::new("", cli.table_prefix);
    let path = paths.table_path(NUM_COLS, NUM_ROWS, cli.ply);
    let table = MemoryMappedTable::open(&path)?;
    info!("verifying {} entries in {}", table.num_entries(), path.display());

    let player = Player::to_move(cli.ply);
    let mut num_unknown = 0usize;
    for index in 0..table.num_entries() {
        let compressed = table.position_at(index);
        let score = table.score_at(index);
        let position = compressed.decompress();
        if cli.dump {
            println!("{}score {}\n", position, score);
        }
        match position.evaluate::<NUM_ROWS, NUM_COLS>(player, cli.depth) {
            Evaluation::Win => ensure!(
                score > 0,
                "entry {} scored {} but the verifying search finds a win:\n{}",
                index,
                score,
                position
            ),
            Evaluation::Loss => ensure!(
                score < 0,
                "entry {} scored {} but the verifying search finds a loss:\n{}",
                index,
                score,
                position
            ),
            Evaluation::Draw => ensure!(
                score == 0,
                "entry {} scored {} but the verifying search finds a draw:\n{}",
                index,
                score,
                position
            ),
            Evaluation::Unknown => num_unknown += 1,
        }
    }

    println!(
        "{}/{} entries verified",
        table.num_entries() - num_unknown,
        table.num_entries()
    );
    Ok(())
}
