#[cfg(test)]
pub mod test {
    use anyhow::Result;
    use tempfile::TempDir;

    use std::fs;
    use std::path::Path;

    use crate::expand::expand_step;
    use crate::merge::merge_step;
    use crate::position::UNKNOWN_SCORE;
    use crate::{
        BitBoard, CompressedPosition, Evaluation, MemoryMappedTable, Pipeline, Player, Position,
        TablePaths,
    };

    fn bit(col: u32, row: u32) -> u64 {
        1 << (8 * col + row)
    }

    /// Plays a sequence of columns from the empty board, alternating players
    fn play_out<const ROWS: u32>(moves: &[u32]) -> Position {
        let mut position = Position::EMPTY;
        let mut player = Player::White;
        for &col in moves {
            position = position.play::<ROWS>(player, col).unwrap();
            player = player.other();
        }
        position
    }

    fn temp_paths(dir: &TempDir) -> TablePaths {
        TablePaths::new(
            dir.path().join("C4DATA-").to_str().unwrap(),
            dir.path().join("C4TABLE-").to_str().unwrap(),
        )
    }

    fn write_positions(path: &Path, positions: &[u64]) -> Result<()> {
        let mut bytes = Vec::new();
        for &position in positions {
            bytes.extend_from_slice(&position.to_le_bytes());
        }
        fs::write(path, bytes)?;
        Ok(())
    }

    fn read_positions(path: &Path) -> Result<Vec<u64>> {
        let bytes = fs::read(path)?;
        Ok(bytes
            .chunks_exact(8)
            .map(|chunk| u64::from_le_bytes(chunk.try_into().unwrap()))
            .collect())
    }

    #[test]
    pub fn win_detection() {
        // one run in each of the four directions
        assert!(BitBoard::new(bit(0, 0) | bit(0, 1) | bit(0, 2) | bit(0, 3)).won() != 0);
        assert!(BitBoard::new(bit(0, 0) | bit(1, 0) | bit(2, 0) | bit(3, 0)).won() != 0);
        assert!(BitBoard::new(bit(0, 0) | bit(1, 1) | bit(2, 2) | bit(3, 3)).won() != 0);
        assert!(BitBoard::new(bit(0, 3) | bit(1, 2) | bit(2, 1) | bit(3, 0)).won() != 0);

        // three in a row is not a win
        assert!(BitBoard::new(bit(0, 0) | bit(0, 1) | bit(0, 2)).won() == 0);

        // three at the top of one column plus the bottom of the next must
        // not register as a vertical run across the column boundary
        assert!(BitBoard::new(bit(0, 4) | bit(0, 5) | bit(0, 6) | bit(1, 0)).won() == 0);
    }

    #[test]
    pub fn column_heights() {
        let empty = BitBoard::new(0);
        for col in 0..8 {
            assert_eq!(empty.height(col), 0);
        }

        let board = BitBoard::new(bit(2, 0) | bit(2, 1) | bit(2, 2));
        assert_eq!(board.height(2), 3);
        assert_eq!(board.height(1), 0);

        // column 1 filled all the way to the sentinel row
        let full = BitBoard::new(0x7F << 8);
        assert_eq!(full.height(1), 7);
    }

    #[test]
    pub fn play_fills_columns() {
        let mut position = Position::EMPTY;
        for _ in 0..6 {
            position = position.play::<6>(Player::White, 0).unwrap();
        }
        assert_eq!(position.full_board().height(0), 6);
        assert!(position.play::<6>(Player::White, 0).is_none());
    }

    #[test]
    pub fn compression_oracles() {
        assert_eq!(
            CompressedPosition::from(Position::EMPTY).data(),
            0x0101010101010101
        );
        assert!(CompressedPosition::EMPTY.decompress().is_empty());

        let white_first = Position::EMPTY.play::<6>(Player::White, 0).unwrap();
        assert_eq!(
            CompressedPosition::from(white_first).data(),
            0x0101010101010102
        );
    }

    #[test]
    pub fn compression_round_trip() -> Result<()> {
        // enumerate every position reachable within four plies on the full
        // board and check the reachable-state invariants along the way
        let mut layer = vec![Position::EMPTY];
        for ply in 0..4 {
            let player = Player::to_move(ply);
            let mut next_layer = Vec::new();
            for &position in &layer {
                for col in 0..7 {
                    if let Some(next) = position.play::<6>(player, col) {
                        next_layer.push(next);
                    }
                }
            }
            layer = next_layer;
            for &position in &layer {
                let full = position.full_board().bits();
                // the sentinel row stays clear and the players never overlap
                assert_eq!(full & 0x8080808080808080, 0);
                assert_eq!(position.white().bits() & position.black().bits(), 0);
                // every column is a contiguous stack from the bottom
                for col in 0..8 {
                    let column = (full >> (8 * col)) & 0xFF;
                    assert_eq!(column & (column + 1), 0);
                }

                let compressed = CompressedPosition::from(position);
                assert_eq!(compressed.decompress(), position);
                assert_eq!(CompressedPosition::from(compressed.decompress()), compressed);
            }
        }
        Ok(())
    }

    #[test]
    pub fn shallow_search_oracles() {
        // white has three in a row in column 0 with room above
        let position = play_out::<6>(&[0, 1, 0, 1, 0, 1]);
        assert_eq!(position.score::<6, 7>(Player::White, 1), 1);
        assert_eq!(position.evaluate::<6, 7>(Player::White, 1), Evaluation::Win);

        // after white completes the column, black has already lost
        let lost = play_out::<6>(&[0, 1, 0, 1, 0, 1, 0]);
        assert_eq!(lost.score::<6, 7>(Player::Black, 3), -1);
        assert_eq!(lost.evaluate::<6, 7>(Player::Black, 3), Evaluation::Loss);

        // the empty board is beyond a depth-1 horizon
        assert_eq!(Position::EMPTY.score::<6, 7>(Player::White, 1), UNKNOWN_SCORE);
        assert_eq!(
            Position::EMPTY.evaluate::<6, 7>(Player::White, 1),
            Evaluation::Unknown
        );
    }

    #[test]
    pub fn merge_deduplicates_across_chunks() -> Result<()> {
        let dir = TempDir::new()?;
        let paths = temp_paths(&dir);
        write_positions(&paths.chunk_path(7, 6, 1, 0), &[2, 5, 9])?;
        write_positions(&paths.chunk_path(7, 6, 1, 1), &[2, 3, 9, 11])?;

        merge_step::<6, 7>(&paths, 1)?;

        assert_eq!(
            read_positions(&paths.ply_path(7, 6, 1))?,
            vec![2, 3, 5, 9, 11]
        );
        // chunk files are deleted after a successful merge
        assert!(!paths.chunk_path(7, 6, 1, 0).exists());
        assert!(!paths.chunk_path(7, 6, 1, 1).exists());
        Ok(())
    }

    #[test]
    pub fn expand_first_ply() -> Result<()> {
        let dir = TempDir::new()?;
        let paths = temp_paths(&dir);
        let pipeline = Pipeline::<6, 7>::new(temp_paths(&dir), 2, 1000);
        pipeline.zero_step()?;

        expand_step::<6, 7>(&paths, 0, 2, 1000)?;
        merge_step::<6, 7>(&paths, 1)?;

        // the empty board has one undecided successor per column
        let positions = read_positions(&paths.ply_path(7, 6, 1))?;
        assert_eq!(positions.len(), 7);
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        Ok(())
    }

    #[test]
    pub fn table_lookup() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("table");

        // a single stored entry: the position after white plays column 0
        let stored = CompressedPosition::from(play_out::<6>(&[0]));
        let mut bytes = stored.to_bytes().to_vec();
        bytes.push(5i8 as u8);
        fs::write(&path, &bytes)?;

        let table = MemoryMappedTable::open(&path)?;
        assert_eq!(table.num_entries(), 1);
        assert_eq!(table.position_at(0), stored);
        assert_eq!(table.score_at(0), 5);

        // a hit returns the stored score
        assert_eq!(
            table.lookup_score::<6, 7>(Player::Black, stored.decompress(), 0)?,
            5
        );
        // a miss with a decisive one-deeper search resolves on the fly
        let missing = play_out::<6>(&[0, 1, 0, 1, 0, 1]);
        assert_eq!(table.lookup_score::<6, 7>(Player::White, missing, 0)?, 1);
        // a miss past even the deeper horizon aborts
        assert!(table
            .lookup_score::<6, 7>(Player::White, Position::EMPTY, 0)
            .is_err());
        Ok(())
    }

    #[test]
    pub fn malformed_table_file() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("table");
        fs::write(&path, [0u8; 10])?;
        assert!(MemoryMappedTable::open(&path).is_err());
        Ok(())
    }

    #[test]
    pub fn fresh_run_collision() -> Result<()> {
        let dir = TempDir::new()?;
        let pipeline = Pipeline::<6, 7>::new(temp_paths(&dir), 2, 1000);
        pipeline.zero_step()?;
        assert!(pipeline.zero_step().is_err());
        Ok(())
    }

    #[test]
    pub fn pipeline_solves_three_by_three() -> Result<()> {
        let dir = TempDir::new()?;
        let paths = temp_paths(&dir);
        let pipeline = Pipeline::<3, 3>::new(temp_paths(&dir), 2, 1000);
        pipeline.run()?;

        // no four-in-a-row fits on a 3x3 board, so best play draws from
        // every reachable position
        for ply in 0..=pipeline.terminal_ply() {
            let table = MemoryMappedTable::open(&paths.table_path(3, 3, ply))?;
            assert!(table.num_entries() > 0);
            for index in 0..table.num_entries() {
                assert_eq!(table.score_at(index), 0);
                if index > 0 {
                    assert!(table.position_at(index - 1) < table.position_at(index));
                }
            }
            // the consumed data file is gone
            assert!(!paths.ply_path(3, 3, ply).exists());
        }

        let table = MemoryMappedTable::open(&paths.table_path(3, 3, 0))?;
        assert_eq!(table.num_entries(), 1);
        assert_eq!(table.position_at(0), CompressedPosition::EMPTY);
        Ok(())
    }

    #[test]
    pub fn pipeline_reruns_byte_identical() -> Result<()> {
        let first = TempDir::new()?;
        let second = TempDir::new()?;
        Pipeline::<4, 4>::new(temp_paths(&first), 2, 4096).run()?;
        Pipeline::<4, 4>::new(temp_paths(&second), 2, 4096).run()?;

        let paths = temp_paths(&first);
        let other = temp_paths(&second);
        for ply in 0..=14 {
            let a = fs::read(paths.table_path(4, 4, ply))?;
            let b = fs::read(other.table_path(4, 4, ply))?;
            assert!(!a.is_empty());
            assert_eq!(a, b);
        }

        // the empty board is the only entry at ply 0
        let table = MemoryMappedTable::open(&paths.table_path(4, 4, 0))?;
        assert_eq!(table.num_entries(), 1);
        assert_eq!(table.position_at(0), CompressedPosition::EMPTY);
        Ok(())
    }
}
