//! Board directory and maintenance commands: `taskboard board`, `taskboard repair`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use taskboard::board::db::{BoardDb, DbHandle};
use taskboard::board::service::BoardService;
use taskboard_common::{NewBoard, ReorderPolicy};

/// Open the local board database behind a service.
pub fn open_service(db_path: &Path, policy: ReorderPolicy) -> Result<BoardService> {
    if !db_path.exists() {
        anyhow::bail!(
            "No board database at {}. Run `taskboard init` first.",
            db_path.display()
        );
    }
    let db = BoardDb::new(db_path).context("Failed to open board database")?;
    Ok(BoardService::new(Arc::new(DbHandle::new(db)), policy))
}

pub async fn cmd_board_add(
    db_path: &Path,
    policy: ReorderPolicy,
    title: &str,
    id: Option<String>,
) -> Result<()> {
    let service = open_service(db_path, policy)?;
    let board = service
        .create_board(NewBoard {
            id,
            title: title.to_string(),
        })
        .await?;
    println!("Created board {} ({})", board.id, board.title);
    Ok(())
}

pub async fn cmd_board_list(db_path: &Path, policy: ReorderPolicy) -> Result<()> {
    let service = open_service(db_path, policy)?;
    let boards = service.list_boards().await?;
    if boards.is_empty() {
        println!("No boards yet. Create one with `taskboard board add <title>`.");
        return Ok(());
    }
    for board in boards {
        println!("{}  {}  (created {})", board.id, board.title, board.created_at);
    }
    Ok(())
}

pub async fn cmd_repair(db_path: &Path, policy: ReorderPolicy, board_id: &str) -> Result<()> {
    let service = open_service(db_path, policy)?;
    let report = service.repair_board(board_id).await?;
    if report.is_clean() {
        println!("Board {} is consistent; nothing to repair.", board_id);
    } else {
        println!(
            "Repaired board {}: {} column(s) and {} card(s) repositioned.",
            board_id, report.columns_repositioned, report.cards_repositioned
        );
    }
    Ok(())
}
