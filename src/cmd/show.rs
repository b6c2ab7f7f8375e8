//! Print a board: `taskboard show`.

use std::path::Path;

use anyhow::Result;
use taskboard::client::{BoardApi, HttpBoardApi};
use taskboard_common::{BoardContents, ReorderPolicy};

use super::board::open_service;

pub async fn cmd_show(
    db_path: &Path,
    policy: ReorderPolicy,
    board_id: &str,
    server: Option<&str>,
) -> Result<()> {
    let contents = match server {
        Some(url) => HttpBoardApi::new(url, board_id)?
            .get_board_contents()
            .await?,
        None => {
            open_service(db_path, policy)?
                .get_board_contents(board_id)
                .await?
        }
    };
    print!("{}", render(&contents));
    Ok(())
}

pub(super) fn render(contents: &BoardContents) -> String {
    let mut out = String::new();
    out.push_str(&format!("Board {}\n", contents.board_id));
    if contents.columns.is_empty() {
        out.push_str("  (no lists)\n");
    }
    for column in &contents.columns {
        out.push_str(&format!(
            "\n[{}] {} ({})\n",
            column.position, column.title, column.column_id
        ));
        for card in contents.cards_in(&column.column_id) {
            out.push_str(&format!("  {}. {} ({})", card.position, card.title, card.task_id));
            if let Some(label) = &card.label {
                out.push_str(&format!(" #{}", label));
            }
            out.push('\n');
        }
    }
    out
}
