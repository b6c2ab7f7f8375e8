//! Follow a board on a running server: `taskboard watch`.

use std::sync::Arc;

use anyhow::Result;
use taskboard::client::{HttpBoardApi, SyncController, SyncSettings};
use taskboard_common::ReorderPolicy;
use tracing::info;

use super::show::render;

/// Poll `board_id` through a [`SyncController`] and reprint it whenever the
/// snapshot changes, until Ctrl+C.
pub async fn cmd_watch(
    server_url: &str,
    board_id: &str,
    policy: ReorderPolicy,
    settings: SyncSettings,
) -> Result<()> {
    let api = Arc::new(HttpBoardApi::new(server_url, board_id)?);
    let sync = Arc::new(SyncController::new(api, board_id, policy, settings));
    sync.refresh().await?;

    let mut shown = sync.snapshot().to_contents();
    print!("{}", render(&shown));

    let poller = sync.spawn_polling();
    let mut ticker = tokio::time::interval(settings.poll_interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }
        let current = sync.snapshot().to_contents();
        if current != shown {
            println!();
            print!("{}", render(&current));
            shown = current;
        }
    }
    poller.abort();
    info!(board_id, "stopped watching");
    Ok(())
}
