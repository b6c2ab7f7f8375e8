use anyhow::Result;
use async_trait::async_trait;
use taskboard_common::{Board, Card, Column, Scope};

use super::ledger::{CardPlacement, ColumnPlacement};

/// Persistence boundary for boards, columns and cards.
///
/// Scope reads return records ordered by position (ties in insertion order).
/// Placement batches write column and position together for each record.
/// Every error is treated by callers as transient.
#[async_trait]
pub trait BoardStore: Send + Sync {
    async fn board_exists(&self, board_id: &str) -> Result<bool>;
    async fn create_board(&self, board_id: &str, title: &str) -> Result<Board>;
    async fn list_boards(&self) -> Result<Vec<Board>>;

    /// Columns of a board, ordered by position.
    async fn columns(&self, board_id: &str) -> Result<Vec<Column>>;
    async fn find_column(&self, board_id: &str, column_id: &str) -> Result<Option<Column>>;
    async fn upsert_column(&self, column: Column) -> Result<Column>;
    async fn delete_column(&self, board_id: &str, column_id: &str) -> Result<bool>;
    async fn apply_column_placements(
        &self,
        board_id: &str,
        placements: Vec<ColumnPlacement>,
    ) -> Result<()>;

    /// Every card on a board, ordered by column then position.
    async fn cards(&self, board_id: &str) -> Result<Vec<Card>>;
    async fn cards_in_scope(&self, scope: &Scope) -> Result<Vec<Card>>;
    async fn find_card(&self, board_id: &str, task_id: &str) -> Result<Option<Card>>;
    async fn upsert_card(&self, card: Card) -> Result<Card>;
    async fn delete_card(&self, board_id: &str, task_id: &str) -> Result<bool>;
    /// Remove every card in a scope; returns how many were removed.
    async fn delete_cards_in_scope(&self, scope: &Scope) -> Result<u64>;
    async fn apply_card_placements(
        &self,
        board_id: &str,
        placements: Vec<CardPlacement>,
    ) -> Result<()>;
}
