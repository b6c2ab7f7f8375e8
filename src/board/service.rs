//! Board operations: the only code path that mutates positions.
//!
//! Every mutation runs read-full-scope, plan, batch-write while holding the
//! board's write lock, so two requests against the same board never
//! interleave their snapshots. Reads take no lock.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};

use serde::{Deserialize, Serialize};
use taskboard_common::{
    Board, BoardContents, Card, CardMove, CardPatch, Column, ColumnMove, ColumnPatch,
    ColumnRemoval, NewBoard, NewCard, NewColumn, ReorderPolicy, Scope,
};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use super::ledger;
use super::store::BoardStore;
use crate::errors::BoardError;

/// Per-board write locks, created on first use.
#[derive(Default)]
struct BoardLocks {
    inner: std::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl BoardLocks {
    async fn acquire(&self, board_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(board_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Outcome of [`BoardService::repair_board`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RepairReport {
    pub columns_repositioned: usize,
    pub cards_repositioned: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.columns_repositioned == 0 && self.cards_repositioned == 0
    }
}

pub struct BoardService {
    store: Arc<dyn BoardStore>,
    policy: ReorderPolicy,
    locks: BoardLocks,
}

fn store_failure(err: anyhow::Error) -> BoardError {
    BoardError::TransientStoreFailure(err)
}

fn require_id(kind: &str, value: &str) -> Result<(), BoardError> {
    if value.trim().is_empty() {
        return Err(BoardError::IllegalArgument(format!("{} must not be empty", kind)));
    }
    Ok(())
}

impl BoardService {
    pub fn new(store: Arc<dyn BoardStore>, policy: ReorderPolicy) -> Self {
        Self {
            store,
            policy,
            locks: BoardLocks::default(),
        }
    }

    pub fn policy(&self) -> ReorderPolicy {
        self.policy
    }

    async fn ensure_board(&self, board_id: &str) -> Result<(), BoardError> {
        if self
            .store
            .board_exists(board_id)
            .await
            .map_err(store_failure)?
        {
            Ok(())
        } else {
            Err(BoardError::BoardNotFound {
                board_id: board_id.to_string(),
            })
        }
    }

    async fn require_card(&self, board_id: &str, task_id: &str) -> Result<Card, BoardError> {
        self.store
            .find_card(board_id, task_id)
            .await
            .map_err(store_failure)?
            .ok_or_else(|| BoardError::card_not_found(board_id, task_id))
    }

    async fn require_column(&self, board_id: &str, column_id: &str) -> Result<Column, BoardError> {
        self.store
            .find_column(board_id, column_id)
            .await
            .map_err(store_failure)?
            .ok_or_else(|| BoardError::column_not_found(board_id, column_id))
    }

    // ── Board directory ───────────────────────────────────────────────

    pub async fn create_board(&self, req: NewBoard) -> Result<Board, BoardError> {
        let board_id = req
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        require_id("board id", &board_id)?;
        if self
            .store
            .board_exists(&board_id)
            .await
            .map_err(store_failure)?
        {
            return Err(BoardError::IllegalArgument(format!(
                "board {} already exists",
                board_id
            )));
        }
        let board = self
            .store
            .create_board(&board_id, &req.title)
            .await
            .map_err(store_failure)?;
        info!(board_id = %board.id, "board created");
        Ok(board)
    }

    pub async fn list_boards(&self) -> Result<Vec<Board>, BoardError> {
        self.store.list_boards().await.map_err(store_failure)
    }

    pub async fn board_exists(&self, board_id: &str) -> Result<bool, BoardError> {
        self.store.board_exists(board_id).await.map_err(store_failure)
    }

    // ── Reads ─────────────────────────────────────────────────────────

    /// Columns by position, cards by (column position, card position).
    pub async fn get_board_contents(&self, board_id: &str) -> Result<BoardContents, BoardError> {
        self.ensure_board(board_id).await?;
        let columns = self.store.columns(board_id).await.map_err(store_failure)?;
        let mut cards = self.store.cards(board_id).await.map_err(store_failure)?;

        let rank: HashMap<&str, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.column_id.as_str(), i))
            .collect();
        cards.sort_by(|a, b| {
            let ra = rank.get(a.column_id.as_str()).copied().unwrap_or(usize::MAX);
            let rb = rank.get(b.column_id.as_str()).copied().unwrap_or(usize::MAX);
            (ra, &a.column_id, a.position).cmp(&(rb, &b.column_id, b.position))
        });

        Ok(BoardContents {
            board_id: board_id.to_string(),
            columns,
            cards,
        })
    }

    // ── Cards ─────────────────────────────────────────────────────────

    /// Append a card to its column, or place it at an explicit position.
    /// Explicit positions are trusted as given.
    pub async fn create_card(&self, board_id: &str, req: NewCard) -> Result<Card, BoardError> {
        require_id("task id", &req.task_id)?;
        require_id("column id", &req.column_id)?;
        if let Some(position) = req.position
            && position < 0
        {
            return Err(BoardError::IllegalArgument(format!(
                "position must be non-negative, got {}",
                position
            )));
        }
        self.ensure_board(board_id).await?;
        let _guard = self.locks.acquire(board_id).await;

        self.require_column(board_id, &req.column_id).await?;
        if self
            .store
            .find_card(board_id, &req.task_id)
            .await
            .map_err(store_failure)?
            .is_some()
        {
            return Err(BoardError::IllegalArgument(format!(
                "card {} already exists",
                req.task_id
            )));
        }

        let position = match req.position {
            Some(position) => position,
            None => {
                let scope = Scope::new(board_id, &req.column_id);
                let count = self
                    .store
                    .cards_in_scope(&scope)
                    .await
                    .map_err(store_failure)?
                    .len();
                debug!(%scope, count, "appending card");
                i32::try_from(count).map_err(|_| {
                    BoardError::IllegalArgument(format!("column {} is full", req.column_id))
                })?
            }
        };

        let mut card = Card {
            board_id: board_id.to_string(),
            task_id: req.task_id,
            column_id: req.column_id,
            title: req.title,
            description: None,
            label: None,
            position,
        };
        CardPatch {
            title: None,
            description: req.description,
            label: req.label,
        }
        .apply_to(&mut card);

        let card = self.store.upsert_card(card).await.map_err(store_failure)?;
        info!(board_id, task_id = %card.task_id, column_id = %card.column_id, position = card.position, "card created");
        Ok(card)
    }

    /// Update title, description or label. Positions are never touched here.
    pub async fn edit_card(
        &self,
        board_id: &str,
        task_id: &str,
        patch: CardPatch,
    ) -> Result<Card, BoardError> {
        self.ensure_board(board_id).await?;
        let _guard = self.locks.acquire(board_id).await;

        let mut card = self.require_card(board_id, task_id).await?;
        if patch.is_empty() {
            return Ok(card);
        }
        patch.apply_to(&mut card);
        let card = self.store.upsert_card(card).await.map_err(store_failure)?;
        debug!(board_id, task_id, "card edited");
        Ok(card)
    }

    pub async fn move_card(
        &self,
        board_id: &str,
        task_id: &str,
        req: CardMove,
    ) -> Result<Card, BoardError> {
        if req.position < 0 {
            return Err(BoardError::IllegalArgument(format!(
                "position must be non-negative, got {}",
                req.position
            )));
        }
        self.ensure_board(board_id).await?;
        let _guard = self.locks.acquire(board_id).await;

        let card = self.require_card(board_id, task_id).await?;
        if self
            .store
            .find_column(board_id, &req.column_id)
            .await
            .map_err(store_failure)?
            .is_none()
        {
            return Err(BoardError::IllegalArgument(format!(
                "destination column {} does not exist",
                req.column_id
            )));
        }

        let source = self
            .store
            .cards_in_scope(&card.scope())
            .await
            .map_err(store_failure)?;
        let destination = if card.column_id == req.column_id {
            Vec::new()
        } else {
            self.store
                .cards_in_scope(&Scope::new(board_id, &req.column_id))
                .await
                .map_err(store_failure)?
        };

        let plan = ledger::plan_card_move(
            &card,
            &source,
            &destination,
            &req.column_id,
            req.position,
            self.policy,
        )?;
        if plan.is_noop() {
            debug!(board_id, task_id, "move is a no-op");
            return Ok(plan.card);
        }

        let writes = plan.placements.len();
        self.store
            .apply_card_placements(board_id, plan.placements)
            .await
            .map_err(store_failure)?;
        info!(
            board_id,
            task_id,
            from_column = %card.column_id,
            to_column = %plan.card.column_id,
            position = plan.card.position,
            writes,
            "card moved"
        );
        Ok(plan.card)
    }

    /// Delete a card and close the gap in its column.
    pub async fn remove_card(&self, board_id: &str, task_id: &str) -> Result<Card, BoardError> {
        self.ensure_board(board_id).await?;
        let _guard = self.locks.acquire(board_id).await;

        let card = self.require_card(board_id, task_id).await?;
        let scope = self
            .store
            .cards_in_scope(&card.scope())
            .await
            .map_err(store_failure)?;
        let placements = ledger::plan_card_compaction(&scope, task_id);
        if !placements.is_empty() {
            self.store
                .apply_card_placements(board_id, placements)
                .await
                .map_err(store_failure)?;
        }
        self.store
            .delete_card(board_id, task_id)
            .await
            .map_err(store_failure)?;
        info!(board_id, task_id, column_id = %card.column_id, "card removed");
        Ok(card)
    }

    /// Like [`remove_card`](Self::remove_card) but reports a missing card as
    /// `false` instead of an error.
    pub async fn delete_card(&self, board_id: &str, task_id: &str) -> Result<bool, BoardError> {
        match self.remove_card(board_id, task_id).await {
            Ok(_) => Ok(true),
            Err(BoardError::CardNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ── Columns ───────────────────────────────────────────────────────

    /// Append a column to the board.
    pub async fn create_column(&self, board_id: &str, req: NewColumn) -> Result<Column, BoardError> {
        require_id("column id", &req.column_id)?;
        self.ensure_board(board_id).await?;
        let _guard = self.locks.acquire(board_id).await;

        let columns = self.store.columns(board_id).await.map_err(store_failure)?;
        if columns.iter().any(|c| c.column_id == req.column_id) {
            return Err(BoardError::IllegalArgument(format!(
                "column {} already exists",
                req.column_id
            )));
        }
        let position = i32::try_from(columns.len())
            .map_err(|_| BoardError::IllegalArgument("board has too many columns".into()))?;
        let column = self
            .store
            .upsert_column(Column {
                board_id: board_id.to_string(),
                column_id: req.column_id,
                title: req.title,
                position,
            })
            .await
            .map_err(store_failure)?;
        info!(board_id, column_id = %column.column_id, position, "column created");
        Ok(column)
    }

    pub async fn edit_column(
        &self,
        board_id: &str,
        column_id: &str,
        patch: ColumnPatch,
    ) -> Result<Column, BoardError> {
        self.ensure_board(board_id).await?;
        let _guard = self.locks.acquire(board_id).await;

        let mut column = self.require_column(board_id, column_id).await?;
        column.title = patch.title;
        let column = self
            .store
            .upsert_column(column)
            .await
            .map_err(store_failure)?;
        debug!(board_id, column_id, "column renamed");
        Ok(column)
    }

    /// Move a column; the columns in between shift by one. Returns the
    /// board's columns in their new order.
    pub async fn move_column(
        &self,
        board_id: &str,
        column_id: &str,
        req: ColumnMove,
    ) -> Result<Vec<Column>, BoardError> {
        self.ensure_board(board_id).await?;
        let _guard = self.locks.acquire(board_id).await;

        let mut columns = self.store.columns(board_id).await.map_err(store_failure)?;
        if !columns.iter().any(|c| c.column_id == column_id) {
            return Err(BoardError::column_not_found(board_id, column_id));
        }
        let placements = ledger::plan_column_move(&columns, column_id, req.position)?;
        if !placements.is_empty() {
            ledger::apply_column_placements(&mut columns, &placements);
            self.store
                .apply_column_placements(board_id, placements)
                .await
                .map_err(store_failure)?;
            info!(board_id, column_id, position = req.position, "column moved");
        }
        columns.sort_by_key(|c| c.position);
        Ok(columns)
    }

    /// Delete a column together with every card in it, then close the gap
    /// in the board's column order.
    pub async fn delete_column(
        &self,
        board_id: &str,
        column_id: &str,
    ) -> Result<ColumnRemoval, BoardError> {
        self.ensure_board(board_id).await?;
        let _guard = self.locks.acquire(board_id).await;

        self.require_column(board_id, column_id).await?;
        let scope = Scope::new(board_id, column_id);
        let removed_card_count = self
            .store
            .delete_cards_in_scope(&scope)
            .await
            .map_err(store_failure)?;
        self.store
            .delete_column(board_id, column_id)
            .await
            .map_err(store_failure)?;

        let remaining = self.store.columns(board_id).await.map_err(store_failure)?;
        let placements = ledger::plan_column_repair(&remaining);
        if !placements.is_empty() {
            self.store
                .apply_column_placements(board_id, placements)
                .await
                .map_err(store_failure)?;
        }
        info!(%scope, removed_card_count, "column deleted");
        Ok(ColumnRemoval {
            column_id: column_id.to_string(),
            removed_card_count,
        })
    }

    // ── Maintenance ───────────────────────────────────────────────────

    /// Renumber every scope on the board from its current order. Writes only
    /// the records whose stored position drifted.
    pub async fn repair_board(&self, board_id: &str) -> Result<RepairReport, BoardError> {
        self.ensure_board(board_id).await?;
        let _guard = self.locks.acquire(board_id).await;

        let mut report = RepairReport::default();
        let columns = self.store.columns(board_id).await.map_err(store_failure)?;
        let column_placements = ledger::plan_column_repair(&columns);
        report.columns_repositioned = column_placements.len();
        if !column_placements.is_empty() {
            self.store
                .apply_column_placements(board_id, column_placements)
                .await
                .map_err(store_failure)?;
        }

        let mut by_column: HashMap<String, Vec<Card>> = HashMap::new();
        for card in self.store.cards(board_id).await.map_err(store_failure)? {
            by_column.entry(card.column_id.clone()).or_default().push(card);
        }
        for (column_id, scope) in by_column {
            let placements = ledger::plan_card_repair(&scope);
            if placements.is_empty() {
                continue;
            }
            warn!(board_id, column_id = %column_id, drifted = placements.len(), "repairing drifted positions");
            report.cards_repositioned += placements.len();
            self.store
                .apply_card_placements(board_id, placements)
                .await
                .map_err(store_failure)?;
        }

        info!(
            board_id,
            columns = report.columns_repositioned,
            cards = report.cards_repositioned,
            "board repaired"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::db::{BoardDb, DbHandle};
    use crate::board::ledger::{CardPlacement, ColumnPlacement, is_contiguous};
    use crate::errors::ErrorKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    async fn service_with(policy: ReorderPolicy, columns: &[&str]) -> (BoardService, DbHandle) {
        let handle = DbHandle::new(BoardDb::new_in_memory().unwrap());
        let service = BoardService::new(Arc::new(handle.clone()), policy);
        service
            .create_board(NewBoard {
                id: Some("b1".into()),
                title: "Sprint".into(),
            })
            .await
            .unwrap();
        for id in columns {
            service
                .create_column(
                    "b1",
                    NewColumn {
                        column_id: id.to_string(),
                        title: id.to_uppercase(),
                    },
                )
                .await
                .unwrap();
        }
        (service, handle)
    }

    async fn add(service: &BoardService, column: &str, task: &str) -> Card {
        service
            .create_card("b1", NewCard::new(column, task, task))
            .await
            .unwrap()
    }

    async fn layout(service: &BoardService, column: &str) -> Vec<(String, i32)> {
        service
            .get_board_contents("b1")
            .await
            .unwrap()
            .cards_in(column)
            .map(|c| (c.task_id.clone(), c.position))
            .collect()
    }

    fn expect(rows: &[(&str, i32)]) -> Vec<(String, i32)> {
        rows.iter().map(|(t, p)| (t.to_string(), *p)).collect()
    }

    #[tokio::test]
    async fn test_create_appends_at_count() {
        let (service, _) = service_with(ReorderPolicy::Swap, &["A"]).await;
        for (i, id) in ["a0", "a1", "a2"].iter().enumerate() {
            let card = add(&service, "A", id).await;
            assert_eq!(card.position, i as i32);
        }
    }

    #[tokio::test]
    async fn test_create_card_carries_description_and_label() {
        let (service, _) = service_with(ReorderPolicy::Swap, &["A"]).await;
        let mut req = NewCard::new("A", "t1", "Write docs");
        req.description = Some("for the sync client".into());
        req.label = Some("docs".into());
        let card = service.create_card("b1", req).await.unwrap();
        assert_eq!(card.description.as_deref(), Some("for the sync client"));
        assert_eq!(card.label.as_deref(), Some("docs"));
    }

    #[tokio::test]
    async fn test_create_card_rejections() {
        let (service, _) = service_with(ReorderPolicy::Swap, &["A"]).await;
        add(&service, "A", "a0").await;

        let dup = service.create_card("b1", NewCard::new("A", "a0", "again")).await;
        assert!(matches!(dup, Err(BoardError::IllegalArgument(_))));

        let missing = service.create_card("b1", NewCard::new("Z", "z0", "z")).await;
        assert!(matches!(missing, Err(BoardError::ColumnNotFound { .. })));

        let mut negative = NewCard::new("A", "a9", "neg");
        negative.position = Some(-3);
        let neg = service.create_card("b1", negative).await;
        assert!(matches!(neg, Err(BoardError::IllegalArgument(_))));

        let no_board = service.create_card("nope", NewCard::new("A", "x", "x")).await;
        assert!(matches!(no_board, Err(BoardError::BoardNotFound { .. })));
    }

    #[tokio::test]
    async fn test_explicit_position_is_trusted() {
        let (service, _) = service_with(ReorderPolicy::Swap, &["A"]).await;
        let mut req = NewCard::new("A", "a0", "a0");
        req.position = Some(4);
        let card = service.create_card("b1", req).await.unwrap();
        assert_eq!(card.position, 4);
    }

    #[tokio::test]
    async fn test_swap_scenario() {
        let (service, _) = service_with(ReorderPolicy::Swap, &["A"]).await;
        for id in ["a0", "a1", "a2"] {
            add(&service, "A", id).await;
        }
        let moved = service
            .move_card(
                "b1",
                "a0",
                CardMove {
                    column_id: "A".into(),
                    position: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.position, 2);
        assert_eq!(
            layout(&service, "A").await,
            expect(&[("a2", 0), ("a1", 1), ("a0", 2)])
        );
    }

    #[tokio::test]
    async fn test_shift_scenario() {
        let (service, _) = service_with(ReorderPolicy::Shift, &["A"]).await;
        for id in ["a0", "a1", "a2"] {
            add(&service, "A", id).await;
        }
        service
            .move_card(
                "b1",
                "a0",
                CardMove {
                    column_id: "A".into(),
                    position: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(
            layout(&service, "A").await,
            expect(&[("a1", 0), ("a2", 1), ("a0", 2)])
        );
    }

    #[tokio::test]
    async fn test_cross_column_scenario() {
        let (service, _) = service_with(ReorderPolicy::Swap, &["A", "B"]).await;
        add(&service, "A", "a0").await;
        add(&service, "A", "a1").await;
        add(&service, "B", "b0").await;

        let moved = service
            .move_card(
                "b1",
                "a1",
                CardMove {
                    column_id: "B".into(),
                    position: 0,
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.column_id, "B");
        assert_eq!(layout(&service, "A").await, expect(&[("a0", 0)]));
        assert_eq!(
            layout(&service, "B").await,
            expect(&[("a1", 0), ("b0", 1)])
        );
    }

    #[tokio::test]
    async fn test_move_to_same_slot_is_idempotent() {
        let (service, _) = service_with(ReorderPolicy::Swap, &["A"]).await;
        add(&service, "A", "a0").await;
        add(&service, "A", "a1").await;
        let before = layout(&service, "A").await;
        let card = service
            .move_card(
                "b1",
                "a1",
                CardMove {
                    column_id: "A".into(),
                    position: 1,
                },
            )
            .await
            .unwrap();
        assert_eq!(card.position, 1);
        assert_eq!(layout(&service, "A").await, before);
    }

    #[tokio::test]
    async fn test_move_errors() {
        let (service, _) = service_with(ReorderPolicy::Swap, &["A"]).await;
        add(&service, "A", "a0").await;

        let missing = service
            .move_card(
                "b1",
                "ghost",
                CardMove {
                    column_id: "A".into(),
                    position: 0,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let bad_column = service
            .move_card(
                "b1",
                "a0",
                CardMove {
                    column_id: "Z".into(),
                    position: 0,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(bad_column.kind(), ErrorKind::IllegalArgument);

        let negative = service
            .move_card(
                "b1",
                "a0",
                CardMove {
                    column_id: "A".into(),
                    position: -1,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(negative.kind(), ErrorKind::IllegalArgument);
    }

    #[tokio::test]
    async fn test_remove_compacts_scope() {
        let (service, _) = service_with(ReorderPolicy::Swap, &["A"]).await;
        for id in ["a0", "a1", "a2", "a3"] {
            add(&service, "A", id).await;
        }
        let removed = service.remove_card("b1", "a1").await.unwrap();
        assert_eq!(removed.task_id, "a1");
        assert_eq!(
            layout(&service, "A").await,
            expect(&[("a0", 0), ("a2", 1), ("a3", 2)])
        );
        // Creation after compaction appends at the new count.
        assert_eq!(add(&service, "A", "a4").await.position, 3);
    }

    #[tokio::test]
    async fn test_delete_card_reports_missing_as_false() {
        let (service, _) = service_with(ReorderPolicy::Swap, &["A"]).await;
        add(&service, "A", "a0").await;
        assert!(service.delete_card("b1", "a0").await.unwrap());
        assert!(!service.delete_card("b1", "a0").await.unwrap());
        assert!(service.delete_card("nope", "a0").await.is_err());
    }

    #[tokio::test]
    async fn test_edit_card_keeps_position() {
        let (service, _) = service_with(ReorderPolicy::Swap, &["A"]).await;
        add(&service, "A", "a0").await;
        add(&service, "A", "a1").await;
        let edited = service
            .edit_card(
                "b1",
                "a1",
                CardPatch {
                    title: Some("Test".into()),
                    description: Some("body".into()),
                    label: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.title, "Test");
        assert_eq!(edited.description.as_deref(), Some("body"));
        assert_eq!(edited.position, 1);

        let missing = service
            .edit_card("b1", "ghost", CardPatch::title("x"))
            .await
            .unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_column_lifecycle() {
        let (service, _) = service_with(ReorderPolicy::Swap, &["todo", "doing", "done"]).await;
        add(&service, "todo", "t0").await;
        add(&service, "todo", "t1").await;
        add(&service, "done", "d0").await;

        let renamed = service
            .edit_column(
                "b1",
                "doing",
                ColumnPatch {
                    title: "In progress".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.title, "In progress");
        assert_eq!(renamed.position, 1);

        let order = service
            .move_column("b1", "done", ColumnMove { position: 0 })
            .await
            .unwrap();
        let ids: Vec<_> = order.iter().map(|c| c.column_id.as_str()).collect();
        assert_eq!(ids, vec!["done", "todo", "doing"]);

        let removal = service.delete_column("b1", "todo").await.unwrap();
        assert_eq!(removal.removed_card_count, 2);

        let contents = service.get_board_contents("b1").await.unwrap();
        let columns: Vec<_> = contents
            .columns
            .iter()
            .map(|c| (c.column_id.as_str(), c.position))
            .collect();
        assert_eq!(columns, vec![("done", 0), ("doing", 1)]);
        assert_eq!(contents.cards.len(), 1);

        let dup = service
            .create_column(
                "b1",
                NewColumn {
                    column_id: "done".into(),
                    title: "again".into(),
                },
            )
            .await;
        assert!(matches!(dup, Err(BoardError::IllegalArgument(_))));

        let missing = service.delete_column("b1", "todo").await.unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_contents_sorted_by_column_order() {
        let (service, _) = service_with(ReorderPolicy::Swap, &["todo", "done"]).await;
        add(&service, "done", "d0").await;
        add(&service, "todo", "t0").await;
        add(&service, "todo", "t1").await;
        service
            .move_column("b1", "done", ColumnMove { position: 0 })
            .await
            .unwrap();
        let contents = service.get_board_contents("b1").await.unwrap();
        let ids: Vec<_> = contents.cards.iter().map(|c| c.task_id.as_str()).collect();
        assert_eq!(ids, vec!["d0", "t0", "t1"]);
    }

    #[tokio::test]
    async fn test_repair_heals_drift() {
        let (service, handle) = service_with(ReorderPolicy::Swap, &["A"]).await;
        for id in ["a0", "a1", "a2"] {
            add(&service, "A", id).await;
        }
        handle
            .apply_card_placements(
                "b1",
                vec![CardPlacement {
                    task_id: "a2".into(),
                    column_id: "A".into(),
                    position: 7,
                }],
            )
            .await
            .unwrap();
        handle
            .apply_column_placements(
                "b1",
                vec![ColumnPlacement {
                    column_id: "A".into(),
                    position: 3,
                }],
            )
            .await
            .unwrap();

        let report = service.repair_board("b1").await.unwrap();
        assert_eq!(report.cards_repositioned, 1);
        assert_eq!(report.columns_repositioned, 1);
        assert_eq!(
            layout(&service, "A").await,
            expect(&[("a0", 0), ("a1", 1), ("a2", 2)])
        );
        assert!(service.repair_board("b1").await.unwrap().is_clean());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_moves_keep_scopes_contiguous() {
        let (service, _) = service_with(ReorderPolicy::Shift, &["A", "B"]).await;
        let service = Arc::new(service);
        for i in 0..6 {
            add(&service, "A", &format!("a{}", i)).await;
            add(&service, "B", &format!("b{}", i)).await;
        }

        let mut handles = Vec::new();
        for i in 0..24 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                let task = if i % 2 == 0 {
                    format!("a{}", i % 6)
                } else {
                    format!("b{}", i % 6)
                };
                let column = if i % 3 == 0 { "B" } else { "A" };
                service
                    .move_card(
                        "b1",
                        &task,
                        CardMove {
                            column_id: column.into(),
                            position: (i % 5) as i32,
                        },
                    )
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let contents = service.get_board_contents("b1").await.unwrap();
        assert_eq!(contents.cards.len(), 12);
        for column in ["A", "B"] {
            assert!(is_contiguous(contents.cards_in(column).map(|c| c.position)));
        }
    }

    /// Store wrapper whose writes can be switched to fail.
    struct FlakyStore {
        inner: DbHandle,
        fail_writes: AtomicBool,
    }

    impl FlakyStore {
        fn check(&self) -> anyhow::Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                anyhow::bail!("database is locked");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl BoardStore for FlakyStore {
        async fn board_exists(&self, board_id: &str) -> anyhow::Result<bool> {
            self.inner.board_exists(board_id).await
        }
        async fn create_board(&self, board_id: &str, title: &str) -> anyhow::Result<Board> {
            self.inner.create_board(board_id, title).await
        }
        async fn list_boards(&self) -> anyhow::Result<Vec<Board>> {
            self.inner.list_boards().await
        }
        async fn columns(&self, board_id: &str) -> anyhow::Result<Vec<Column>> {
            self.inner.columns(board_id).await
        }
        async fn find_column(
            &self,
            board_id: &str,
            column_id: &str,
        ) -> anyhow::Result<Option<Column>> {
            self.inner.find_column(board_id, column_id).await
        }
        async fn upsert_column(&self, column: Column) -> anyhow::Result<Column> {
            self.check()?;
            self.inner.upsert_column(column).await
        }
        async fn delete_column(&self, board_id: &str, column_id: &str) -> anyhow::Result<bool> {
            self.check()?;
            self.inner.delete_column(board_id, column_id).await
        }
        async fn apply_column_placements(
            &self,
            board_id: &str,
            placements: Vec<ColumnPlacement>,
        ) -> anyhow::Result<()> {
            self.check()?;
            self.inner.apply_column_placements(board_id, placements).await
        }
        async fn cards(&self, board_id: &str) -> anyhow::Result<Vec<Card>> {
            self.inner.cards(board_id).await
        }
        async fn cards_in_scope(&self, scope: &Scope) -> anyhow::Result<Vec<Card>> {
            self.inner.cards_in_scope(scope).await
        }
        async fn find_card(&self, board_id: &str, task_id: &str) -> anyhow::Result<Option<Card>> {
            self.inner.find_card(board_id, task_id).await
        }
        async fn upsert_card(&self, card: Card) -> anyhow::Result<Card> {
            self.check()?;
            self.inner.upsert_card(card).await
        }
        async fn delete_card(&self, board_id: &str, task_id: &str) -> anyhow::Result<bool> {
            self.check()?;
            self.inner.delete_card(board_id, task_id).await
        }
        async fn delete_cards_in_scope(&self, scope: &Scope) -> anyhow::Result<u64> {
            self.check()?;
            self.inner.delete_cards_in_scope(scope).await
        }
        async fn apply_card_placements(
            &self,
            board_id: &str,
            placements: Vec<CardPlacement>,
        ) -> anyhow::Result<()> {
            self.check()?;
            self.inner.apply_card_placements(board_id, placements).await
        }
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_transient() {
        let (seed, handle) = service_with(ReorderPolicy::Swap, &["A"]).await;
        add(&seed, "A", "a0").await;
        add(&seed, "A", "a1").await;

        let flaky = Arc::new(FlakyStore {
            inner: handle,
            fail_writes: AtomicBool::new(true),
        });
        let service = BoardService::new(flaky.clone(), ReorderPolicy::Swap);
        let err = service
            .move_card(
                "b1",
                "a0",
                CardMove {
                    column_id: "A".into(),
                    position: 1,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransientStoreFailure);

        // Nothing was written, and the next attempt succeeds.
        assert_eq!(layout(&service, "A").await, expect(&[("a0", 0), ("a1", 1)]));
        flaky.fail_writes.store(false, Ordering::SeqCst);
        service
            .move_card(
                "b1",
                "a0",
                CardMove {
                    column_id: "A".into(),
                    position: 1,
                },
            )
            .await
            .unwrap();
        assert_eq!(layout(&service, "A").await, expect(&[("a1", 0), ("a0", 1)]));
    }
}
