//! In-memory mirror of one board, as the UI renders it.
//!
//! Mutations here are optimistic: they run before the server confirms and
//! are simply overwritten by the next [`ClientBoard::replace`]. Moves go
//! through the same ledger planner the server uses, so a confirmed move
//! looks identical after the next poll.

use std::collections::HashMap;

use taskboard_common::{BoardContents, Card, CardPatch, Column, NewCard, NewColumn, ReorderPolicy};

use crate::board::ledger;
use crate::errors::{BoardError, ClientError};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientBoard {
    board_id: String,
    columns: Vec<Column>,
    cards: Vec<Card>,
}

impl ClientBoard {
    pub fn new(board_id: &str) -> Self {
        Self {
            board_id: board_id.to_string(),
            ..Self::default()
        }
    }

    pub fn from_contents(contents: BoardContents) -> Self {
        let mut board = Self::default();
        board.replace(contents);
        board
    }

    /// Throw away local state and adopt a server snapshot.
    pub fn replace(&mut self, contents: BoardContents) {
        self.board_id = contents.board_id;
        self.columns = contents.columns;
        self.cards = contents.cards;
        self.resort();
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    /// Columns in display order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// All cards in display order: by column, then position.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn cards_in(&self, column_id: &str) -> Vec<&Card> {
        self.cards
            .iter()
            .filter(|c| c.column_id == column_id)
            .collect()
    }

    pub fn card(&self, task_id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.task_id == task_id)
    }

    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.column_id == column_id)
    }

    pub fn column_index(&self, column_id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.column_id == column_id)
    }

    /// Index of a card within its column's display order.
    pub fn card_index(&self, task_id: &str) -> Option<usize> {
        let card = self.card(task_id)?;
        self.cards_in(&card.column_id)
            .iter()
            .position(|c| c.task_id == task_id)
    }

    pub fn to_contents(&self) -> BoardContents {
        BoardContents {
            board_id: self.board_id.clone(),
            columns: self.columns.clone(),
            cards: self.cards.clone(),
        }
    }

    fn resort(&mut self) {
        self.columns.sort_by_key(|c| c.position);
        let rank: HashMap<&str, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.column_id.as_str(), i))
            .collect();
        let mut cards = std::mem::take(&mut self.cards);
        cards.sort_by_key(|c| {
            (
                rank.get(c.column_id.as_str()).copied().unwrap_or(usize::MAX),
                c.position,
            )
        });
        self.cards = cards;
    }

    fn require_card(&self, task_id: &str) -> Result<&Card, ClientError> {
        self.card(task_id)
            .ok_or_else(|| ClientError::UnknownCard(task_id.to_string()))
    }

    fn require_column(&self, column_id: &str) -> Result<&Column, ClientError> {
        self.column(column_id)
            .ok_or_else(|| ClientError::UnknownColumn(column_id.to_string()))
    }

    fn scope_snapshot(&self, column_id: &str) -> Vec<Card> {
        self.cards_in(column_id).into_iter().cloned().collect()
    }

    // ── Optimistic mutations ──────────────────────────────────────────

    /// Move a card locally with the same plan the server will compute.
    pub fn apply_card_move(
        &mut self,
        task_id: &str,
        column_id: &str,
        position: i32,
        policy: ReorderPolicy,
    ) -> Result<Card, ClientError> {
        let card = self.require_card(task_id)?.clone();
        self.require_column(column_id)?;
        let source = self.scope_snapshot(&card.column_id);
        let destination = if card.column_id == column_id {
            Vec::new()
        } else {
            self.scope_snapshot(column_id)
        };
        let plan =
            ledger::plan_card_move(&card, &source, &destination, column_id, position, policy)?;
        ledger::apply_card_placements(&mut self.cards, &plan.placements);
        self.resort();
        Ok(plan.card)
    }

    pub fn apply_column_move(&mut self, column_id: &str, position: i32) -> Result<(), ClientError> {
        self.require_column(column_id)?;
        let placements = ledger::plan_column_move(&self.columns, column_id, position)?;
        ledger::apply_column_placements(&mut self.columns, &placements);
        self.resort();
        Ok(())
    }

    pub fn apply_card_patch(&mut self, task_id: &str, patch: &CardPatch) -> Result<(), ClientError> {
        let card = self
            .cards
            .iter_mut()
            .find(|c| c.task_id == task_id)
            .ok_or_else(|| ClientError::UnknownCard(task_id.to_string()))?;
        patch.apply_to(card);
        Ok(())
    }

    pub fn append_card(&mut self, req: &NewCard) -> Result<Card, ClientError> {
        self.require_column(&req.column_id)?;
        if self.card(&req.task_id).is_some() {
            return Err(BoardError::IllegalArgument(format!(
                "card {} already exists",
                req.task_id
            ))
            .into());
        }
        let position = match req.position {
            Some(position) => position,
            None => i32::try_from(self.cards_in(&req.column_id).len()).unwrap_or(i32::MAX),
        };
        let mut card = Card {
            board_id: self.board_id.clone(),
            task_id: req.task_id.clone(),
            column_id: req.column_id.clone(),
            title: req.title.clone(),
            description: None,
            label: None,
            position,
        };
        CardPatch {
            title: None,
            description: req.description.clone(),
            label: req.label.clone(),
        }
        .apply_to(&mut card);
        self.cards.push(card.clone());
        self.resort();
        Ok(card)
    }

    /// Remove a card and close the gap it leaves.
    pub fn remove_card(&mut self, task_id: &str) -> Result<Card, ClientError> {
        let card = self.require_card(task_id)?.clone();
        let placements = ledger::plan_card_compaction(&self.scope_snapshot(&card.column_id), task_id);
        self.cards.retain(|c| c.task_id != task_id);
        ledger::apply_card_placements(&mut self.cards, &placements);
        self.resort();
        Ok(card)
    }

    pub fn append_column(&mut self, req: &NewColumn) -> Result<Column, ClientError> {
        if self.column(&req.column_id).is_some() {
            return Err(BoardError::IllegalArgument(format!(
                "column {} already exists",
                req.column_id
            ))
            .into());
        }
        let column = Column {
            board_id: self.board_id.clone(),
            column_id: req.column_id.clone(),
            title: req.title.clone(),
            position: i32::try_from(self.columns.len()).unwrap_or(i32::MAX),
        };
        self.columns.push(column.clone());
        Ok(column)
    }

    pub fn rename_column(&mut self, column_id: &str, title: &str) -> Result<(), ClientError> {
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.column_id == column_id)
            .ok_or_else(|| ClientError::UnknownColumn(column_id.to_string()))?;
        column.title = title.to_string();
        Ok(())
    }

    /// Remove a column and its cards. Returns the ids of the removed cards.
    pub fn remove_column(&mut self, column_id: &str) -> Result<Vec<String>, ClientError> {
        self.require_column(column_id)?;
        let removed: Vec<String> = self
            .cards_in(column_id)
            .into_iter()
            .map(|c| c.task_id.clone())
            .collect();
        self.cards.retain(|c| c.column_id != column_id);
        let placements = ledger::plan_column_compaction(&self.columns, column_id);
        self.columns.retain(|c| c.column_id != column_id);
        ledger::apply_column_placements(&mut self.columns, &placements);
        self.resort();
        Ok(removed)
    }
}
