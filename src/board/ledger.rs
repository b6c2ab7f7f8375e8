//! Position ledger: pure reorder and compaction planning.
//!
//! Every function here takes a snapshot of one or two scopes and returns the
//! placements that must be written to leave each scope numbered exactly
//! `0..n`. Nothing in this module touches storage. Positions are always
//! recomputed from snapshot order, so a scope whose stored values drifted is
//! healed by the next plan that covers it.
//!
//! Only changed records are emitted; a plan with no placements is a no-op.

use taskboard_common::{Card, Column, ReorderPolicy};

use crate::errors::BoardError;

/// Anything that carries an ordering position and a stable key.
pub trait Ordered {
    fn key(&self) -> &str;
    fn position(&self) -> i32;
}

impl Ordered for Card {
    fn key(&self) -> &str {
        &self.task_id
    }

    fn position(&self) -> i32 {
        self.position
    }
}

impl Ordered for Column {
    fn key(&self) -> &str {
        &self.column_id
    }

    fn position(&self) -> i32 {
        self.position
    }
}

/// New column and position for one card. Column and position are always
/// written together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardPlacement {
    pub task_id: String,
    pub column_id: String,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlacement {
    pub column_id: String,
    pub position: i32,
}

/// Result of planning a single card move.
#[derive(Debug, Clone)]
pub struct MovePlan {
    /// The moving card as it will look once the placements are applied.
    pub card: Card,
    pub placements: Vec<CardPlacement>,
}

impl MovePlan {
    pub fn is_noop(&self) -> bool {
        self.placements.is_empty()
    }
}

/// Snapshot order: by stored position, ties kept in input order.
pub fn in_order<T: Ordered>(items: &[T]) -> Vec<&T> {
    let mut ordered: Vec<&T> = items.iter().collect();
    ordered.sort_by_key(|item| item.position());
    ordered
}

/// True when the positions are exactly `{0, 1, ..., n-1}`.
pub fn is_contiguous<I: IntoIterator<Item = i32>>(positions: I) -> bool {
    let mut positions: Vec<i32> = positions.into_iter().collect();
    positions.sort_unstable();
    positions
        .iter()
        .enumerate()
        .all(|(i, p)| usize::try_from(*p).is_ok_and(|p| p == i))
}

fn check_position(position: i32) -> Result<usize, BoardError> {
    usize::try_from(position).map_err(|_| {
        BoardError::IllegalArgument(format!("position must be non-negative, got {}", position))
    })
}

fn slot(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

fn renumber_cards(ordered: &[&Card], column_id: &str, out: &mut Vec<CardPlacement>) {
    for (index, card) in ordered.iter().enumerate() {
        let position = slot(index);
        if card.position != position || card.column_id != column_id {
            out.push(CardPlacement {
                task_id: card.task_id.clone(),
                column_id: column_id.to_string(),
                position,
            });
        }
    }
}

fn renumber_columns(ordered: &[&Column]) -> Vec<ColumnPlacement> {
    ordered
        .iter()
        .enumerate()
        .filter(|(index, column)| column.position != slot(*index))
        .map(|(index, column)| ColumnPlacement {
            column_id: column.column_id.clone(),
            position: slot(index),
        })
        .collect()
}

/// Plan moving `card` to `to_position` in `to_column`.
///
/// `source` is the snapshot of the card's current scope (it must contain the
/// card). `destination` is the snapshot of the destination scope and is
/// ignored for same-column moves. Destinations past the end are clamped.
pub fn plan_card_move(
    card: &Card,
    source: &[Card],
    destination: &[Card],
    to_column: &str,
    to_position: i32,
    policy: ReorderPolicy,
) -> Result<MovePlan, BoardError> {
    let target = check_position(to_position)?;

    let mut src = in_order(source);
    let from = src
        .iter()
        .position(|c| c.task_id == card.task_id)
        .ok_or_else(|| BoardError::card_not_found(&card.board_id, &card.task_id))?;

    let mut placements = Vec::new();
    let mut moved = card.clone();

    if card.column_id == to_column {
        let to = target.min(src.len() - 1);
        if to == from {
            return Ok(MovePlan {
                card: moved,
                placements,
            });
        }
        match policy {
            ReorderPolicy::Swap => src.swap(from, to),
            ReorderPolicy::Shift => {
                let item = src.remove(from);
                src.insert(to, item);
            }
        }
        renumber_cards(&src, to_column, &mut placements);
        moved.position = slot(to);
    } else {
        let item = src.remove(from);
        renumber_cards(&src, &card.column_id, &mut placements);

        let mut dst: Vec<&Card> = in_order(destination)
            .into_iter()
            .filter(|c| c.task_id != card.task_id)
            .collect();
        let to = target.min(dst.len());
        dst.insert(to, item);
        renumber_cards(&dst, to_column, &mut placements);

        moved.column_id = to_column.to_string();
        moved.position = slot(to);
    }

    Ok(MovePlan {
        card: moved,
        placements,
    })
}

/// Plan closing the gap left by removing `removed_task_id` from `scope`.
pub fn plan_card_compaction(scope: &[Card], removed_task_id: &str) -> Vec<CardPlacement> {
    let remaining: Vec<&Card> = in_order(scope)
        .into_iter()
        .filter(|c| c.task_id != removed_task_id)
        .collect();
    renumber_scope(&remaining)
}

/// Plan renumbering a scope that may have drifted.
pub fn plan_card_repair(scope: &[Card]) -> Vec<CardPlacement> {
    renumber_scope(&in_order(scope))
}

fn renumber_scope(ordered: &[&Card]) -> Vec<CardPlacement> {
    let mut placements = Vec::new();
    if let Some(first) = ordered.first() {
        let column_id = first.column_id.clone();
        renumber_cards(ordered, &column_id, &mut placements);
    }
    placements
}

/// Plan moving a column to `to_position` among the board's columns. Columns
/// always shift; a swap would scramble the board for a single drag.
pub fn plan_column_move(
    columns: &[Column],
    column_id: &str,
    to_position: i32,
) -> Result<Vec<ColumnPlacement>, BoardError> {
    let target = check_position(to_position)?;
    let mut ordered = in_order(columns);
    let from = ordered
        .iter()
        .position(|c| c.column_id == column_id)
        .ok_or_else(|| {
            let board_id = columns.first().map(|c| c.board_id.as_str()).unwrap_or("");
            BoardError::column_not_found(board_id, column_id)
        })?;
    let to = target.min(ordered.len() - 1);
    if to == from {
        return Ok(Vec::new());
    }
    let item = ordered.remove(from);
    ordered.insert(to, item);
    Ok(renumber_columns(&ordered))
}

/// Plan closing the gap left by removing a column from the board.
pub fn plan_column_compaction(columns: &[Column], removed_column_id: &str) -> Vec<ColumnPlacement> {
    let remaining: Vec<&Column> = in_order(columns)
        .into_iter()
        .filter(|c| c.column_id != removed_column_id)
        .collect();
    renumber_columns(&remaining)
}

pub fn plan_column_repair(columns: &[Column]) -> Vec<ColumnPlacement> {
    renumber_columns(&in_order(columns))
}

/// Apply card placements to an in-memory copy of the cards.
pub fn apply_card_placements(cards: &mut [Card], placements: &[CardPlacement]) {
    for placement in placements {
        if let Some(card) = cards.iter_mut().find(|c| c.task_id == placement.task_id) {
            card.column_id = placement.column_id.clone();
            card.position = placement.position;
        }
    }
}

pub fn apply_column_placements(columns: &mut [Column], placements: &[ColumnPlacement]) {
    for placement in placements {
        if let Some(column) = columns
            .iter_mut()
            .find(|c| c.column_id == placement.column_id)
        {
            column.position = placement.position;
        }
    }
}
