//! Turns pointer gestures into reorder intents.
//!
//! The interpreter never talks to the network. It tracks what is being
//! dragged and what it hovers, and on drop resolves the target into a
//! destination `(column, index)` against the current [`ClientBoard`].

use serde::{Deserialize, Serialize};

use super::state::ClientBoard;
use crate::errors::ClientError;

/// The entity under the pointer when a drag starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DragSubject {
    Card { task_id: String },
    Column { column_id: String },
}

/// Where a drag is hovering or was released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DropTarget {
    Card { task_id: String },
    Column { column_id: String },
    Nowhere,
}

/// Column and index the subject occupied when the drag started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragOrigin {
    pub column_id: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        subject: DragSubject,
        origin: DragOrigin,
        hovering: DropTarget,
    },
}

/// A resolved drop, ready to apply locally and send to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderIntent {
    MoveCard {
        task_id: String,
        column_id: String,
        position: i32,
    },
    MoveColumn {
        column_id: String,
        position: i32,
    },
}

#[derive(Debug, Default)]
pub struct DragInterpreter {
    state: DragState,
}

fn slot(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

impl DragInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    pub fn subject(&self) -> Option<&DragSubject> {
        match &self.state {
            DragState::Dragging { subject, .. } => Some(subject),
            DragState::Idle => None,
        }
    }

    pub fn hovering(&self) -> Option<&DropTarget> {
        match &self.state {
            DragState::Dragging { hovering, .. } => Some(hovering),
            DragState::Idle => None,
        }
    }

    /// Begin dragging. A drag already in progress is replaced.
    pub fn start(&mut self, subject: DragSubject, board: &ClientBoard) -> Result<(), ClientError> {
        let origin = match &subject {
            DragSubject::Card { task_id } => {
                let card = board
                    .card(task_id)
                    .ok_or_else(|| ClientError::UnknownCard(task_id.clone()))?;
                DragOrigin {
                    column_id: card.column_id.clone(),
                    index: board.card_index(task_id).unwrap_or_default(),
                }
            }
            DragSubject::Column { column_id } => DragOrigin {
                column_id: column_id.clone(),
                index: board
                    .column_index(column_id)
                    .ok_or_else(|| ClientError::UnknownColumn(column_id.clone()))?,
            },
        };
        self.state = DragState::Dragging {
            subject,
            origin,
            hovering: DropTarget::Nowhere,
        };
        Ok(())
    }

    /// Record the hovered target. Ignored when idle.
    pub fn hover(&mut self, target: DropTarget) {
        if let DragState::Dragging { hovering, .. } = &mut self.state {
            *hovering = target;
        }
    }

    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }

    /// Finish the drag on `target` and return the move it implies, if any.
    /// The interpreter is idle afterwards regardless of the outcome.
    pub fn finish(&mut self, target: DropTarget, board: &ClientBoard) -> Option<ReorderIntent> {
        let DragState::Dragging { subject, origin, .. } = std::mem::take(&mut self.state) else {
            return None;
        };
        match subject {
            DragSubject::Card { task_id } => resolve_card_drop(&task_id, &origin, &target, board),
            DragSubject::Column { column_id } => {
                resolve_column_drop(&column_id, &origin, &target, board)
            }
        }
    }
}

fn resolve_card_drop(
    task_id: &str,
    origin: &DragOrigin,
    target: &DropTarget,
    board: &ClientBoard,
) -> Option<ReorderIntent> {
    let card = board.card(task_id)?;
    let (column_id, index) = match target {
        DropTarget::Nowhere => return None,
        DropTarget::Card { task_id: over } => {
            if over == task_id {
                return None;
            }
            let over_card = board.card(over)?;
            (over_card.column_id.clone(), board.card_index(over)?)
        }
        DropTarget::Column { column_id } => {
            board.column(column_id)?;
            let count = board.cards_in(column_id).len();
            if *column_id == card.column_id {
                (column_id.clone(), count.saturating_sub(1))
            } else {
                (column_id.clone(), count)
            }
        }
    };
    let current = board.card_index(task_id).unwrap_or(origin.index);
    if column_id == card.column_id && index == current {
        return None;
    }
    Some(ReorderIntent::MoveCard {
        task_id: task_id.to_string(),
        column_id,
        position: slot(index),
    })
}

fn resolve_column_drop(
    column_id: &str,
    origin: &DragOrigin,
    target: &DropTarget,
    board: &ClientBoard,
) -> Option<ReorderIntent> {
    let over_column = match target {
        DropTarget::Nowhere => return None,
        DropTarget::Column { column_id } => column_id.clone(),
        DropTarget::Card { task_id } => board.card(task_id)?.column_id.clone(),
    };
    let index = board.column_index(&over_column)?;
    let current = board.column_index(column_id).unwrap_or(origin.index);
    if index == current {
        return None;
    }
    Some(ReorderIntent::MoveColumn {
        column_id: column_id.to_string(),
        position: slot(index),
    })
}
