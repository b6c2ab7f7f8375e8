//! Shared domain types for the taskboard server and its sync client.
//!
//! Everything here is plain serde data. Ordering logic lives in the
//! `taskboard` crate; these types only carry `position` values around.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub id: String,
    pub title: String,
    pub created_at: String,
}

/// A list on a board. `position` orders columns within the board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    pub board_id: String,
    pub column_id: String,
    pub title: String,
    pub position: i32,
}

/// A task card. `position` orders cards within `(board_id, column_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub board_id: String,
    pub task_id: String,
    pub column_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    pub position: i32,
}

impl Card {
    pub fn scope(&self) -> Scope {
        Scope::new(&self.board_id, &self.column_id)
    }
}

/// The `(board, column)` pair that card positions are counted within.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub board_id: String,
    pub column_id: String,
}

impl Scope {
    pub fn new(board_id: &str, column_id: &str) -> Self {
        Self {
            board_id: board_id.to_string(),
            column_id: column_id.to_string(),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.board_id, self.column_id)
    }
}

/// Full board snapshot: columns by position, cards by (column, position).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BoardContents {
    pub board_id: String,
    pub columns: Vec<Column>,
    pub cards: Vec<Card>,
}

impl BoardContents {
    /// Cards of one column in render order.
    pub fn cards_in<'a>(&'a self, column_id: &'a str) -> impl Iterator<Item = &'a Card> + 'a {
        self.cards.iter().filter(move |c| c.column_id == column_id)
    }
}

// ── Request payloads ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBoard {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewCard {
    pub column_id: String,
    pub task_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    /// Explicit slot. Omit to append.
    #[serde(default)]
    pub position: Option<i32>,
}

impl NewCard {
    pub fn new(column_id: &str, task_id: &str, title: &str) -> Self {
        Self {
            column_id: column_id.to_string(),
            task_id: task_id.to_string(),
            title: title.to_string(),
            description: None,
            label: None,
            position: None,
        }
    }
}

/// Content edit. Absent fields are left unchanged; an empty string clears
/// `description` or `label`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl CardPatch {
    pub fn title(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.label.is_none()
    }

    /// Combine with a later edit; fields set in `later` win.
    pub fn merged(self, later: CardPatch) -> CardPatch {
        CardPatch {
            title: later.title.or(self.title),
            description: later.description.or(self.description),
            label: later.label.or(self.label),
        }
    }

    pub fn apply_to(&self, card: &mut Card) {
        if let Some(title) = &self.title {
            card.title = title.clone();
        }
        if let Some(description) = &self.description {
            card.description = non_empty(description);
        }
        if let Some(label) = &self.label {
            card.label = non_empty(label);
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardMove {
    pub column_id: String,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewColumn {
    pub column_id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnPatch {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnMove {
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnRemoval {
    pub column_id: String,
    pub removed_card_count: u64,
}

// ── Reorder policy ────────────────────────────────────────────────────

/// How a same-column move rearranges the cards it passes over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderPolicy {
    /// The card at the destination trades places with the moving card.
    #[default]
    Swap,
    /// The moving card is reinserted and the cards in between shift by one.
    Shift,
}

impl ReorderPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Swap => "swap",
            Self::Shift => "shift",
        }
    }
}

impl std::fmt::Display for ReorderPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReorderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "swap" => Ok(Self::Swap),
            "shift" => Ok(Self::Shift),
            _ => Err(format!(
                "Invalid reorder policy '{}'. Valid values: swap, shift",
                s
            )),
        }
    }
}
