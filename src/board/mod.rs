//! Board server: ordered columns and cards behind a REST API.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │  (sync)  │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘   JSON   │         │                                        │
//!                       │         │ BoardService::move_card() ...          │
//!                       │         v                                        │
//!                       │  service.rs  (per-board write locks)             │
//!                       │         │                                        │
//!                       │         │ ledger::plan_card_move() → placements  │
//!                       │         v                                        │
//!                       │  store.rs    (BoardStore trait)                  │
//!                       │         │                                        │
//!                       │         v                                        │
//!                       │  db.rs       (SQLite via DbHandle)               │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Typical Request Flow (drag a card into another column)
//!
//! 1. `PUT /api/boards/{board_id}/cards/{task_id}` → `api::move_card()`
//! 2. `BoardService::move_card` checks the board, takes the board's write
//!    lock, and loads the source and destination scopes.
//! 3. `ledger::plan_card_move` renumbers both scopes from snapshot order and
//!    returns only the placements that changed.
//! 4. The store writes the batch in one transaction and the handler returns
//!    the moved card. Other clients see the change on their next poll.

pub mod api;
pub mod db;
pub mod ledger;
pub mod server;
pub mod service;
pub mod store;
