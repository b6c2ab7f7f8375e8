//! Client side of the board: local mirror, drag interpretation, and sync.
//!
//! ```text
//! pointer events ──> gesture.rs (DragInterpreter) ──> ReorderIntent
//!                                                        │
//! keystrokes ─────────────────────┐                      v
//!                                 v             sync.rs (SyncController)
//!                          debounce per card ──>   │   optimistic apply on
//!                                                  │   state.rs (ClientBoard)
//!                                                  v
//!                                   transport.rs (BoardApi: HTTP | in-process)
//! ```

pub mod gesture;
pub mod state;
pub mod sync;
pub mod transport;

pub use gesture::{DragInterpreter, DragSubject, DropTarget, ReorderIntent};
pub use state::ClientBoard;
pub use sync::{RefreshOutcome, SyncController, SyncSettings};
pub use transport::{BoardApi, HttpBoardApi, ServiceBoardApi};
