//! Keeps a [`ClientBoard`] in step with the server.
//!
//! Three kinds of traffic flow through the controller:
//! - **Polls** replace local state on a fixed interval, unless a drag or a
//!   structural request is in progress.
//! - **Content edits** update local state at once and reach the server as a
//!   single merged write per card after a quiet period.
//! - **Structural mutations** (moves, creates, deletes, column renames) go
//!   out immediately and then invalidate the snapshot so the poll loop
//!   fetches a fresh one.
//!
//! Any failed write forces a full refetch. Local mutations are never undone
//! step by step.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use taskboard_common::{
    BoardContents, Card, CardMove, CardPatch, Column, ColumnMove, ColumnPatch, ColumnRemoval,
    NewCard, NewColumn, ReorderPolicy,
};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::gesture::{DragInterpreter, DragSubject, DropTarget, ReorderIntent};
use super::state::ClientBoard;
use super::transport::BoardApi;
use crate::errors::ClientError;

/// Timing knobs for the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub poll_interval: Duration,
    pub edit_debounce: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            edit_debounce: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// A drag or a structural request was active; local state was kept.
    Deferred,
}

struct PendingEdit {
    patch: CardPatch,
    /// Identifies the timer that owns this entry.
    generation: u64,
    timer: JoinHandle<()>,
}

/// Counts a request as in flight for as long as it lives.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SyncController<A: BoardApi + 'static> {
    api: Arc<A>,
    policy: ReorderPolicy,
    settings: SyncSettings,
    board: Mutex<ClientBoard>,
    drag: Mutex<DragInterpreter>,
    pending: Mutex<HashMap<String, PendingEdit>>,
    edit_generation: AtomicU64,
    /// One outstanding edit write per card.
    edit_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    in_flight: AtomicUsize,
    drag_epoch: AtomicU64,
    invalidated: Notify,
}

impl<A: BoardApi + 'static> SyncController<A> {
    /// `policy` must match the server's so optimistic moves land where the
    /// server will put them.
    pub fn new(api: Arc<A>, board_id: &str, policy: ReorderPolicy, settings: SyncSettings) -> Self {
        Self {
            api,
            policy,
            settings,
            board: Mutex::new(ClientBoard::new(board_id)),
            drag: Mutex::new(DragInterpreter::new()),
            pending: Mutex::new(HashMap::new()),
            edit_generation: AtomicU64::new(0),
            edit_locks: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            drag_epoch: AtomicU64::new(0),
            invalidated: Notify::new(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings
    }

    /// A copy of the current local board.
    pub fn snapshot(&self) -> ClientBoard {
        locked(&self.board).clone()
    }

    pub fn is_dragging(&self) -> bool {
        locked(&self.drag).is_dragging()
    }

    pub fn pending_edit_count(&self) -> usize {
        locked(&self.pending).len()
    }

    fn is_busy(&self) -> bool {
        self.is_dragging() || self.in_flight.load(Ordering::SeqCst) > 0
    }

    // ── Polling ───────────────────────────────────────────────────────

    /// Fetch the board and adopt it unless the user is mid-gesture.
    pub async fn refresh(&self) -> Result<RefreshOutcome, ClientError> {
        if self.is_busy() {
            debug!("refresh deferred");
            return Ok(RefreshOutcome::Deferred);
        }
        let epoch = self.drag_epoch.load(Ordering::SeqCst);
        let contents = self.api.get_board_contents().await?;
        if self.is_busy() || self.drag_epoch.load(Ordering::SeqCst) != epoch {
            debug!("discarding snapshot fetched across a drag");
            return Ok(RefreshOutcome::Deferred);
        }
        self.adopt(contents);
        Ok(RefreshOutcome::Applied)
    }

    fn adopt(&self, contents: BoardContents) {
        let patches: Vec<(String, CardPatch)> = locked(&self.pending)
            .iter()
            .map(|(task_id, edit)| (task_id.clone(), edit.patch.clone()))
            .collect();
        let mut board = locked(&self.board);
        board.replace(contents);
        for (task_id, patch) in patches {
            // The card may have been deleted elsewhere; its timer will fail
            // and refetch.
            let _ = board.apply_card_patch(&task_id, &patch);
        }
    }

    /// Refetch after a failure. Only an active drag holds this off; the
    /// failed request's own in-flight marker does not.
    async fn resync(&self) {
        match self.api.get_board_contents().await {
            Ok(contents) if !self.is_dragging() => {
                self.adopt(contents);
                debug!("board resynchronized");
            }
            Ok(_) => self.invalidate(),
            Err(e) => warn!(error = %e, "refetch after failure also failed"),
        }
    }

    /// Wake the poll loop for an immediate refresh.
    pub fn invalidate(&self) {
        self.invalidated.notify_one();
    }

    /// Poll every `poll_interval`, or sooner after [`invalidate`]. Abort the
    /// returned handle to stop.
    ///
    /// [`invalidate`]: SyncController::invalidate
    pub fn spawn_polling(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = time::interval(this.settings.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                interval_ms = this.settings.poll_interval.as_millis() as u64,
                "polling started"
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = this.invalidated.notified() => debug!("snapshot invalidated"),
                }
                if let Err(e) = this.refresh().await {
                    warn!(error = %e, "poll failed");
                }
            }
        })
    }

    // ── Gestures ──────────────────────────────────────────────────────

    pub fn begin_drag(&self, subject: DragSubject) -> Result<(), ClientError> {
        let board = locked(&self.board);
        locked(&self.drag).start(subject, &board)?;
        self.drag_epoch.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn hover(&self, target: DropTarget) {
        locked(&self.drag).hover(target);
    }

    pub fn cancel_drag(&self) {
        locked(&self.drag).cancel();
    }

    /// Drop the dragged entity on `target`. Returns the move that was
    /// applied, or `None` when the drop changed nothing.
    pub async fn end_drag(&self, target: DropTarget) -> Result<Option<ReorderIntent>, ClientError> {
        let _guard = InFlight::enter(&self.in_flight);
        let intent = {
            let board = locked(&self.board);
            locked(&self.drag).finish(target, &board)
        };
        match intent {
            Some(intent) => {
                self.apply_intent(&intent).await?;
                Ok(Some(intent))
            }
            None => Ok(None),
        }
    }

    pub async fn move_card(&self, task_id: &str, req: CardMove) -> Result<(), ClientError> {
        self.apply_intent(&ReorderIntent::MoveCard {
            task_id: task_id.to_string(),
            column_id: req.column_id,
            position: req.position,
        })
        .await
    }

    pub async fn move_column(&self, column_id: &str, req: ColumnMove) -> Result<(), ClientError> {
        self.apply_intent(&ReorderIntent::MoveColumn {
            column_id: column_id.to_string(),
            position: req.position,
        })
        .await
    }

    /// Apply a move locally, then send it.
    async fn apply_intent(&self, intent: &ReorderIntent) -> Result<(), ClientError> {
        let local = {
            let mut board = locked(&self.board);
            match intent {
                ReorderIntent::MoveCard {
                    task_id,
                    column_id,
                    position,
                } => board
                    .apply_card_move(task_id, column_id, *position, self.policy)
                    .map(|_| ()),
                ReorderIntent::MoveColumn {
                    column_id,
                    position,
                } => board.apply_column_move(column_id, *position),
            }
        };
        local?;
        debug!(?intent, "applied move locally");

        self.structural("move", async {
            match intent {
                ReorderIntent::MoveCard {
                    task_id,
                    column_id,
                    position,
                } => self
                    .api
                    .move_card(
                        task_id,
                        CardMove {
                            column_id: column_id.clone(),
                            position: *position,
                        },
                    )
                    .await
                    .map(|_| ()),
                ReorderIntent::MoveColumn {
                    column_id,
                    position,
                } => self
                    .api
                    .move_column(
                        column_id,
                        ColumnMove {
                            position: *position,
                        },
                    )
                    .await
                    .map(|_| ()),
            }
        })
        .await
    }

    /// Run a structural request with refreshes held off, then invalidate.
    async fn structural<T>(
        &self,
        op: &'static str,
        request: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        let result = {
            let _guard = InFlight::enter(&self.in_flight);
            request.await
        };
        if let Err(e) = &result {
            warn!(op, error = %e, "request failed; refetching board");
            self.resync().await;
        }
        self.invalidate();
        result
    }

    // ── Content edits ─────────────────────────────────────────────────

    /// Apply an edit locally and (re)start the card's debounce timer.
    ///
    /// Writes for one card never overlap: a timer that fires while the
    /// card's previous write is outstanding waits for it, so the server
    /// always ends at the latest value.
    pub fn edit_card(self: &Arc<Self>, task_id: &str, patch: CardPatch) -> Result<(), ClientError> {
        locked(&self.board).apply_card_patch(task_id, &patch)?;

        let generation = self.edit_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut pending = locked(&self.pending);
        let merged = match pending.remove(task_id) {
            Some(previous) => {
                previous.timer.abort();
                previous.patch.merged(patch)
            }
            None => patch,
        };
        let this = Arc::clone(self);
        let id = task_id.to_string();
        let timer = tokio::spawn(async move {
            time::sleep(this.settings.edit_debounce).await;
            this.fire_edit(&id, generation).await;
        });
        pending.insert(
            task_id.to_string(),
            PendingEdit {
                patch: merged,
                generation,
                timer,
            },
        );
        Ok(())
    }

    fn edit_lock(&self, task_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        locked(&self.edit_locks)
            .entry(task_id.to_string())
            .or_default()
            .clone()
    }

    /// Send the pending edit created under `generation`, if it is still the
    /// card's current one.
    async fn fire_edit(&self, task_id: &str, generation: u64) {
        let lock = self.edit_lock(task_id);
        let _write = lock.lock().await;
        let _guard = InFlight::enter(&self.in_flight);
        let edit = {
            let mut pending = locked(&self.pending);
            let current = pending.get(task_id).map(|edit| edit.generation);
            if current == Some(generation) {
                pending.remove(task_id)
            } else {
                None
            }
        };
        let Some(edit) = edit else {
            debug!(task_id, generation, "edit superseded");
            return;
        };
        if let Err(e) = self.send_edit(task_id, edit.patch).await {
            warn!(task_id, error = %e, "edit rejected");
        }
    }

    async fn send_edit(&self, task_id: &str, patch: CardPatch) -> Result<Card, ClientError> {
        debug!(task_id, "sending edit");
        let result = self.api.edit_card(task_id, patch).await;
        if result.is_err() {
            self.resync().await;
        }
        result
    }

    /// Drop a card's pending edit without sending it.
    pub fn cancel_pending_edit(&self, task_id: &str) -> bool {
        match locked(&self.pending).remove(task_id) {
            Some(edit) => {
                edit.timer.abort();
                debug!(task_id, "pending edit cancelled");
                true
            }
            None => false,
        }
    }

    /// Send every pending edit now. Returns how many were sent, or the
    /// first failure after attempting all of them.
    pub async fn flush_edits(&self) -> Result<usize, ClientError> {
        let _guard = InFlight::enter(&self.in_flight);
        let drained: Vec<(String, PendingEdit)> = locked(&self.pending).drain().collect();
        let mut sent = 0;
        let mut first_error = None;
        for (task_id, edit) in drained {
            edit.timer.abort();
            let lock = self.edit_lock(&task_id);
            let _write = lock.lock().await;
            match self.send_edit(&task_id, edit.patch).await {
                Ok(_) => sent += 1,
                Err(e) => {
                    warn!(task_id, error = %e, "edit rejected during flush");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(sent),
        }
    }

    // ── Structural mutations ──────────────────────────────────────────

    pub async fn create_card(&self, req: NewCard) -> Result<Card, ClientError> {
        let shown = locked(&self.board).append_card(&req);
        if let Err(e) = shown {
            debug!(task_id = %req.task_id, error = %e, "card not shown before server reply");
        }
        self.structural("create_card", self.api.create_card(req))
            .await
    }

    pub async fn delete_card(&self, task_id: &str) -> Result<bool, ClientError> {
        self.cancel_pending_edit(task_id);
        locked(&self.edit_locks).remove(task_id);
        let _ = locked(&self.board).remove_card(task_id);
        self.structural("delete_card", self.api.delete_card(task_id))
            .await
    }

    pub async fn create_column(&self, req: NewColumn) -> Result<Column, ClientError> {
        let shown = locked(&self.board).append_column(&req);
        if let Err(e) = shown {
            debug!(column_id = %req.column_id, error = %e, "column not shown before server reply");
        }
        self.structural("create_column", self.api.create_column(req))
            .await
    }

    pub async fn rename_column(&self, column_id: &str, title: &str) -> Result<Column, ClientError> {
        let _ = locked(&self.board).rename_column(column_id, title);
        let patch = ColumnPatch {
            title: title.to_string(),
        };
        self.structural("rename_column", self.api.edit_column(column_id, patch))
            .await
    }

    /// Delete a column, dropping pending edits for every card it held.
    pub async fn delete_column(&self, column_id: &str) -> Result<ColumnRemoval, ClientError> {
        let removed = locked(&self.board)
            .remove_column(column_id)
            .unwrap_or_default();
        for task_id in &removed {
            self.cancel_pending_edit(task_id);
            locked(&self.edit_locks).remove(task_id);
        }
        self.structural("delete_column", self.api.delete_column(column_id))
            .await
    }
}
