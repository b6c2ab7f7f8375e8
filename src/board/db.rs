use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Row, params};
use taskboard_common::{Board, Card, Column, Scope};

use super::ledger::{CardPlacement, ColumnPlacement};
use super::store::BoardStore;

/// Async-safe handle to the board database.
///
/// Wraps `BoardDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O never
/// occupies an async worker thread.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<BoardDb>>,
}

impl DbHandle {
    pub fn new(db: BoardDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&BoardDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct BoardDb {
    conn: Connection,
}

const CARD_FIELDS: &str = "board_id, task_id, column_id, title, description, label, position";
const COLUMN_FIELDS: &str = "board_id, column_id, title, position";

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        board_id: row.get(0)?,
        task_id: row.get(1)?,
        column_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        label: row.get(5)?,
        position: row.get(6)?,
    })
}

fn column_from_row(row: &Row<'_>) -> rusqlite::Result<Column> {
    Ok(Column {
        board_id: row.get(0)?,
        column_id: row.get(1)?,
        title: row.get(2)?,
        position: row.get(3)?,
    })
}

impl BoardDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS boards (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS lists (
                    board_id TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                    column_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    position INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                    PRIMARY KEY (board_id, column_id)
                );

                CREATE TABLE IF NOT EXISTS cards (
                    board_id TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                    task_id TEXT NOT NULL,
                    column_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT,
                    label TEXT,
                    position INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                    PRIMARY KEY (board_id, task_id),
                    FOREIGN KEY (board_id, column_id)
                        REFERENCES lists(board_id, column_id) ON DELETE CASCADE
                );

                CREATE INDEX IF NOT EXISTS idx_lists_board ON lists(board_id, position);
                CREATE INDEX IF NOT EXISTS idx_cards_scope ON cards(board_id, column_id, position);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Boards ────────────────────────────────────────────────────────

    pub fn board_exists(&self, board_id: &str) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM boards WHERE id = ?1",
                params![board_id],
                |row| row.get(0),
            )
            .context("Failed to check board existence")
    }

    pub fn create_board(&self, board_id: &str, title: &str) -> Result<Board> {
        self.conn
            .execute(
                "INSERT INTO boards (id, title) VALUES (?1, ?2)",
                params![board_id, title],
            )
            .context("Failed to insert board")?;
        self.get_board(board_id)?
            .context("Board not found after insert")
    }

    pub fn get_board(&self, board_id: &str) -> Result<Option<Board>> {
        self.conn
            .query_row(
                "SELECT id, title, created_at FROM boards WHERE id = ?1",
                params![board_id],
                |row| {
                    Ok(Board {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .context("Failed to query board")
    }

    pub fn list_boards(&self) -> Result<Vec<Board>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, created_at FROM boards ORDER BY created_at, rowid")
            .context("Failed to prepare list_boards")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Board {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })
            .context("Failed to query boards")?;
        let mut boards = Vec::new();
        for row in rows {
            boards.push(row.context("Failed to read board row")?);
        }
        Ok(boards)
    }

    // ── Columns ───────────────────────────────────────────────────────

    pub fn list_columns(&self, board_id: &str) -> Result<Vec<Column>> {
        let sql = format!(
            "SELECT {COLUMN_FIELDS} FROM lists WHERE board_id = ?1 ORDER BY position, rowid"
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_columns")?;
        let rows = stmt
            .query_map(params![board_id], column_from_row)
            .context("Failed to query columns")?;
        let mut columns = Vec::new();
        for row in rows {
            columns.push(row.context("Failed to read column row")?);
        }
        Ok(columns)
    }

    pub fn get_column(&self, board_id: &str, column_id: &str) -> Result<Option<Column>> {
        let sql = format!("SELECT {COLUMN_FIELDS} FROM lists WHERE board_id = ?1 AND column_id = ?2");
        self.conn
            .query_row(&sql, params![board_id, column_id], column_from_row)
            .optional()
            .context("Failed to query column")
    }

    pub fn upsert_column(&self, column: &Column) -> Result<Column> {
        self.conn
            .execute(
                "INSERT INTO lists (board_id, column_id, title, position) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(board_id, column_id) DO UPDATE SET
                    title = excluded.title,
                    position = excluded.position,
                    updated_at = datetime('now')",
                params![column.board_id, column.column_id, column.title, column.position],
            )
            .context("Failed to upsert column")?;
        self.get_column(&column.board_id, &column.column_id)?
            .context("Column not found after upsert")
    }

    pub fn delete_column(&self, board_id: &str, column_id: &str) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "DELETE FROM lists WHERE board_id = ?1 AND column_id = ?2",
                params![board_id, column_id],
            )
            .context("Failed to delete column")?;
        Ok(count > 0)
    }

    pub fn apply_column_placements(
        &self,
        board_id: &str,
        placements: &[ColumnPlacement],
    ) -> Result<()> {
        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        for placement in placements {
            tx.execute(
                "UPDATE lists SET position = ?1, updated_at = datetime('now')
                 WHERE board_id = ?2 AND column_id = ?3",
                params![placement.position, board_id, placement.column_id],
            )
            .with_context(|| format!("Failed to reposition column {}", placement.column_id))?;
        }
        tx.commit().context("Failed to commit column positions")?;
        Ok(())
    }

    // ── Cards ─────────────────────────────────────────────────────────

    pub fn list_cards(&self, board_id: &str) -> Result<Vec<Card>> {
        let sql = format!(
            "SELECT {CARD_FIELDS} FROM cards WHERE board_id = ?1 ORDER BY column_id, position, rowid"
        );
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare list_cards")?;
        let rows = stmt
            .query_map(params![board_id], card_from_row)
            .context("Failed to query cards")?;
        let mut cards = Vec::new();
        for row in rows {
            cards.push(row.context("Failed to read card row")?);
        }
        Ok(cards)
    }

    pub fn list_scope(&self, board_id: &str, column_id: &str) -> Result<Vec<Card>> {
        let sql = format!(
            "SELECT {CARD_FIELDS} FROM cards WHERE board_id = ?1 AND column_id = ?2
             ORDER BY position, rowid"
        );
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare list_scope")?;
        let rows = stmt
            .query_map(params![board_id, column_id], card_from_row)
            .context("Failed to query scope")?;
        let mut cards = Vec::new();
        for row in rows {
            cards.push(row.context("Failed to read card row")?);
        }
        Ok(cards)
    }

    pub fn get_card(&self, board_id: &str, task_id: &str) -> Result<Option<Card>> {
        let sql = format!("SELECT {CARD_FIELDS} FROM cards WHERE board_id = ?1 AND task_id = ?2");
        self.conn
            .query_row(&sql, params![board_id, task_id], card_from_row)
            .optional()
            .context("Failed to query card")
    }

    pub fn upsert_card(&self, card: &Card) -> Result<Card> {
        self.conn
            .execute(
                "INSERT INTO cards (board_id, task_id, column_id, title, description, label, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(board_id, task_id) DO UPDATE SET
                    column_id = excluded.column_id,
                    title = excluded.title,
                    description = excluded.description,
                    label = excluded.label,
                    position = excluded.position,
                    updated_at = datetime('now')",
                params![
                    card.board_id,
                    card.task_id,
                    card.column_id,
                    card.title,
                    card.description,
                    card.label,
                    card.position
                ],
            )
            .context("Failed to upsert card")?;
        self.get_card(&card.board_id, &card.task_id)?
            .context("Card not found after upsert")
    }

    pub fn delete_card(&self, board_id: &str, task_id: &str) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "DELETE FROM cards WHERE board_id = ?1 AND task_id = ?2",
                params![board_id, task_id],
            )
            .context("Failed to delete card")?;
        Ok(count > 0)
    }

    pub fn delete_scope(&self, board_id: &str, column_id: &str) -> Result<u64> {
        let count = self
            .conn
            .execute(
                "DELETE FROM cards WHERE board_id = ?1 AND column_id = ?2",
                params![board_id, column_id],
            )
            .context("Failed to delete cards in column")?;
        Ok(count as u64)
    }

    /// Write a batch of card placements atomically.
    pub fn apply_card_placements(&self, board_id: &str, placements: &[CardPlacement]) -> Result<()> {
        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        for placement in placements {
            let updated = tx
                .execute(
                    "UPDATE cards SET column_id = ?1, position = ?2, updated_at = datetime('now')
                     WHERE board_id = ?3 AND task_id = ?4",
                    params![
                        placement.column_id,
                        placement.position,
                        board_id,
                        placement.task_id
                    ],
                )
                .with_context(|| format!("Failed to reposition card {}", placement.task_id))?;
            if updated == 0 {
                anyhow::bail!("Card {} vanished during reposition", placement.task_id);
            }
        }
        tx.commit().context("Failed to commit card positions")?;
        Ok(())
    }
}

#[async_trait]
impl BoardStore for DbHandle {
    async fn board_exists(&self, board_id: &str) -> Result<bool> {
        let board_id = board_id.to_string();
        self.call(move |db| db.board_exists(&board_id)).await
    }

    async fn create_board(&self, board_id: &str, title: &str) -> Result<Board> {
        let (board_id, title) = (board_id.to_string(), title.to_string());
        self.call(move |db| db.create_board(&board_id, &title)).await
    }

    async fn list_boards(&self) -> Result<Vec<Board>> {
        self.call(|db| db.list_boards()).await
    }

    async fn columns(&self, board_id: &str) -> Result<Vec<Column>> {
        let board_id = board_id.to_string();
        self.call(move |db| db.list_columns(&board_id)).await
    }

    async fn find_column(&self, board_id: &str, column_id: &str) -> Result<Option<Column>> {
        let (board_id, column_id) = (board_id.to_string(), column_id.to_string());
        self.call(move |db| db.get_column(&board_id, &column_id)).await
    }

    async fn upsert_column(&self, column: Column) -> Result<Column> {
        self.call(move |db| db.upsert_column(&column)).await
    }

    async fn delete_column(&self, board_id: &str, column_id: &str) -> Result<bool> {
        let (board_id, column_id) = (board_id.to_string(), column_id.to_string());
        self.call(move |db| db.delete_column(&board_id, &column_id))
            .await
    }

    async fn apply_column_placements(
        &self,
        board_id: &str,
        placements: Vec<ColumnPlacement>,
    ) -> Result<()> {
        let board_id = board_id.to_string();
        self.call(move |db| db.apply_column_placements(&board_id, &placements))
            .await
    }

    async fn cards(&self, board_id: &str) -> Result<Vec<Card>> {
        let board_id = board_id.to_string();
        self.call(move |db| db.list_cards(&board_id)).await
    }

    async fn cards_in_scope(&self, scope: &Scope) -> Result<Vec<Card>> {
        let scope = scope.clone();
        self.call(move |db| db.list_scope(&scope.board_id, &scope.column_id))
            .await
    }

    async fn find_card(&self, board_id: &str, task_id: &str) -> Result<Option<Card>> {
        let (board_id, task_id) = (board_id.to_string(), task_id.to_string());
        self.call(move |db| db.get_card(&board_id, &task_id)).await
    }

    async fn upsert_card(&self, card: Card) -> Result<Card> {
        self.call(move |db| db.upsert_card(&card)).await
    }

    async fn delete_card(&self, board_id: &str, task_id: &str) -> Result<bool> {
        let (board_id, task_id) = (board_id.to_string(), task_id.to_string());
        self.call(move |db| db.delete_card(&board_id, &task_id)).await
    }

    async fn delete_cards_in_scope(&self, scope: &Scope) -> Result<u64> {
        let scope = scope.clone();
        self.call(move |db| db.delete_scope(&scope.board_id, &scope.column_id))
            .await
    }

    async fn apply_card_placements(
        &self,
        board_id: &str,
        placements: Vec<CardPlacement>,
    ) -> Result<()> {
        let board_id = board_id.to_string();
        self.call(move |db| db.apply_card_placements(&board_id, &placements))
            .await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
