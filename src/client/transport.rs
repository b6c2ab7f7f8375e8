//! How the sync client reaches a board.
//!
//! `HttpBoardApi` talks to a running server; `ServiceBoardApi` calls a
//! `BoardService` in the same process, which is what embedded use and the
//! end-to-end tests rely on.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use taskboard_common::{
    BoardContents, Card, CardMove, CardPatch, Column, ColumnMove, ColumnPatch, ColumnRemoval,
    NewCard, NewColumn,
};
use tracing::debug;

use crate::board::service::BoardService;
use crate::errors::ClientError;

/// Board operations as seen from a client bound to one board.
#[async_trait]
pub trait BoardApi: Send + Sync {
    async fn get_board_contents(&self) -> Result<BoardContents, ClientError>;
    async fn create_card(&self, req: NewCard) -> Result<Card, ClientError>;
    async fn edit_card(&self, task_id: &str, patch: CardPatch) -> Result<Card, ClientError>;
    async fn move_card(&self, task_id: &str, req: CardMove) -> Result<Card, ClientError>;
    async fn delete_card(&self, task_id: &str) -> Result<bool, ClientError>;
    async fn create_column(&self, req: NewColumn) -> Result<Column, ClientError>;
    async fn edit_column(&self, column_id: &str, patch: ColumnPatch)
    -> Result<Column, ClientError>;
    async fn move_column(&self, column_id: &str, req: ColumnMove)
    -> Result<Vec<Column>, ClientError>;
    async fn delete_column(&self, column_id: &str) -> Result<ColumnRemoval, ClientError>;
}

// ── HTTP ──────────────────────────────────────────────────────────────

pub struct HttpBoardApi {
    client: reqwest::Client,
    base: Url,
    board_id: String,
}

impl HttpBoardApi {
    pub fn new(server_url: &str, board_id: &str) -> Result<Self, ClientError> {
        let base =
            Url::parse(server_url).map_err(|_| ClientError::InvalidUrl(server_url.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(server_url.to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base,
            board_id: board_id.to_string(),
        })
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    /// `{base}/api/boards/{board_id}/{segments...}`, each segment escaped.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(["api", "boards", self.board_id.as_str()])
            .extend(segments);
        Ok(url)
    }
}

async fn rejection(resp: Response) -> ClientError {
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or(text);
    ClientError::Rejected { status, message }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    if resp.status().is_success() {
        Ok(resp.json::<T>().await?)
    } else {
        Err(rejection(resp).await)
    }
}

#[async_trait]
impl BoardApi for HttpBoardApi {
    async fn get_board_contents(&self) -> Result<BoardContents, ClientError> {
        let url = self.endpoint(&[])?;
        debug!(%url, "fetching board");
        decode(self.client.get(url).send().await?).await
    }

    async fn create_card(&self, req: NewCard) -> Result<Card, ClientError> {
        let url = self.endpoint(&["cards"])?;
        decode(self.client.post(url).json(&req).send().await?).await
    }

    async fn edit_card(&self, task_id: &str, patch: CardPatch) -> Result<Card, ClientError> {
        let url = self.endpoint(&["cards", task_id])?;
        decode(self.client.patch(url).json(&patch).send().await?).await
    }

    async fn move_card(&self, task_id: &str, req: CardMove) -> Result<Card, ClientError> {
        let url = self.endpoint(&["cards", task_id])?;
        decode(self.client.put(url).json(&req).send().await?).await
    }

    async fn delete_card(&self, task_id: &str) -> Result<bool, ClientError> {
        let url = self.endpoint(&["cards", task_id])?;
        let resp = self.client.delete(url).send().await?;
        match resp.status().as_u16() {
            204 | 200 => Ok(true),
            404 => Ok(false),
            _ => Err(rejection(resp).await),
        }
    }

    async fn create_column(&self, req: NewColumn) -> Result<Column, ClientError> {
        let url = self.endpoint(&["lists"])?;
        decode(self.client.post(url).json(&req).send().await?).await
    }

    async fn edit_column(
        &self,
        column_id: &str,
        patch: ColumnPatch,
    ) -> Result<Column, ClientError> {
        let url = self.endpoint(&["lists", column_id])?;
        decode(self.client.patch(url).json(&patch).send().await?).await
    }

    async fn move_column(
        &self,
        column_id: &str,
        req: ColumnMove,
    ) -> Result<Vec<Column>, ClientError> {
        let url = self.endpoint(&["lists", column_id])?;
        decode(self.client.put(url).json(&req).send().await?).await
    }

    async fn delete_column(&self, column_id: &str) -> Result<ColumnRemoval, ClientError> {
        let url = self.endpoint(&["lists", column_id])?;
        decode(self.client.delete(url).send().await?).await
    }
}

// ── In-process ────────────────────────────────────────────────────────

pub struct ServiceBoardApi {
    service: Arc<BoardService>,
    board_id: String,
}

impl ServiceBoardApi {
    pub fn new(service: Arc<BoardService>, board_id: &str) -> Self {
        Self {
            service,
            board_id: board_id.to_string(),
        }
    }
}

#[async_trait]
impl BoardApi for ServiceBoardApi {
    async fn get_board_contents(&self) -> Result<BoardContents, ClientError> {
        Ok(self.service.get_board_contents(&self.board_id).await?)
    }

    async fn create_card(&self, req: NewCard) -> Result<Card, ClientError> {
        Ok(self.service.create_card(&self.board_id, req).await?)
    }

    async fn edit_card(&self, task_id: &str, patch: CardPatch) -> Result<Card, ClientError> {
        Ok(self.service.edit_card(&self.board_id, task_id, patch).await?)
    }

    async fn move_card(&self, task_id: &str, req: CardMove) -> Result<Card, ClientError> {
        Ok(self.service.move_card(&self.board_id, task_id, req).await?)
    }

    async fn delete_card(&self, task_id: &str) -> Result<bool, ClientError> {
        Ok(self.service.delete_card(&self.board_id, task_id).await?)
    }

    async fn create_column(&self, req: NewColumn) -> Result<Column, ClientError> {
        Ok(self.service.create_column(&self.board_id, req).await?)
    }

    async fn edit_column(
        &self,
        column_id: &str,
        patch: ColumnPatch,
    ) -> Result<Column, ClientError> {
        Ok(self
            .service
            .edit_column(&self.board_id, column_id, patch)
            .await?)
    }

    async fn move_column(
        &self,
        column_id: &str,
        req: ColumnMove,
    ) -> Result<Vec<Column>, ClientError> {
        Ok(self
            .service
            .move_column(&self.board_id, column_id, req)
            .await?)
    }

    async fn delete_column(&self, column_id: &str) -> Result<ColumnRemoval, ClientError> {
        Ok(self.service.delete_column(&self.board_id, column_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_escapes_segments() {
        let api = HttpBoardApi::new("http://127.0.0.1:3141", "sprint 1").unwrap();
        let url = api.endpoint(&["cards", "a/b"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:3141/api/boards/sprint%201/cards/a%2Fb"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = HttpBoardApi::new("http://localhost:8080/board/", "b1").unwrap();
        let url = api.endpoint(&[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/board/api/boards/b1");
    }

    #[test]
    fn test_invalid_server_url() {
        assert!(matches!(
            HttpBoardApi::new("not a url", "b1"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpBoardApi::new("mailto:someone@example.com", "b1"),
            Err(ClientError::InvalidUrl(_))
        ));
    }
}
