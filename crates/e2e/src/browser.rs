//! Browser collaborator interfaces
//!
//! The conversation engine only needs four primitives from a browser. Click
//! takes no coordinates: it acts wherever the last move left the cursor, and
//! that position is owned by the session.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::E2eResult;

#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Capture the viewport and return the path of the written image
    async fn screenshot(&self) -> E2eResult<PathBuf>;

    /// Move the cursor to viewport coordinates
    async fn move_cursor(&self, x: f64, y: f64) -> E2eResult<()>;

    /// Click at the current cursor position
    async fn click(&self) -> E2eResult<()>;

    /// Type text into whatever has focus
    async fn type_text(&self, text: &str) -> E2eResult<()>;
}

/// A live browser opened on the application under test
#[async_trait]
pub trait BrowserSession: ActionExecutor {
    async fn close(&self) -> E2eResult<()>;
}

/// Opens one fresh session per instruction
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> E2eResult<Box<dyn BrowserSession>>;
}

/// Cursor position tracked by a session; updated only by moves
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cursor {
    pub x: f64,
    pub y: f64,
}
