//! Fakes shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aiqa_e2e::model::{ContentBlock, Message, MessageRequest, MessageResponse};
use aiqa_e2e::{ActionExecutor, BrowserLauncher, BrowserSession, Cursor, E2eError, E2eResult, ModelClient};

pub fn text(s: &str) -> ContentBlock {
    ContentBlock::Text {
        text: s.to_string(),
    }
}

pub fn tool_use(id: &str, input: serde_json::Value) -> ContentBlock {
    ContentBlock::ToolUse {
        id: id.to_string(),
        name: "computer".to_string(),
        input,
    }
}

/// Replays canned assistant turns and records every transcript it is sent
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Vec<ContentBlock>>>,
    pub requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Vec<ContentBlock>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn create_message(&self, request: &MessageRequest<'_>) -> E2eResult<MessageResponse> {
        self.requests.lock().push(request.messages.to_vec());
        let content = self
            .replies
            .lock()
            .pop_front()
            .ok_or_else(|| E2eError::Model("script exhausted".to_string()))?;
        Ok(MessageResponse {
            content,
            ..Default::default()
        })
    }
}

/// Answers immediately: passes unless the instruction mentions "fail"
#[derive(Default)]
pub struct VerdictModel {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ModelClient for VerdictModel {
    async fn create_message(&self, request: &MessageRequest<'_>) -> E2eResult<MessageResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let instruction = match request.messages.first().and_then(|m| m.content.first()) {
            Some(ContentBlock::Text { text }) => text.clone(),
            _ => String::new(),
        };
        let verdict = serde_json::json!({
            "test_passed": !instruction.contains("fail"),
            "motivation": instruction,
        });
        Ok(MessageResponse {
            content: vec![text(&verdict.to_string())],
            ..Default::default()
        })
    }
}

/// In-memory browser; `type_text("sleep:<ms>")` delays before completing
#[derive(Default)]
pub struct FakeBrowser {
    pub log: Mutex<Vec<String>>,
    cursor: Mutex<Cursor>,
    pub screenshot: Option<PathBuf>,
}

impl FakeBrowser {
    pub fn with_screenshot(path: PathBuf) -> Self {
        Self {
            screenshot: Some(path),
            ..Default::default()
        }
    }

    pub fn actions(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl ActionExecutor for FakeBrowser {
    async fn screenshot(&self) -> E2eResult<PathBuf> {
        self.log.lock().push("screenshot".to_string());
        self.screenshot
            .clone()
            .ok_or_else(|| E2eError::Browser("no screenshot available".to_string()))
    }

    async fn move_cursor(&self, x: f64, y: f64) -> E2eResult<()> {
        *self.cursor.lock() = Cursor { x, y };
        self.log.lock().push(format!("move {},{}", x, y));
        Ok(())
    }

    async fn click(&self) -> E2eResult<()> {
        let Cursor { x, y } = *self.cursor.lock();
        self.log.lock().push(format!("click {},{}", x, y));
        Ok(())
    }

    async fn type_text(&self, text: &str) -> E2eResult<()> {
        if let Some(ms) = text.strip_prefix("sleep:").and_then(|ms| ms.parse().ok()) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        self.log.lock().push(format!("type {}", text));
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn close(&self) -> E2eResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeLauncher {
    pub launches: AtomicUsize,
}

impl FakeLauncher {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn BrowserSession>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeBrowser::default()))
    }
}
