//! Translation between model tool calls and browser actions

use base64::Engine;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

use crate::browser::ActionExecutor;
use crate::error::{E2eError, E2eResult};
use crate::model::{ContentBlock, ImageSource, ToolResultContent, COMPUTER_TOOL_NAME};

/// Acknowledgement returned for actions that produce no data
pub const ACK: &str = "done";

/// Action requested through the computer tool, decoded once at the boundary
#[derive(Debug, Clone, PartialEq)]
pub enum ComputerAction {
    Screenshot,
    MouseMove { x: f64, y: f64 },
    LeftClick,
    Type { text: String },
}

impl ComputerAction {
    pub fn name(&self) -> &'static str {
        match self {
            ComputerAction::Screenshot => "screenshot",
            ComputerAction::MouseMove { .. } => "mouse_move",
            ComputerAction::LeftClick => "left_click",
            ComputerAction::Type { .. } => "type",
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum RawAction {
    Screenshot,
    MouseMove {
        #[serde(default)]
        coordinate: Option<serde_json::Value>,
    },
    LeftClick,
    Type {
        #[serde(default)]
        text: Option<serde_json::Value>,
    },
    #[serde(other)]
    Unsupported,
}

/// A decoded `tool_use` block
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub action: ComputerAction,
}

impl ToolInvocation {
    /// Decode a tool call. `Ok(None)` means the call is not something this
    /// runner acts on; missing arguments for a known action are errors.
    pub fn decode(id: &str, name: &str, input: &serde_json::Value) -> E2eResult<Option<Self>> {
        if name != COMPUTER_TOOL_NAME {
            warn!("Ignoring call to unknown tool '{}'", name);
            return Ok(None);
        }

        let raw = match RawAction::deserialize(input) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Ignoring undecodable computer call {}: {}", id, e);
                return Ok(None);
            }
        };

        let action = match raw {
            RawAction::Screenshot => ComputerAction::Screenshot,
            RawAction::LeftClick => ComputerAction::LeftClick,
            RawAction::MouseMove { coordinate } => {
                let (x, y) = parse_coordinate(coordinate.as_ref()).ok_or(
                    E2eError::MissingArgument {
                        action: "mouse_move",
                        argument: "coordinate",
                    },
                )?;
                ComputerAction::MouseMove { x, y }
            }
            RawAction::Type { text } => match text.as_ref().and_then(|t| t.as_str()) {
                Some(text) if !text.is_empty() => ComputerAction::Type {
                    text: text.to_string(),
                },
                _ => {
                    return Err(E2eError::MissingArgument {
                        action: "type",
                        argument: "text",
                    })
                }
            },
            RawAction::Unsupported => {
                warn!("Ignoring unsupported computer action in call {}: {}", id, input);
                return Ok(None);
            }
        };

        Ok(Some(Self {
            id: id.to_string(),
            action,
        }))
    }
}

fn parse_coordinate(value: Option<&serde_json::Value>) -> Option<(f64, f64)> {
    match value?.as_array()?.as_slice() {
        [x, y] => Some((x.as_f64()?, y.as_f64()?)),
        _ => None,
    }
}

/// Data produced by one action
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Image { media_type: String, data: String },
}

/// Output of one invocation, correlated by the invocation id
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub id: String,
    pub output: ToolOutput,
}

impl ToolResult {
    pub fn into_block(self) -> ContentBlock {
        let content = match self.output {
            ToolOutput::Text(text) => ToolResultContent::Text { text },
            ToolOutput::Image { media_type, data } => ToolResultContent::Image {
                source: ImageSource::base64(media_type, data),
            },
        };
        ContentBlock::ToolResult {
            tool_use_id: self.id,
            content: vec![content],
        }
    }
}

/// Runs decoded invocations against a browser
pub struct ToolBridge<'a, E: ActionExecutor + ?Sized> {
    executor: &'a E,
}

impl<'a, E: ActionExecutor + ?Sized> ToolBridge<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }

    /// Decode and execute a raw tool call
    pub async fn handle(
        &self,
        id: &str,
        name: &str,
        input: &serde_json::Value,
    ) -> E2eResult<Option<ToolResult>> {
        match ToolInvocation::decode(id, name, input)? {
            Some(invocation) => self.dispatch(&invocation).await.map(Some),
            None => Ok(None),
        }
    }

    /// Execute one invocation; exactly one browser operation per call
    pub async fn dispatch(&self, invocation: &ToolInvocation) -> E2eResult<ToolResult> {
        debug!("Executing action: {}", invocation.action.name());

        let output = match &invocation.action {
            ComputerAction::Screenshot => {
                let path = self.executor.screenshot().await?;
                let bytes = tokio::fs::read(&path).await?;
                debug!("Screenshot taken: {}", path.display());
                ToolOutput::Image {
                    media_type: media_type_for(&path).to_string(),
                    data: base64::engine::general_purpose::STANDARD.encode(bytes),
                }
            }
            ComputerAction::MouseMove { x, y } => {
                self.executor.move_cursor(*x, *y).await?;
                ToolOutput::Text(ACK.to_string())
            }
            ComputerAction::LeftClick => {
                self.executor.click().await?;
                ToolOutput::Text(ACK.to_string())
            }
            ComputerAction::Type { text } => {
                self.executor.type_text(text).await?;
                ToolOutput::Text(ACK.to_string())
            }
        };

        Ok(ToolResult {
            id: invocation.id.clone(),
            output,
        })
    }
}

fn media_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => "image/png",
        _ => "image/jpeg",
    }
}
