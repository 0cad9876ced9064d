//! Conversation engine: drives one instruction to a verdict
//!
//! Each turn sends the whole transcript to the model. An assistant turn
//! whose first block is text carrying the verdict marker ends the
//! conversation; otherwise every `tool_use` block is executed against the
//! browser and the results are sent back as the next user turn.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use aiqa_common::{AiqaConfig, Verdict};

use crate::bridge::ToolBridge;
use crate::browser::ActionExecutor;
use crate::error::E2eResult;
use crate::model::{ComputerTool, ContentBlock, Message, MessageRequest, ModelClient};
use crate::prompts::{format_instruction, SYSTEM_PROMPT, VERDICT_MARKER};
use crate::suite::TestCase;

/// How a conversation ended
#[derive(Debug, Clone, PartialEq)]
pub enum Conclusion {
    /// The model returned a well-formed verdict
    Verdict(Verdict),
    /// The model signalled completion but the verdict JSON did not parse
    MalformedVerdict { raw: String },
    /// The turn cap was reached before any verdict
    StepLimitExceeded { turns: u32 },
}

/// Finished conversation
#[derive(Debug, Clone)]
pub struct Conversation {
    pub conclusion: Conclusion,
    /// Model calls made
    pub turns: u32,
    pub transcript: Vec<Message>,
}

/// Settings the engine reads on every turn
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub model: String,
    pub max_tokens: u32,
    pub max_turns: u32,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl From<&AiqaConfig> for EngineSettings {
    fn from(config: &AiqaConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_turns: config.max_turns,
            screen_width: config.screen_width,
            screen_height: config.screen_height,
        }
    }
}

pub struct ConversationEngine {
    model: Arc<dyn ModelClient>,
    settings: EngineSettings,
    tools: Vec<ComputerTool>,
}

impl ConversationEngine {
    pub fn new(model: Arc<dyn ModelClient>, settings: EngineSettings) -> Self {
        let tools = vec![ComputerTool::new(settings.screen_width, settings.screen_height)];
        Self {
            model,
            settings,
            tools,
        }
    }

    pub fn from_config(config: &AiqaConfig, model: Arc<dyn ModelClient>) -> Self {
        Self::new(model, EngineSettings::from(config))
    }

    /// Run one instruction against `executor` until a verdict or the turn cap.
    ///
    /// Model failures and failed browser actions abort the conversation with
    /// an error; a malformed verdict and an exhausted cap are conclusions.
    pub async fn run<E>(&self, case: &TestCase, executor: &E) -> E2eResult<Conversation>
    where
        E: ActionExecutor + ?Sized,
    {
        let bridge = ToolBridge::new(executor);
        let mut transcript = vec![Message::user_text(format_instruction(case))];

        for turn in 1..=self.settings.max_turns {
            let request = MessageRequest {
                model: &self.settings.model,
                max_tokens: self.settings.max_tokens,
                system: SYSTEM_PROMPT,
                tools: &self.tools,
                messages: &transcript,
            };
            let response = self.model.create_message(&request).await?;
            debug!("Turn {}: assistant's message: {:?}", turn, response.content);

            let content = response.content;
            if let Some(ContentBlock::Text { text }) = content.first() {
                if text.contains(VERDICT_MARKER) {
                    let conclusion = match parse_verdict(text) {
                        Some(verdict) => Conclusion::Verdict(verdict),
                        None => {
                            warn!("Model returned an unparseable verdict: {}", text);
                            Conclusion::MalformedVerdict { raw: text.clone() }
                        }
                    };
                    transcript.push(Message::assistant(content));
                    return Ok(Conversation {
                        conclusion,
                        turns: turn,
                        transcript,
                    });
                }
            }

            // Every call in the turn runs at once; results keep call order
            let calls = content.iter().filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(bridge.handle(id, name, input)),
                _ => None,
            });
            let mut results = Vec::new();
            for outcome in join_all(calls).await {
                if let Some(result) = outcome? {
                    results.push(result.into_block());
                }
            }

            transcript.push(Message::assistant(content));
            if results.is_empty() {
                debug!("Turn {}: nothing to execute, asking again", turn);
                continue;
            }
            transcript.push(Message::tool_results(results));
        }

        warn!(
            "No verdict after {} turn(s), giving up",
            self.settings.max_turns
        );
        Ok(Conversation {
            conclusion: Conclusion::StepLimitExceeded {
                turns: self.settings.max_turns,
            },
            turns: self.settings.max_turns,
            transcript,
        })
    }
}

/// Extract the verdict object from a completion message.
///
/// The JSON may be surrounded by prose or a code fence. Each `{` before an
/// occurrence of the marker is tried, nearest first, and the first one that
/// starts a valid verdict object wins.
pub fn parse_verdict(text: &str) -> Option<Verdict> {
    text.match_indices(VERDICT_MARKER).find_map(|(marker, _)| {
        text[..marker].rmatch_indices('{').find_map(|(start, _)| {
            serde_json::Deserializer::from_str(&text[start..])
                .into_iter::<Verdict>()
                .next()?
                .ok()
        })
    })
}
