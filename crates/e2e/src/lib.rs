//! AIQA test execution
//!
//! Natural-language end-to-end tests: each instruction is handed to a
//! computer-use model that drives a real browser and reports a verdict.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TestScheduler                           │
//! │    ├── run_all(files) -> RunSummary   (sliding window)      │
//! │    └── run_file(file) -> FileResult                         │
//! │          before_all → [before_each → converse → after_each]  │
//! │          → after_all                                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ConversationEngine                                         │
//! │    ├── ModelClient::create_message(transcript)              │
//! │    ├── verdict?  → Conclusion                               │
//! │    └── tool_use* → ToolBridge → ActionExecutor (browser)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Test files (YAML)                                          │
//! │    ├── tests: [instruction | {instruction, payload}]        │
//! │    └── before_all / before_each / after_each / after_all    │
//! │          [{run: cmd} | {log: msg}]                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod bridge;
pub mod browser;
pub mod discovery;
pub mod error;
pub mod model;
pub mod playwright;
pub mod prompts;
pub mod runner;
pub mod spec;
pub mod suite;

pub use agent::{parse_verdict, Conclusion, Conversation, ConversationEngine, EngineSettings};
pub use bridge::{ComputerAction, ToolBridge, ToolInvocation, ToolOutput, ToolResult};
pub use browser::{ActionExecutor, BrowserLauncher, BrowserSession, Cursor};
pub use discovery::{discover, load_test_files};
pub use error::{E2eError, E2eResult, HookPhase};
pub use model::{AnthropicClient, ModelClient};
pub use playwright::{PlaywrightConfig, PlaywrightLauncher, PlaywrightSession};
pub use runner::TestScheduler;
pub use spec::{load_test_file, TestFileSpec};
pub use suite::{hook, Hook, SuiteBuilder, TestCase, TestFile, TestSuite};
