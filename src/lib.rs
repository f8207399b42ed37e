//! Lingua Coach - Scenario-based English practice
//!
//! A language-learning chat application core:
//! - Role-play dialogs driven by a chat-completions API
//! - On-demand hints: translation, answer options, cultural and grammar notes
//! - Aggressive-language gate with incident logging
//! - JSON-file persistence for transcripts, journals, the error profile
//!   and the coin ledger
//! - Mistake-driven practice sessions with coin rewards
//!
//! # Example
//!
//! ```ignore
//! use lingua_coach::llm::ChatClient;
//! use lingua_coach::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let client = ChatClient::from_config(&config)?;
//!     Ok(())
//! }
//! ```

// Core modules (order matters for cross-module dependencies)
pub mod types;
pub mod config;
pub mod secrets;
pub mod llm;
pub mod prompts;
pub mod scenarios;
pub mod filter;
pub mod store;   // Must come before practice since practice depends on store
pub mod practice;
pub mod help;
pub mod analyzer;
pub mod chat;
pub mod cli;

// Re-export commonly used types for convenience
pub use chat::{ChatSession, TurnOutcome};
pub use config::Config;
pub use filter::{AggressionClassifier, KeywordClassifier};
pub use llm::{ChatClient, LanguageModel};
pub use practice::{ErrorProfileTracker, PracticeService};
pub use store::{CoinsLedger, DialogRecord, LogStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Scenario-based English practice", NAME, VERSION)
}
