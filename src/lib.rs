//! po-translate - gettext catalog translation with LLM providers
//!
//! Scans a folder for `.po` files, works out which entries still need a
//! translation, and fills them in through OpenAI, Anthropic, DeepSeek, Azure
//! OpenAI or a local Ollama server, saving progress as it goes.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod interrupt;
pub mod language;
pub mod provider;
pub mod translate;
pub mod workflow;
