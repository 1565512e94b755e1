//! Scribe core library — Slack event relay, reply policy, and per-conversation
//! transcripts, used by the CLI.

pub mod channels;
pub mod config;
pub mod gateway;
pub mod init;
pub mod llm;
pub mod policy;
pub mod transcript;
