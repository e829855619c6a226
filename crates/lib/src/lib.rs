//! Meshbot core library — mesh device session, channel discovery, the
//! listener loop, command dispatch, and chat-side relay used by the CLI binary.

pub mod chat;
pub mod commands;
pub mod config;
pub mod mesh;
pub mod message;
pub mod relay;
