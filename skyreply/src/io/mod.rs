//! Side-effecting collaborators: configuration, backends, the social
//! network, console interaction and transcripts.

pub mod backend;
pub mod bluesky;
pub mod chat;
pub mod config;
pub mod console;
pub mod media;
pub mod network;
pub mod process;
pub mod prompt;
pub mod transcript;
