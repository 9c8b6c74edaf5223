//! Social-network collaborator interface.

use anyhow::Result;
use serde::Serialize;

use crate::core::types::RawPost;
use crate::io::media::ImageAttachment;

/// Success report from a network-mutating action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionReport {
    pub message: String,
}

impl ActionReport {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Operations the workflows need from the social network.
///
/// No dedup key is passed, so callers must invoke each mutating action at
/// most once per approved action.
pub trait SocialNetwork {
    /// Latest posts from followed accounts, newest first.
    fn fetch_timeline(&self, limit: u32) -> Result<Vec<RawPost>>;
    fn post(&self, text: &str, image: Option<&ImageAttachment>) -> Result<ActionReport>;
    fn reply(&self, target: &str, text: &str) -> Result<ActionReport>;
    fn like(&self, target: &str) -> Result<ActionReport>;
}
