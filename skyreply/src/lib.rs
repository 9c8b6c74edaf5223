//! Human-gated reply orchestration for a Bluesky timeline.
//!
//! The crate drafts original posts and replies to timeline posts through a
//! generative backend, with a human approval gate before anything reaches
//! the network. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (normalization, tiered
//!   extraction, length budgets, routing, categorization decoding). No I/O.
//! - **[`io`]**: Side-effecting collaborators (backends, Bluesky XRPC,
//!   console, config, transcripts) behind traits so tests can fake them.
//!
//! Orchestration modules ([`reply`], [`post`], [`menu`]) drive a
//! [`session::WorkflowSession`] through the stages ([`categorize`],
//! [`draft`], [`approval`]) and end in a [`session::Outcome`].

pub mod approval;
pub mod categorize;
pub mod core;
pub mod draft;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod menu;
pub mod post;
pub mod reply;
pub mod responder;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
