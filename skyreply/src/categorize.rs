//! Batch categorization stage.

use std::collections::BTreeMap;

use tracing::{info, instrument, warn};

use crate::core::categories::{
    Assignment, CategorizationDegraded, apply_assignments, decode_assignments, degrade_all,
};
use crate::core::router::Persona;
use crate::core::types::PostRecord;
use crate::io::backend::Backend;
use crate::io::prompt::PromptBuilder;
use crate::responder::Responder;

/// How categorization went for a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategorizationOutcome {
    /// Backend labels were applied; `labeled` posts got an entry.
    Applied { labeled: usize },
    /// Every post carries the sentinel.
    Degraded(CategorizationDegraded),
}

/// Label every post in place with one backend call.
///
/// Never fails: any problem leaves the batch labeled `Not Categorized`.
/// Batch length and order are unchanged.
#[instrument(skip_all, fields(posts = posts.len()))]
pub fn categorize<B: Backend>(
    posts: &mut [PostRecord],
    backend: &B,
    prompts: &PromptBuilder,
) -> CategorizationOutcome {
    if posts.is_empty() {
        return CategorizationOutcome::Applied { labeled: 0 };
    }

    let outcome = request_assignments(posts, backend, prompts).map(|assignments| {
        apply_assignments(posts, &assignments);
        posts
            .iter()
            .filter(|post| assignments.contains_key(&post.sequence_number))
            .count()
    });

    match outcome {
        Ok(labeled) => {
            info!(labeled, "categorized batch");
            CategorizationOutcome::Applied { labeled }
        }
        Err(degraded) => {
            warn!(reason = %degraded, "categorization degraded");
            degrade_all(posts);
            CategorizationOutcome::Degraded(degraded)
        }
    }
}

fn request_assignments<B: Backend>(
    posts: &[PostRecord],
    backend: &B,
    prompts: &PromptBuilder,
) -> Result<BTreeMap<u32, Assignment>, CategorizationDegraded> {
    let prompt = prompts
        .render_categorize(posts)
        .map_err(|err| CategorizationDegraded::Backend(format!("{err:#}")))?;
    let raw = Responder::new(Persona::Strategist, backend)
        .generate(&prompt)
        .map_err(|err| CategorizationDegraded::Backend(err.to_string()))?;
    decode_assignments(&raw)
}
