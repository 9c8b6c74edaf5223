//! Persona-bound generators and output shaping.

use tracing::{debug, instrument, warn};

use crate::core::extract::salvage;
use crate::core::normalize::normalize;
use crate::core::router::{Persona, route};
use crate::core::types::{CandidateOrigin, CandidateReply, Category};
use crate::error::WorkflowError;
use crate::io::backend::Backend;

/// A backend playing one persona.
pub struct Responder<'a, B> {
    persona: Persona,
    backend: &'a B,
}

impl<'a, B: Backend> Responder<'a, B> {
    pub fn new(persona: Persona, backend: &'a B) -> Self {
        Self { persona, backend }
    }

    /// Responder the router picks for a post category.
    pub fn for_category(category: Category, backend: &'a B) -> Self {
        Self::new(route(category), backend)
    }

    pub fn persona(&self) -> Persona {
        self.persona
    }

    #[instrument(skip_all, fields(persona = %self.persona))]
    pub fn generate(&self, prompt: &str) -> Result<String, WorkflowError> {
        match self.backend.complete(self.persona, prompt) {
            Ok(raw) => {
                debug!(chars = raw.chars().count(), "generated");
                Ok(raw)
            }
            Err(err) => {
                warn!(err = %format!("{err:#}"), "backend call failed");
                Err(WorkflowError::collaborator("backend", &err))
            }
        }
    }
}

/// Turn raw backend output into a candidate.
///
/// Runs normalization and every extraction tier. When no tier finds text,
/// the raw-if-short fallback becomes a [`CandidateOrigin::Fallback`]
/// candidate. Returns `None` when there is nothing usable at all.
pub fn shape_output(
    origin: CandidateOrigin,
    raw: &str,
    priority_fields: &[&str],
    budget: usize,
) -> Option<CandidateReply> {
    let normalized = normalize(raw);
    let salvaged = salvage(&normalized, priority_fields);
    match salvaged.chosen {
        Ok(found) => {
            debug!(tier = ?found.tier, source = %found.source, "extracted reply text");
            Some(CandidateReply::new(
                origin,
                raw,
                found.text,
                salvaged.fallback,
                budget,
            ))
        }
        Err(err) => {
            debug!(%err, has_fallback = salvaged.fallback.is_some(), "extraction failed");
            salvaged
                .fallback
                .map(|text| CandidateReply::new(CandidateOrigin::Fallback, raw, text, None, budget))
        }
    }
}
