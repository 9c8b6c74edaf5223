//! Persona table and category-to-responder routing.

use std::fmt;

use serde::Serialize;

use crate::core::types::Category;

/// Persona-bound generators the backend is asked to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// Categorizes batches and rewrites/composes text. Never routed to.
    Strategist,
    /// Default responder.
    Advocate,
    /// Calm responder for the most polarized posts.
    Mediator,
}

impl Persona {
    pub fn as_str(self) -> &'static str {
        match self {
            Persona::Strategist => "strategist",
            Persona::Advocate => "advocate",
            Persona::Mediator => "mediator",
        }
    }

    /// System message sent ahead of every prompt for this persona.
    pub fn system_message(self) -> &'static str {
        match self {
            Persona::Strategist => {
                "You are the strategist. You read social posts carefully, classify their \
                 political leaning, and edit draft text so it is clear and concise while \
                 keeping the author's intent and tone. Always answer with a single JSON object \
                 or array and nothing else."
            }
            Persona::Advocate => {
                "You are the advocate, a reactive responder. You reply to social posts from a \
                 left-leaning perspective in an assertive, progressive tone. Always answer with \
                 a JSON object containing 'status', 'formatted_message' and 'result' fields."
            }
            Persona::Mediator => {
                "You are the mediator. You reply with equanimity in a soothing, balanced, \
                 centrist tone that lowers the temperature of the conversation. Always answer \
                 with a JSON object containing 'status', 'formatted_message' and 'result' fields."
            }
        }
    }

    /// Tone contract inserted into drafting prompts.
    pub fn tone_directive(self) -> &'static str {
        match self {
            Persona::Strategist => "neutral and clear",
            Persona::Advocate => "assertive and progressive",
            Persona::Mediator => "calm, balanced and conciliatory",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categories answered by the mediator; everything else goes to the advocate.
const MEDIATOR_CATEGORIES: &[Category] = &[Category::FarLeft];

/// Pick the responder persona for a post category.
pub fn route(category: Category) -> Persona {
    if MEDIATOR_CATEGORIES.contains(&category) {
        Persona::Mediator
    } else {
        Persona::Advocate
    }
}
