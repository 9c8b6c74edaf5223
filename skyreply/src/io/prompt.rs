//! Prompt rendering for backend calls.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::router::Persona;
use crate::core::types::{Category, PostRecord};

const CATEGORIZE_TEMPLATE: &str = include_str!("prompts/categorize.md");
const DRAFT_TEMPLATE: &str = include_str!("prompts/draft.md");
const REWRITE_TEMPLATE: &str = include_str!("prompts/rewrite.md");
const COMPOSE_TEMPLATE: &str = include_str!("prompts/compose.md");

/// Post fields exposed to the categorize template.
#[derive(Debug, Clone, Serialize)]
struct PostContext<'a> {
    number: u32,
    author: &'a str,
    text: &'a str,
}

impl<'a> PostContext<'a> {
    fn from_record(post: &'a PostRecord) -> Self {
        Self {
            number: post.sequence_number,
            author: &post.author_label,
            text: post.body_text.trim(),
        }
    }
}

/// Renders the four prompt kinds from embedded templates.
pub struct PromptBuilder {
    env: Environment<'static>,
}

impl PromptBuilder {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("categorize", CATEGORIZE_TEMPLATE)
            .context("load categorize template")?;
        env.add_template("draft", DRAFT_TEMPLATE)
            .context("load draft template")?;
        env.add_template("rewrite", REWRITE_TEMPLATE)
            .context("load rewrite template")?;
        env.add_template("compose", COMPOSE_TEMPLATE)
            .context("load compose template")?;
        Ok(Self { env })
    }

    /// Whole-batch categorization request.
    pub fn render_categorize(&self, posts: &[PostRecord]) -> Result<String> {
        let posts: Vec<PostContext<'_>> = posts.iter().map(PostContext::from_record).collect();
        self.render("categorize", context! { posts => posts })
    }

    /// Reply draft for one post in the persona's tone.
    ///
    /// The leaning line is left out when the post has no real category.
    pub fn render_draft(
        &self,
        post: &PostRecord,
        persona: Persona,
        budget: usize,
    ) -> Result<String> {
        let leaning = post
            .category
            .filter(|category| *category != Category::NotCategorized)
            .map(Category::as_str);
        self.render(
            "draft",
            context! {
                author => post.author_label.as_str(),
                text => post.body_text.trim(),
                category => leaning,
                tone => persona.tone_directive(),
                budget => budget,
            },
        )
    }

    /// Edit of human-written reply text, optionally with the post it answers.
    pub fn render_rewrite(
        &self,
        original: Option<&str>,
        text: &str,
        budget: usize,
    ) -> Result<String> {
        self.render(
            "rewrite",
            context! {
                original => original.map(str::trim).filter(|s| !s.is_empty()),
                text => text.trim(),
                budget => budget,
            },
        )
    }

    /// Rewrite of an original post message.
    pub fn render_compose(&self, text: &str, budget: usize) -> Result<String> {
        self.render(
            "compose",
            context! {
                text => text.trim(),
                budget => budget,
            },
        )
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        let rendered = template
            .render(ctx)
            .with_context(|| format!("render {name} prompt"))?;
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::post;

    #[test]
    fn categorize_lists_every_post_in_order() {
        let posts = vec![post(1, "alice", "first"), post(2, "bob", "second")];
        let prompt = PromptBuilder::new()
            .expect("builder")
            .render_categorize(&posts)
            .expect("render");
        let first = prompt.find("1. alice: first").expect("first post");
        let second = prompt.find("2. bob: second").expect("second post");
        assert!(first < second);
        assert!(prompt.contains("Not Categorized"));
    }

    #[test]
    fn draft_carries_tone_budget_and_leaning() {
        let mut target = post(3, "carol", "taxes are theft");
        target.category = Some(Category::FarRight);
        let prompt = PromptBuilder::new()
            .expect("builder")
            .render_draft(&target, Persona::Advocate, 200)
            .expect("render");
        assert!(prompt.contains("Author: carol"));
        assert!(prompt.contains("Leaning: far-right"));
        assert!(prompt.contains(Persona::Advocate.tone_directive()));
        assert!(prompt.contains("At most 200 characters"));
    }

    #[test]
    fn draft_omits_leaning_when_uncategorized() {
        let target = post(1, "dave", "hello");
        let prompt = PromptBuilder::new()
            .expect("builder")
            .render_draft(&target, Persona::Advocate, 200)
            .expect("render");
        assert!(!prompt.contains("Leaning:"));
    }

    #[test]
    fn draft_omits_leaning_for_degraded_category() {
        let mut target = post(2, "erin", "hello again");
        target.category = Some(Category::NotCategorized);
        let prompt = PromptBuilder::new()
            .expect("builder")
            .render_draft(&target, Persona::Advocate, 200)
            .expect("render");
        assert!(!prompt.contains("Leaning:"));
        assert!(!prompt.contains("Not Categorized"));
        assert!(prompt.contains("Text: hello again"));
    }

    #[test]
    fn rewrite_includes_original_only_when_present() {
        let builder = PromptBuilder::new().expect("builder");
        let with = builder
            .render_rewrite(Some("the post"), "my reply", 180)
            .expect("render");
        assert!(with.contains("<post>"));
        assert!(with.contains("my reply"));
        assert!(with.contains("At most 180 characters"));

        let without = builder.render_rewrite(None, "my reply", 180).expect("render");
        assert!(!without.contains("<post>"));
    }

    #[test]
    fn compose_uses_xml_sections() {
        let prompt = PromptBuilder::new()
            .expect("builder")
            .render_compose("big news today", 180)
            .expect("render");
        assert!(prompt.contains("<message>"));
        assert!(prompt.contains("</message>"));
        assert!(prompt.contains("big news today"));
    }
}
