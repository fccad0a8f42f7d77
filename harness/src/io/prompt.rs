//! Reflection prompt rendering.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

const REFLECT_TEMPLATE: &str = include_str!("prompts/reflect.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("reflect", REFLECT_TEMPLATE)
            .context("load reflect template")?;
        Ok(Self { env })
    }

    /// Block reason for reflection cycle `iteration` of `max`.
    pub fn render_reflect(&self, iteration: u32, max: u32, original_request: &str) -> Result<String> {
        let template = self.env.get_template("reflect")?;
        let original_request = original_request.trim();
        let rendered = template.render(context! {
            iteration => iteration,
            max => max,
            original_request => (!original_request.is_empty()).then_some(original_request),
        })?;
        Ok(rendered.trim().to_string())
    }
}
