//! Templated rendering of policy and generation prompts.
//!
//! Composition is a pure function of its inputs: identical inputs yield
//! byte-identical text. The system instruction variant is selected by
//! `(mode, grid shape)` and must agree with the artifacts the observation
//! actually carries; `compose` rejects inconsistent inputs instead of
//! silently desynchronizing the instruction from the content.

use anyhow::{Context, Result, anyhow};
use minijinja::{Environment, context};

use crate::core::subtask::TrackedSubtask;
use crate::core::types::{GridShape, RepresentationMode};

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const USER_TEMPLATE: &str = include_str!("prompts/user.md");
const GENERATE_TEMPLATE: &str = include_str!("prompts/generate.md");

/// All inputs the composer needs for one tick.
#[derive(Debug, Clone)]
pub struct PromptInputs<'a> {
    pub mode: RepresentationMode,
    pub shape: GridShape,
    /// Native resolution of the sampled buffer; required with the grid.
    pub buffer_dims: Option<(usize, usize)>,
    pub subtasks: &'a [TrackedSubtask],
    pub depth_grid: Option<&'a [Vec<f64>]>,
}

/// Rendered request parts, ready for the policy boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub system: String,
    pub user: String,
}

/// Template engine wrapper around minijinja.
pub struct PromptComposer {
    env: Environment<'static>,
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptComposer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .expect("system template should be valid");
        env.add_template("user", USER_TEMPLATE)
            .expect("user template should be valid");
        env.add_template("generate", GENERATE_TEMPLATE)
            .expect("generate template should be valid");
        Self { env }
    }

    /// Render the system instruction and user message for one observation.
    pub fn compose(&self, inputs: &PromptInputs<'_>) -> Result<ComposedPrompt> {
        if inputs.mode.wants_grid() != inputs.depth_grid.is_some() {
            return Err(anyhow!(
                "mode {} and depth grid presence disagree",
                inputs.mode
            ));
        }
        if inputs.mode.wants_grid() && inputs.buffer_dims.is_none() {
            return Err(anyhow!("mode {} requires buffer dimensions", inputs.mode));
        }

        let (native_width, native_height) = inputs.buffer_dims.unwrap_or((0, 0));
        let system = self
            .env
            .get_template("system")?
            .render(context! {
                mode => inputs.mode.as_str(),
                wants_grid => inputs.mode.wants_grid(),
                wants_map => inputs.mode.wants_map(),
                cols => inputs.shape.cols,
                rows => inputs.shape.rows,
                native_width => native_width,
                native_height => native_height,
            })
            .context("render system template")?;

        let subtask_list =
            serde_json::to_string_pretty(inputs.subtasks).context("render subtask list")?;
        let user = self
            .env
            .get_template("user")?
            .render(context! {
                subtask_list => subtask_list,
                depth_matrix => inputs.depth_grid.map(render_depth_matrix),
            })
            .context("render user template")?;

        Ok(ComposedPrompt { system, user })
    }

    /// Render the subtask-list generation prompt for an instruction.
    pub fn compose_generation(&self, instruction: &str) -> Result<String> {
        self.env
            .get_template("generate")?
            .render(context! { instruction => instruction })
            .context("render generation template")
    }
}

/// One row per line, each row a JSON array, matching the policy's expected
/// wire format.
fn render_depth_matrix(grid: &[Vec<f64>]) -> String {
    let rows = grid
        .iter()
        .map(|row| {
            let rendered = serde_json::to_string(row).expect("serialize depth row");
            format!("  {rendered},")
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("[\n{rows}\n]")
}
