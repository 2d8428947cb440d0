//! Step execution.
//!
//! [`Plan::run`] advances a plan by one step.  Before a step runs, its input
//! variables are assembled from three tiers: the caller's variables, the
//! plan's accumulated state, and the step's own defaults
//! ([`Plan::resolve_step_variables`]).  Defaults may reference other
//! variables as `$name`; [`expand`] substitutes them.

use std::sync::LazyLock;

use quill_kernel::{ContextVariables, INPUT_KEY, RequestSettings, SkContext, SkFunction};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{PlanError, Result};
use crate::plan::{PLAN_RESULT_KEY, Plan};

static VARIABLE_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\w+)").expect("variable reference pattern is valid"));

impl Plan {
    /// Run the next step.
    ///
    /// `context` supplies the caller's variables and the registry.  On
    /// failure the step index is left unchanged, so the same step runs
    /// again on the next call.  Does nothing once every step has run.
    pub async fn run(&mut self, context: &SkContext, settings: &RequestSettings) -> Result<()> {
        let index = self.next_step_index;
        let Some(step) = self.steps.get(index) else {
            debug!(plan = %self.name, "plan has no steps left");
            return Ok(());
        };

        let step_name = step.describe().qualified_name();
        let step_outputs = step.outputs.clone();
        let step_variables = self.resolve_step_variables(&context.variables, step);

        debug!(plan = %self.name, step = %step_name, index, "running plan step");

        let result_context = step
            .invoke(context.with_variables(step_variables), settings)
            .await
            .map_err(|source| {
                warn!(plan = %self.name, step = %step_name, index, error = %source, "plan step failed");
                PlanError::StepFailed {
                    step_index: index,
                    step: step_name.clone(),
                    source,
                }
            })?;

        let result = result_context.result().trim().to_owned();
        self.state.update(result.clone());

        let surfaces_output = step_outputs
            .iter()
            .any(|name| self.outputs.iter().any(|o| o.eq_ignore_ascii_case(name)));
        if surfaces_output {
            let answer = match self.state.get(PLAN_RESULT_KEY) {
                Some(previous) => format!("{previous}\n{result}"),
                None => result.clone(),
            };
            self.state.set(PLAN_RESULT_KEY, answer.clone());
            self.answer = answer;
        }

        for name in &step_outputs {
            let value = result_context
                .variables
                .get(name)
                .map_or_else(|| result.clone(), str::to_owned);
            self.state.set(name.clone(), value);
        }

        self.next_step_index += 1;
        info!(plan = %self.name, step = %step_name, index, remaining = self.steps.len() - self.next_step_index, "plan step completed");
        Ok(())
    }

    /// Compute the variables `step` runs with.
    ///
    /// Caller variables win over plan state, which wins over step defaults.
    /// The exception is a default that references variables (`$name`) that
    /// resolve: the expanded default is used as is.
    pub fn resolve_step_variables(
        &self,
        variables: &ContextVariables,
        step: &Plan,
    ) -> ContextVariables {
        let state = &self.state;

        let default_input = step.parameters.input();
        let input = if !default_input.is_empty() {
            expand(default_input, variables, state)
        } else if !variables.input().is_empty() {
            variables.input().to_owned()
        } else if !state.input().is_empty() {
            state.input().to_owned()
        } else if !step.steps.is_empty() {
            String::new()
        } else {
            step.description.clone()
        };

        let mut resolved = ContextVariables::with_input(input);

        for parameter in step.describe().parameters {
            if parameter.name.eq_ignore_ascii_case(INPUT_KEY) {
                continue;
            }
            // Defaults with resolvable references are handled below.
            let defers_to_default = step
                .parameters
                .get(&parameter.name)
                .is_some_and(|default| expand(default, variables, state) != default);
            if defers_to_default {
                continue;
            }

            if let Some(value) = variables.get(&parameter.name) {
                resolved.set(parameter.name, value);
            } else if let Some(value) = state.get(&parameter.name).filter(|v| !v.is_empty()) {
                resolved.set(parameter.name, value);
            }
        }

        for (name, default) in step.parameters.iter() {
            if resolved.contains_key(name) {
                continue;
            }

            let expanded = expand(default, variables, state);
            if expanded != default {
                resolved.set(name, expanded);
            } else if let Some(value) = variables.get(name) {
                resolved.set(name, value);
            } else if let Some(value) = state.get(name) {
                resolved.set(name, value);
            } else {
                resolved.set(name, default);
            }
        }

        for (name, value) in variables.iter() {
            if !resolved.contains_key(name) {
                resolved.set(name, value);
            }
        }

        resolved
    }
}

/// Replace `$name` references in `input` with values from `primary`, falling
/// back to `fallback`.
///
/// Longer names are matched first, so `$shortlong` is never read as `$short`
/// followed by `long` when both exist.  Unknown names are left in place.
/// Substituted values are not expanded again.
pub fn expand(input: &str, primary: &ContextVariables, fallback: &ContextVariables) -> String {
    if !input.contains('$') {
        return input.to_owned();
    }

    let mut names: Vec<&str> = VARIABLE_REFERENCE
        .captures_iter(input)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|name| primary.contains_key(name) || fallback.contains_key(name))
        .collect();
    if names.is_empty() {
        return input.to_owned();
    }
    names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    names.dedup();

    let alternation: Vec<String> = names.iter().map(|name| regex::escape(name)).collect();
    let pattern = match Regex::new(&format!(r"\$(?:{})", alternation.join("|"))) {
        Ok(pattern) => pattern,
        Err(e) => {
            warn!(error = %e, "could not build variable expansion pattern");
            return input.to_owned();
        }
    };

    pattern
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let reference = &caps[0];
            let name = &reference[1..];
            primary
                .get(name)
                .or_else(|| fallback.get(name))
                .unwrap_or(reference)
                .to_owned()
        })
        .into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
