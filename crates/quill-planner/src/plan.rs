//! Plan model.
//!
//! A [`Plan`] is a tree: a leaf wraps exactly one function, an inner plan
//! holds ordered child plans (its steps).  Plans are functions themselves, so
//! a plan can be a step of another plan or be registered with a kernel.
//!
//! Execution lives in [`crate::executor`]; this module holds the data, the
//! [`SkFunction`] implementation and the JSON text form.

use std::sync::Arc;

use async_trait::async_trait;
use quill_kernel::{
    ContextVariables, FunctionRegistry, FunctionView, KernelError, ParameterView,
    RequestSettings, SkContext, SkFunction,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{PlanError, Result};

/// Plugin name given to plans that do not wrap a function.
pub const PLAN_PLUGIN: &str = "_PLAN_";

/// State key accumulating the results a plan surfaces to its caller.
pub const PLAN_RESULT_KEY: &str = "PLAN.RESULT";

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// A tree of steps.
///
/// Calling [`run`](Plan::run) on the same plan from two tasks at once is not
/// supported; each execution needs exclusive access to the plan's state.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub name: String,
    pub plugin_name: String,
    #[serde(default)]
    pub description: String,

    /// Step defaults: parameter name to default value, possibly holding
    /// `$name` references resolved when the step runs.
    #[serde(default)]
    pub parameters: ContextVariables,

    /// Raw planner output this plan was parsed from.
    #[serde(default)]
    pub content: String,

    /// Accumulated answer surfaced to the caller.
    #[serde(default)]
    pub answer: String,

    /// Variables carried across steps.
    #[serde(default)]
    pub state: ContextVariables,

    #[serde(default)]
    pub steps: Vec<Plan>,

    /// Names this plan surfaces to its caller.
    #[serde(default)]
    pub outputs: Vec<String>,

    #[serde(default)]
    pub next_step_index: usize,

    #[serde(skip)]
    function: Option<Arc<dyn SkFunction>>,
}

impl Plan {
    /// An empty plan for `goal`.
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            name: format!("plan{}", Uuid::now_v7().simple()),
            plugin_name: PLAN_PLUGIN.to_owned(),
            description: goal.into(),
            parameters: ContextVariables::new(),
            content: String::new(),
            answer: String::new(),
            state: ContextVariables::new(),
            steps: Vec::new(),
            outputs: Vec::new(),
            next_step_index: 0,
            function: None,
        }
    }

    /// A leaf plan wrapping `function`, with the function's declared defaults
    /// as step parameters.
    pub fn from_function(function: Arc<dyn SkFunction>) -> Self {
        let view = function.describe();
        let mut parameters = ContextVariables::new();
        for parameter in &view.parameters {
            parameters.set(parameter.name.clone(), parameter.default_value.clone());
        }

        Self {
            name: view.name,
            plugin_name: view.plugin_name,
            description: view.description,
            parameters,
            function: Some(function),
            ..Self::new("")
        }
    }

    /// A plan for `goal` whose steps are `steps`.
    pub fn with_steps(goal: impl Into<String>, steps: impl IntoIterator<Item = Plan>) -> Self {
        let mut plan = Self::new(goal);
        plan.add_steps(steps);
        plan
    }

    pub fn add_step(&mut self, step: Plan) {
        self.steps.push(step);
    }

    pub fn add_steps(&mut self, steps: impl IntoIterator<Item = Plan>) {
        self.steps.extend(steps);
    }

    /// Whether [`run`](Plan::run) has a step left to execute.
    pub fn has_next_step(&self) -> bool {
        self.next_step_index < self.steps.len()
    }

    /// The wrapped function, for leaf plans.
    pub fn function(&self) -> Option<&Arc<dyn SkFunction>> {
        self.function.as_ref()
    }

    /// Set a step default.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.set(name, value);
        self
    }

    /// Declare a name this plan surfaces to its caller.
    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    // -----------------------------------------------------------------------
    // Text form
    // -----------------------------------------------------------------------

    /// Serialize the plan, including its state and progress, to JSON.
    pub fn to_text_form(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Restore a plan from [`to_text_form`](Plan::to_text_form) output,
    /// reattaching leaf functions through `registry`.
    pub fn from_text_form(json: &str, registry: &dyn FunctionRegistry) -> Result<Self> {
        let mut plan: Plan = serde_json::from_str(json)?;
        plan.attach_functions(registry)?;
        Ok(plan)
    }

    fn attach_functions(&mut self, registry: &dyn FunctionRegistry) -> Result<()> {
        if self.steps.is_empty() {
            if self.plugin_name != PLAN_PLUGIN {
                let function = registry
                    .resolve(Some(&self.plugin_name), &self.name)
                    .ok_or_else(|| PlanError::FunctionNotFound {
                        plugin: self.plugin_name.clone(),
                        function: self.name.clone(),
                    })?;
                self.function = Some(function);
            }
            return Ok(());
        }

        for step in &mut self.steps {
            step.attach_functions(registry)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Plans as functions
// ---------------------------------------------------------------------------

#[async_trait]
impl SkFunction for Plan {
    fn describe(&self) -> FunctionView {
        if let Some(function) = &self.function {
            return function.describe();
        }

        FunctionView {
            name: self.name.clone(),
            plugin_name: self.plugin_name.clone(),
            description: self.description.clone(),
            parameters: self
                .parameters
                .iter()
                .map(|(name, default)| ParameterView::new(name).with_default(default))
                .collect(),
        }
    }

    /// A leaf plan calls its function with the plan state layered under the
    /// caller's variables.  Any other plan runs its remaining steps on a copy
    /// of itself, feeding each step's result back into the context.
    async fn invoke(
        &self,
        mut context: SkContext,
        settings: &RequestSettings,
    ) -> quill_kernel::Result<SkContext> {
        if let Some(function) = &self.function {
            for (name, value) in self.state.iter() {
                if !context.variables.contains_key(name) {
                    context.variables.set(name, value);
                }
            }
            return function.invoke(context, settings).await;
        }

        debug!(plan = %self.name, steps = self.steps.len(), "invoking plan");

        let mut plan = self.clone();
        while plan.has_next_step() {
            let index = plan.next_step_index;
            plan.run(&context, settings)
                .await
                .map_err(|e| KernelError::InvocationFailed {
                    function: plan.name.clone(),
                    reason: e.to_string(),
                })?;

            let result = plan
                .state
                .get(PLAN_RESULT_KEY)
                .unwrap_or(plan.state.input())
                .to_owned();
            context.variables.update(result);

            if let Some(step) = plan.steps.get(index) {
                for name in &step.outputs {
                    if let Some(value) = plan.state.get(name) {
                        context.variables.set(name.clone(), value);
                    }
                }
            }
        }

        Ok(context)
    }
}

impl std::fmt::Debug for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plan")
            .field("name", &self.name)
            .field("plugin_name", &self.plugin_name)
            .field("description", &self.description)
            .field("steps", &self.steps)
            .field("outputs", &self.outputs)
            .field("next_step_index", &self.next_step_index)
            .field("has_function", &self.function.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
