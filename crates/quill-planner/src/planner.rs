//! Sequential planner.
//!
//! Asks a language model to break a goal into a sequence of registered
//! functions, then parses the answer into a [`Plan`].  The model sees a
//! "function manual" listing every available function with its inputs.

use std::sync::Arc;

use quill_kernel::{
    ContextVariables, FunctionRegistry, FunctionView, RequestSettings, SkContext, SkFunction,
    TextCompletion,
};
use quill_template::{PromptConfig, SemanticFunction};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PlanError, Result};
use crate::parser::{MissingFunctionPolicy, SequentialPlanParser};
use crate::plan::Plan;

/// Plugin the planning function belongs to.  Its functions never appear in
/// the manual.
pub const PLANNER_PLUGIN: &str = "SequentialPlanner";

const PLANNER_FUNCTION: &str = "create_plan";

/// Variable the function manual is passed in.
pub const AVAILABLE_FUNCTIONS_KEY: &str = "available_functions";

/// Built-in planning prompt.  Reads `$available_functions` and `$input`.
pub const DEFAULT_PLANNER_PROMPT: &str = r#"Create an XML plan step by step to satisfy the goal given, using only the functions listed below.

To create a plan, follow these rules:
1. A plan is a list of <function.{PluginName}.{FunctionName}/> elements inside a single <plan> element.
2. Only use functions from the list below. Never invent a function.
3. Pass inputs to a function as XML attributes named after the function's inputs.
4. To keep the output of a step for a later step, add setContextVariable="NAME" and refer to it later as $NAME.
5. To add the output of a step to the final answer, add appendToResult="RESULT__NAME".
6. Write only the plan. Do not explain it.

[AVAILABLE FUNCTIONS]

{{$available_functions}}

[END AVAILABLE FUNCTIONS]

[EXAMPLE]
Goal: summarize the notes and email the summary to Ana
<plan>
  <function.writer.summarize input="$notes" setContextVariable="SUMMARY"/>
  <function.email.send input="$SUMMARY" to="Ana" appendToResult="RESULT__EMAIL"/>
</plan>
[END EXAMPLE]

Goal: {{$input}}
"#;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Planner settings, loadable from TOML:
///
/// ```toml
/// max_tokens = 2048
/// excluded_plugins = ["admin"]
/// missing_functions = "fail"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Completion budget for the planning call.
    pub max_tokens: u32,
    /// Plugins hidden from the planner.
    pub excluded_plugins: Vec<String>,
    /// Functions hidden from the planner, by name.
    pub excluded_functions: Vec<String>,
    /// When non-empty, only these functions (by name or `plugin.name`) are
    /// offered.
    pub included_functions: Vec<String>,
    pub missing_functions: MissingFunctionPolicy,
    /// Replaces [`DEFAULT_PLANNER_PROMPT`].
    pub prompt_template: Option<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            excluded_plugins: Vec::new(),
            excluded_functions: Vec::new(),
            included_functions: Vec::new(),
            missing_functions: MissingFunctionPolicy::default(),
            prompt_template: None,
        }
    }
}

impl PlannerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PlanError::Config {
            reason: format!("failed to parse planner config: {e}"),
        })
    }

    fn offers(&self, view: &FunctionView) -> bool {
        let qualified = view.qualified_name();

        if view.plugin_name.eq_ignore_ascii_case(PLANNER_PLUGIN)
            || self
                .excluded_plugins
                .iter()
                .any(|p| p.eq_ignore_ascii_case(&view.plugin_name))
            || self
                .excluded_functions
                .iter()
                .any(|f| f.eq_ignore_ascii_case(&view.name))
        {
            return false;
        }

        self.included_functions.is_empty()
            || self
                .included_functions
                .iter()
                .any(|f| f.eq_ignore_ascii_case(&view.name) || f.eq_ignore_ascii_case(&qualified))
    }
}

// ---------------------------------------------------------------------------
// SequentialPlanner
// ---------------------------------------------------------------------------

pub struct SequentialPlanner {
    registry: Arc<dyn FunctionRegistry>,
    config: PlannerConfig,
    planning_function: SemanticFunction,
}

impl SequentialPlanner {
    pub fn new(
        registry: Arc<dyn FunctionRegistry>,
        completion: Arc<dyn TextCompletion>,
        config: PlannerConfig,
    ) -> Result<Self> {
        let template = config
            .prompt_template
            .clone()
            .unwrap_or_else(|| DEFAULT_PLANNER_PROMPT.to_owned());
        let prompt_config = PromptConfig::default()
            .with_description("Turn a goal into a step by step plan of available functions")
            .with_completion(RequestSettings::default().with_max_tokens(config.max_tokens));

        let planning_function = SemanticFunction::new(
            PLANNER_PLUGIN,
            PLANNER_FUNCTION,
            template,
            prompt_config,
            completion,
        )?;

        Ok(Self {
            registry,
            config,
            planning_function,
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Ask the model for a plan that reaches `goal`.
    pub async fn create_plan(&self, goal: &str, settings: &RequestSettings) -> Result<Plan> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(PlanError::PlanningFailed {
                reason: "the goal is empty".into(),
            });
        }

        let manual = self.function_manual();
        debug!(goal, manual_len = manual.len(), "requesting plan");

        let mut variables = ContextVariables::with_input(goal);
        variables.set(AVAILABLE_FUNCTIONS_KEY, manual);
        let context = SkContext::new(variables, Arc::clone(&self.registry));

        let result = self
            .planning_function
            .invoke(context, settings)
            .await
            .map_err(|e| {
                warn!(goal, error = %e, "planning call failed");
                PlanError::PlanningFailed {
                    reason: e.to_string(),
                }
            })?;

        let content = result.result().to_owned();
        let mut plan = Plan::new(goal);
        SequentialPlanParser::new(Arc::clone(&self.registry))
            .with_missing_functions(self.config.missing_functions)
            .parse(&content, &mut plan)?;
        plan.content = content;

        if plan.steps.is_empty() {
            return Err(PlanError::EmptyPlan {
                goal: goal.to_owned(),
            });
        }

        info!(goal, step_count = plan.steps.len(), "plan created");
        Ok(plan)
    }

    /// Describe every function the planner may use.
    pub fn function_manual(&self) -> String {
        self.registry
            .views()
            .iter()
            .filter(|view| self.config.offers(view))
            .map(describe_function)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl std::fmt::Debug for SequentialPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequentialPlanner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn describe_function(view: &FunctionView) -> String {
    let mut text = format!(
        "{}:\n  description: {}\n  inputs:",
        view.qualified_name(),
        view.description
    );
    for parameter in &view.parameters {
        text.push_str(&format!("\n  - {}: {}", parameter.name, parameter.description));
        if !parameter.default_value.is_empty() {
            text.push_str(&format!(" (default value: {})", parameter.default_value));
        }
    }
    text
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
