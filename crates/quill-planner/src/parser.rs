//! Parser for planner output.
//!
//! The planning model answers with a `<plan>` fragment:
//!
//! ```xml
//! <plan>
//!   <function.writer.summarize input="$notes" setContextVariable="SUMMARY"/>
//!   <function.writer.translate input="$SUMMARY" language="French" appendToResult="RESULT"/>
//! </plan>
//! ```
//!
//! Model output is often truncated or surrounded by chatter.  When the text
//! does not parse as XML, the first `<plan>` element is cut out with a regex
//! (closing it if needed) and parsed on its own.  That recovery is a
//! heuristic for damaged output, not a second grammar.

use std::sync::{Arc, LazyLock};

use quill_kernel::FunctionRegistry;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PlanError, Result};
use crate::plan::Plan;

const PLAN_TAG: &str = "plan";
const FUNCTION_TAG_PREFIX: &str = "function.";
const SET_CONTEXT_VARIABLE_ATTR: &str = "setContextVariable";
const APPEND_TO_RESULT_ATTR: &str = "appendToResult";

static PLAN_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<plan\b[^>]*>.*?</plan>").expect("plan fragment pattern is valid")
});

/// What to do with a step naming a function the registry does not know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFunctionPolicy {
    /// Drop the step and log a warning.
    #[default]
    Skip,
    /// Fail the parse with [`PlanError::FunctionNotFound`].
    Fail,
}

/// Turns `<plan>` text into plan steps.
pub struct SequentialPlanParser {
    registry: Arc<dyn FunctionRegistry>,
    missing_functions: MissingFunctionPolicy,
}

impl SequentialPlanParser {
    pub fn new(registry: Arc<dyn FunctionRegistry>) -> Self {
        Self {
            registry,
            missing_functions: MissingFunctionPolicy::default(),
        }
    }

    pub fn with_missing_functions(mut self, policy: MissingFunctionPolicy) -> Self {
        self.missing_functions = policy;
        self
    }

    /// Parse `text` and append its steps to `plan`.
    ///
    /// `appendToResult` names are also added to `plan`'s outputs.
    pub fn parse(&self, text: &str, plan: &mut Plan) -> Result<()> {
        let wrapped = format!("<xml>{text}</xml>");
        let first_error = match roxmltree::Document::parse(&wrapped) {
            Ok(document) => return self.collect_steps(&document, plan),
            Err(e) => e,
        };

        let Some(fragment) = recover_plan_fragment(text) else {
            return Err(PlanError::Parse {
                reason: first_error.to_string(),
                text: text.to_owned(),
            });
        };

        warn!(error = %first_error, "plan text is not well-formed, parsing the recovered <plan> fragment");

        let document = roxmltree::Document::parse(&fragment).map_err(|e| PlanError::Parse {
            reason: format!("{first_error}; recovered fragment: {e}"),
            text: format!("{text}\n\nrecovered fragment:\n{fragment}"),
        })?;
        self.collect_steps(&document, plan)
    }

    /// Steps and outputs are only added to `plan` once every element has
    /// been accepted.
    fn collect_steps(&self, document: &roxmltree::Document<'_>, plan: &mut Plan) -> Result<()> {
        let mut steps = Vec::new();
        let mut outputs = Vec::new();
        let plan_nodes = document
            .descendants()
            .filter(|node| node.has_tag_name(PLAN_TAG));

        for plan_node in plan_nodes {
            for element in plan_node.children().filter(|node| node.is_element()) {
                let tag = element.tag_name().name();
                let Some(qualified) = tag.strip_prefix(FUNCTION_TAG_PREFIX) else {
                    debug!(tag, "ignoring non-function element in plan");
                    continue;
                };
                let (plugin_name, function_name) = qualified.split_once('.').unwrap_or(("", qualified));

                let Some(function) = self.registry.resolve(Some(plugin_name), function_name) else {
                    match self.missing_functions {
                        MissingFunctionPolicy::Skip => {
                            warn!(plugin = plugin_name, function = function_name, "plan references unknown function, skipping step");
                            continue;
                        }
                        MissingFunctionPolicy::Fail => {
                            return Err(PlanError::FunctionNotFound {
                                plugin: plugin_name.to_owned(),
                                function: function_name.to_owned(),
                            });
                        }
                    }
                };

                let mut step = Plan::from_function(function);
                for attribute in element.attributes() {
                    let value = attribute.value();
                    match attribute.name() {
                        SET_CONTEXT_VARIABLE_ATTR => step.outputs.push(value.to_owned()),
                        APPEND_TO_RESULT_ATTR => {
                            step.outputs.push(value.to_owned());
                            outputs.push(value.to_owned());
                        }
                        name => step.parameters.set(name, value),
                    }
                }

                debug!(step = %qualified, "parsed plan step");
                steps.push(step);
            }
        }

        plan.outputs.extend(outputs);
        plan.add_steps(steps);
        Ok(())
    }
}

impl std::fmt::Debug for SequentialPlanParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequentialPlanParser")
            .field("missing_functions", &self.missing_functions)
            .finish_non_exhaustive()
    }
}

/// Cut the first `<plan>` element out of `text`, closing it when the closing
/// tag is missing.
fn recover_plan_fragment(text: &str) -> Option<String> {
    if let Some(found) = PLAN_FRAGMENT.find(text) {
        return Some(found.as_str().to_owned());
    }
    let closed = format!("{text}</{PLAN_TAG}>");
    PLAN_FRAGMENT.find(&closed).map(|found| found.as_str().to_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
