//! Planner error types.

use quill_kernel::KernelError;
use quill_template::TemplateError;

/// Unified error type for plan parsing, planning and execution.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    // -- Parse errors --------------------------------------------------------
    /// The plan text could not be parsed, even after recovery.
    #[error("failed to parse plan: {reason}\nplan text:\n{text}")]
    Parse { reason: String, text: String },

    /// A plan step names a function the registry does not have.
    #[error("plan references unknown function `{plugin}.{function}`")]
    FunctionNotFound { plugin: String, function: String },

    // -- Planning errors -----------------------------------------------------
    /// The goal was empty or the planning function failed.
    #[error("planning failed: {reason}")]
    PlanningFailed { reason: String },

    /// The planner's output parsed but contained no steps.
    #[error("the plan for goal `{goal}` has no steps")]
    EmptyPlan { goal: String },

    // -- Execution errors ----------------------------------------------------
    /// A step failed; the plan did not advance past it.
    #[error("step {step_index} (`{step}`) failed: {source}")]
    StepFailed {
        step_index: usize,
        step: String,
        #[source]
        source: KernelError,
    },

    // -- Configuration errors ------------------------------------------------
    #[error("config error: {reason}")]
    Config { reason: String },

    // -- Serialization -------------------------------------------------------
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // -- Upstream crate errors -----------------------------------------------
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),
}

/// Convenience alias used throughout the planner crate.
pub type Result<T> = std::result::Result<T, PlanError>;
