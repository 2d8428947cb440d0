//! Quill sequential planner.
//!
//! - **[`plan`]** -- The [`Plan`] tree.  Plans are functions, so they nest
//!   and can be registered like any other function.
//! - **[`executor`]** -- [`Plan::run`], step variable resolution and `$name`
//!   [`expand`]sion.
//! - **[`parser`]** -- [`SequentialPlanParser`], turning `<plan>` XML from a
//!   planning model into steps, with recovery for damaged output.
//! - **[`planner`]** -- [`SequentialPlanner`], which asks a model for a plan.
//! - **[`error`]** -- [`PlanError`].
//!
//! A plan is driven one step at a time:
//!
//! ```rust,no_run
//! # use quill_kernel::{Kernel, ContextVariables, RequestSettings};
//! # use quill_planner::Plan;
//! # async fn drive(kernel: Kernel, mut plan: Plan) -> quill_planner::Result<()> {
//! let context = kernel.create_context(ContextVariables::with_input("notes"));
//! while plan.has_next_step() {
//!     plan.run(&context, &RequestSettings::default()).await?;
//! }
//! println!("{}", plan.answer);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod executor;
pub mod parser;
pub mod plan;
pub mod planner;

pub use error::{PlanError, Result};
pub use executor::expand;
pub use parser::{MissingFunctionPolicy, SequentialPlanParser};
pub use plan::{PLAN_PLUGIN, PLAN_RESULT_KEY, Plan};
pub use planner::{
    AVAILABLE_FUNCTIONS_KEY, DEFAULT_PLANNER_PROMPT, PLANNER_PLUGIN, PlannerConfig,
    SequentialPlanner,
};
