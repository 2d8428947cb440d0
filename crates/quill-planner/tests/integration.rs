//! Integration tests for the quill-planner crate.
//!
//! Plans are created by a scripted planning model, parsed, executed step by
//! step against in-memory native functions, and serialized mid-run.

use std::sync::Arc;

use async_trait::async_trait;
use quill_kernel::{
    ContextVariables, Kernel, KernelError, NativeFunction, ParameterView, RequestSettings,
    SkContext, SkFunction, TextCompletion,
};
use quill_planner::{
    PLAN_RESULT_KEY, Plan, PlanError, PlannerConfig, SequentialPlanParser, SequentialPlanner,
};

fn kernel() -> Kernel {
    let kernel = Kernel::new();
    kernel.register(Arc::new(NativeFunction::from_fn(
        "text",
        "upper",
        "Uppercase the input",
        |s| s.to_uppercase(),
    )));
    kernel.register(Arc::new(NativeFunction::new(
        "text",
        "wrap",
        "Prefix the input",
        vec![
            ParameterView::new("input"),
            ParameterView::new("prefix").with_default("> "),
        ],
        |mut context: SkContext, _settings| async move {
            let wrapped = format!(
                "{}{}",
                context.variables.get("prefix").unwrap_or_default(),
                context.variables.input()
            );
            context.variables.update(wrapped);
            Ok::<_, KernelError>(context)
        },
    )));
    kernel
}

/// Answers every prompt with the same text.
struct ScriptedCompletion(String);

#[async_trait]
impl TextCompletion for ScriptedCompletion {
    async fn complete(
        &self,
        _prompt: &str,
        _settings: &RequestSettings,
    ) -> quill_kernel::Result<String> {
        Ok(self.0.clone())
    }
}

const TWO_STEP_PLAN: &str = r#"<plan>
  <function.text.upper input="$topic" setContextVariable="LOUD"/>
  <function.text.wrap input="$LOUD" appendToResult="RESULT__FINAL"/>
</plan>"#;

fn topic_context(kernel: &Kernel) -> SkContext {
    let mut variables = ContextVariables::new();
    variables.set("topic", "rust");
    kernel.create_context(variables)
}

// ═══════════════════════════════════════════════════════════════════════
//  Step execution
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn outputs_surface_step_by_step() {
    let kernel = kernel();
    let first: Arc<dyn SkFunction> =
        Arc::new(NativeFunction::from_fn("test", "first", "", |_| "one".into()));
    let second: Arc<dyn SkFunction> =
        Arc::new(NativeFunction::from_fn("test", "second", "", |_| "two".into()));

    let mut plan = Plan::with_steps(
        "goal",
        [
            Plan::from_function(first).with_output("X"),
            Plan::from_function(second).with_output("Y"),
        ],
    )
    .with_output("X");
    let context = kernel.create_context(ContextVariables::new());

    plan.run(&context, &RequestSettings::default()).await.unwrap();
    assert_eq!(plan.state.get("X"), Some("one"));
    assert_eq!(plan.answer, "one");
    assert!(plan.has_next_step());

    plan.run(&context, &RequestSettings::default()).await.unwrap();
    assert!(!plan.has_next_step());
    assert_eq!(plan.state.get("Y"), Some("two"));
    assert_eq!(plan.state.get("X"), Some("one"));
    assert_eq!(plan.answer, "one");
}

#[tokio::test]
async fn appended_results_accumulate() {
    let kernel = kernel();
    let upper = kernel.function(Some("text"), "upper").unwrap();

    let mut plan = Plan::with_steps(
        "goal",
        [
            Plan::from_function(Arc::clone(&upper))
                .with_parameter("input", "a")
                .with_output("R"),
            Plan::from_function(upper)
                .with_parameter("input", "b")
                .with_output("R"),
        ],
    )
    .with_output("R");
    let context = kernel.create_context(ContextVariables::new());

    while plan.has_next_step() {
        plan.run(&context, &RequestSettings::default()).await.unwrap();
    }
    assert_eq!(plan.state.get(PLAN_RESULT_KEY), Some("A\nB"));
    assert_eq!(plan.answer, "A\nB");
}

#[tokio::test]
async fn failed_step_can_be_retried() {
    let kernel = kernel();
    let flaky_calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let flaky = {
        let calls = Arc::clone(&flaky_calls);
        NativeFunction::new("test", "flaky", "", vec![], move |mut context: SkContext, _settings| {
            let attempt = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    return Err(KernelError::InvocationFailed {
                        function: "test.flaky".into(),
                        reason: "first attempt fails".into(),
                    });
                }
                context.variables.update("recovered");
                Ok::<_, KernelError>(context)
            }
        })
    };

    let mut plan = Plan::with_steps("goal", [Plan::from_function(Arc::new(flaky))]);
    let context = kernel.create_context(ContextVariables::new());

    let err = plan.run(&context, &RequestSettings::default()).await.unwrap_err();
    assert!(matches!(err, PlanError::StepFailed { step_index: 0, .. }));
    assert_eq!(plan.next_step_index, 0);

    plan.run(&context, &RequestSettings::default()).await.unwrap();
    assert_eq!(plan.state.input(), "recovered");
    assert!(!plan.has_next_step());
}

// ═══════════════════════════════════════════════════════════════════════
//  Parsing and planning
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn planner_output_runs_to_completion() {
    let kernel = kernel();
    let planner = SequentialPlanner::new(
        kernel.registry(),
        Arc::new(ScriptedCompletion(TWO_STEP_PLAN.into())),
        PlannerConfig::default(),
    )
    .unwrap();

    let mut plan = planner
        .create_plan("shout about rust", &RequestSettings::default())
        .await
        .unwrap();
    assert_eq!(plan.steps.len(), 2);

    let context = topic_context(&kernel);
    while plan.has_next_step() {
        plan.run(&context, &RequestSettings::default()).await.unwrap();
    }

    assert_eq!(plan.state.get("LOUD"), Some("RUST"));
    assert_eq!(plan.answer, "> RUST");
}

#[tokio::test]
async fn truncated_planner_output_is_recovered() {
    let kernel = kernel();
    let truncated = "Here you go:\n<plan>\n  <function.text.upper input=\"$topic\"/>\n";
    let planner = SequentialPlanner::new(
        kernel.registry(),
        Arc::new(ScriptedCompletion(truncated.into())),
        PlannerConfig::default(),
    )
    .unwrap();

    let plan = planner
        .create_plan("shout", &RequestSettings::default())
        .await
        .unwrap();
    assert_eq!(plan.steps.len(), 1);
}

#[test]
fn garbage_is_a_parse_error() {
    let kernel = kernel();
    let parser = SequentialPlanParser::new(kernel.registry());
    let mut plan = Plan::new("goal");

    let err = parser.parse("<<<&&&", &mut plan).unwrap_err();
    assert!(matches!(err, PlanError::Parse { ref text, .. } if text.contains("<<<&&&")));
    assert!(plan.steps.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════
//  Plans as functions and text form
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn plan_invoked_as_a_function() {
    let kernel = kernel();
    let parser = SequentialPlanParser::new(kernel.registry());
    let mut plan = Plan::new("shout about rust");
    parser.parse(TWO_STEP_PLAN, &mut plan).unwrap();

    let result = plan
        .invoke(topic_context(&kernel), &RequestSettings::default())
        .await
        .unwrap();
    assert_eq!(result.result(), "> RUST");
    assert_eq!(result.variables.get("RESULT__FINAL"), Some("> RUST"));
    assert_eq!(result.variables.get("LOUD"), Some("RUST"));

    // The plan itself is untouched.
    assert_eq!(plan.next_step_index, 0);
}

#[tokio::test]
async fn text_form_resumes_mid_run() {
    let kernel = kernel();
    let parser = SequentialPlanParser::new(kernel.registry());
    let mut plan = Plan::new("shout about rust");
    parser.parse(TWO_STEP_PLAN, &mut plan).unwrap();

    let context = topic_context(&kernel);
    plan.run(&context, &RequestSettings::default()).await.unwrap();

    let json = plan.to_text_form().unwrap();
    let registry = kernel.registry();
    let mut restored = Plan::from_text_form(&json, registry.as_ref()).unwrap();
    assert_eq!(restored.next_step_index, 1);
    assert_eq!(restored.state.get("LOUD"), Some("RUST"));

    restored.run(&context, &RequestSettings::default()).await.unwrap();
    assert!(!restored.has_next_step());
    assert_eq!(restored.answer, "> RUST");
}
