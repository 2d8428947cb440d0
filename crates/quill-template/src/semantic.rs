//! Prompt-backed functions.
//!
//! A [`SemanticFunction`] renders its template against the caller's context,
//! sends the prompt to a [`TextCompletion`] service and returns the
//! completion as the context's INPUT.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use quill_kernel::{
    FunctionView, GLOBAL_PLUGIN, INPUT_KEY, KernelError, ParameterView, RequestSettings, SkContext,
    SkFunction, TextCompletion,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blocks::{Block, NamedArgValue};
use crate::engine::TemplateEngine;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Prompt configuration
// ---------------------------------------------------------------------------

/// Declared inputs of a prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptInputConfig {
    pub parameters: Vec<ParameterView>,
}

/// Configuration accompanying a prompt template, usually loaded from JSON.
///
/// ```json
/// {
///   "description": "Summarize text",
///   "completion": { "maxTokens": 256, "temperature": 0.2 },
///   "input": { "parameters": [{ "name": "input", "description": "Text" }] }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptConfig {
    pub description: String,
    /// Default request settings for the completion call.
    pub completion: RequestSettings,
    pub input: PromptInputConfig,
}

impl PromptConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_completion(mut self, completion: RequestSettings) -> Self {
        self.completion = completion;
        self
    }
}

// ---------------------------------------------------------------------------
// SemanticFunction
// ---------------------------------------------------------------------------

pub struct SemanticFunction {
    view: FunctionView,
    template: String,
    blocks: Vec<Block>,
    completion_settings: RequestSettings,
    engine: TemplateEngine,
    completion: Arc<dyn TextCompletion>,
}

impl SemanticFunction {
    /// Build a function from a template.  The template is tokenized and
    /// validated here, so syntax errors surface at construction.
    pub fn new(
        plugin: impl Into<String>,
        name: impl Into<String>,
        template: impl Into<String>,
        config: PromptConfig,
        completion: Arc<dyn TextCompletion>,
    ) -> Result<Self> {
        Self::with_engine(plugin, name, template, config, completion, TemplateEngine::new())
    }

    pub fn with_engine(
        plugin: impl Into<String>,
        name: impl Into<String>,
        template: impl Into<String>,
        config: PromptConfig,
        completion: Arc<dyn TextCompletion>,
        engine: TemplateEngine,
    ) -> Result<Self> {
        let template = template.into();
        let blocks = engine.extract_blocks(&template, true)?;
        let parameters = declared_parameters(config.input.parameters, &blocks);

        let plugin = plugin.into();
        let plugin_name = if plugin.is_empty() {
            GLOBAL_PLUGIN.to_owned()
        } else {
            plugin
        };

        Ok(Self {
            view: FunctionView {
                name: name.into(),
                plugin_name,
                description: config.description,
                parameters,
            },
            template,
            blocks,
            completion_settings: config.completion,
            engine,
            completion,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

/// Configured parameters first, then every variable the template reads,
/// without case-insensitive duplicates.
fn declared_parameters(configured: Vec<ParameterView>, blocks: &[Block]) -> Vec<ParameterView> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut parameters = Vec::new();

    for parameter in configured {
        if seen.insert(parameter.name.to_lowercase()) {
            parameters.push(parameter);
        }
    }

    let mut referenced = Vec::new();
    for block in blocks {
        collect_variables(block, &mut referenced);
    }
    for name in referenced {
        if !name.is_empty() && seen.insert(name.to_lowercase()) {
            parameters.push(ParameterView::new(name));
        }
    }

    parameters
}

fn collect_variables<'a>(block: &'a Block, out: &mut Vec<&'a str>) {
    match block {
        Block::Variable(variable) => out.push(variable.name()),
        Block::NamedArg(arg) => {
            if let NamedArgValue::Variable(variable) = arg.value() {
                out.push(variable.name());
            }
        }
        Block::Code(code) => {
            for token in code.tokens() {
                collect_variables(token, out);
            }
        }
        Block::Text(_) | Block::Value(_) | Block::FunctionId(_) => {}
    }
}

#[async_trait]
impl SkFunction for SemanticFunction {
    fn describe(&self) -> FunctionView {
        self.view.clone()
    }

    async fn invoke(
        &self,
        mut context: SkContext,
        settings: &RequestSettings,
    ) -> quill_kernel::Result<SkContext> {
        let name = self.view.qualified_name();

        for parameter in &self.view.parameters {
            if parameter.default_value.is_empty() {
                continue;
            }
            let missing = if parameter.name.eq_ignore_ascii_case(INPUT_KEY) {
                context.variables.input().is_empty()
            } else {
                !context.variables.contains_key(&parameter.name)
            };
            if missing {
                context
                    .variables
                    .set(parameter.name.clone(), parameter.default_value.clone());
            }
        }

        let prompt = self
            .engine
            .render_blocks(&self.blocks, &context)
            .await
            .map_err(|e| KernelError::InvocationFailed {
                function: name.clone(),
                reason: e.to_string(),
            })?;

        let settings = if settings.is_default() {
            &self.completion_settings
        } else {
            settings
        };

        debug!(function = %name, prompt_len = prompt.len(), "requesting completion");
        let completion = self.completion.complete(&prompt, settings).await?;

        context.variables.update(completion);
        Ok(context)
    }
}

impl std::fmt::Debug for SemanticFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticFunction")
            .field("view", &self.view)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use quill_kernel::{ContextVariables, FunctionCollection};

    use super::*;

    /// Records prompts and settings, answers with a fixed string.
    #[derive(Default)]
    struct RecordingCompletion {
        prompts: Mutex<Vec<(String, RequestSettings)>>,
    }

    #[async_trait]
    impl TextCompletion for RecordingCompletion {
        async fn complete(
            &self,
            prompt: &str,
            settings: &RequestSettings,
        ) -> quill_kernel::Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.to_owned(), settings.clone()));
            Ok("done".into())
        }
    }

    fn context(variables: ContextVariables) -> SkContext {
        SkContext::new(variables, Arc::new(FunctionCollection::new()))
    }

    #[tokio::test]
    async fn renders_prompt_and_stores_completion() {
        let completion = Arc::new(RecordingCompletion::default());
        let function = SemanticFunction::new(
            "writer",
            "summarize",
            "Summarize in {{$style}}: {{$input}}",
            PromptConfig::default(),
            completion.clone(),
        )
        .unwrap();

        let mut variables = ContextVariables::with_input("long text");
        variables.set("style", "haiku");
        let result = function
            .invoke(context(variables), &RequestSettings::default())
            .await
            .unwrap();

        assert_eq!(result.result(), "done");
        let prompts = completion.prompts.lock().unwrap();
        assert_eq!(prompts[0].0, "Summarize in haiku: long text");
    }

    #[tokio::test]
    async fn call_settings_override_configured_defaults() {
        let completion = Arc::new(RecordingCompletion::default());
        let config =
            PromptConfig::default().with_completion(RequestSettings::default().with_max_tokens(64));
        let function =
            SemanticFunction::new("", "f", "{{$input}}", config, completion.clone()).unwrap();

        function
            .invoke(context(ContextVariables::new()), &RequestSettings::default())
            .await
            .unwrap();
        function
            .invoke(
                context(ContextVariables::new()),
                &RequestSettings::default().with_max_tokens(8),
            )
            .await
            .unwrap();

        let prompts = completion.prompts.lock().unwrap();
        assert_eq!(prompts[0].1.max_tokens, Some(64));
        assert_eq!(prompts[1].1.max_tokens, Some(8));
    }

    #[test]
    fn parameters_come_from_config_and_template() {
        let config = PromptConfig::from_json(
            r#"{
                "description": "Translate",
                "input": { "parameters": [
                    { "name": "input", "description": "Text" },
                    { "name": "language", "defaultValue": "French" }
                ] }
            }"#,
        )
        .unwrap();
        let function = SemanticFunction::new(
            "writer",
            "translate",
            "{{$INPUT}} to {{$language}} {{ w.f $tone style=$Voice }}",
            config,
            Arc::new(RecordingCompletion::default()),
        )
        .unwrap();

        let view = function.describe();
        assert_eq!(view.description, "Translate");
        let names: Vec<&str> = view.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["input", "language", "tone", "Voice"]);
        assert_eq!(view.parameters[1].default_value, "French");
    }

    #[tokio::test]
    async fn defaults_fill_missing_variables() {
        let completion = Arc::new(RecordingCompletion::default());
        let config = PromptConfig {
            input: PromptInputConfig {
                parameters: vec![ParameterView::new("language").with_default("French")],
            },
            ..PromptConfig::default()
        };
        let function =
            SemanticFunction::new("", "f", "in {{$language}}", config, completion.clone()).unwrap();

        function
            .invoke(context(ContextVariables::new()), &RequestSettings::default())
            .await
            .unwrap();
        assert_eq!(completion.prompts.lock().unwrap()[0].0, "in French");
    }

    #[tokio::test]
    async fn empty_input_takes_configured_default() {
        let completion = Arc::new(RecordingCompletion::default());
        let config = PromptConfig {
            input: PromptInputConfig {
                parameters: vec![ParameterView::new("input").with_default("nothing yet")],
            },
            ..PromptConfig::default()
        };
        let function =
            SemanticFunction::new("", "f", "about {{$input}}", config, completion.clone()).unwrap();

        function
            .invoke(context(ContextVariables::new()), &RequestSettings::default())
            .await
            .unwrap();
        function
            .invoke(
                context(ContextVariables::with_input("rust")),
                &RequestSettings::default(),
            )
            .await
            .unwrap();

        let prompts = completion.prompts.lock().unwrap();
        assert_eq!(prompts[0].0, "about nothing yet");
        assert_eq!(prompts[1].0, "about rust");
    }

    #[tokio::test]
    async fn invocation_runs_on_a_spawned_task() {
        let function: Arc<dyn SkFunction> = Arc::new(
            SemanticFunction::new(
                "",
                "f",
                "{{$input}}",
                PromptConfig::default(),
                Arc::new(RecordingCompletion::default()),
            )
            .unwrap(),
        );

        let handle = tokio::spawn(async move {
            function
                .invoke(
                    context(ContextVariables::with_input("x")),
                    &RequestSettings::default(),
                )
                .await
        });
        assert_eq!(handle.await.unwrap().unwrap().result(), "done");
    }

    #[test]
    fn invalid_template_fails_construction() {
        let result = SemanticFunction::new(
            "",
            "f",
            "{{ 'a' 'b' }}",
            PromptConfig::default(),
            Arc::new(RecordingCompletion::default()),
        );
        assert!(result.is_err());
    }
}
