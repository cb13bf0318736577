use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use weft_core::agent::{Agent, AgentArchetype};
use weft_core::error::{Result, WeftError};
use weft_core::execution::{AgentExecution, ExecutionStep, StepKind};
use weft_core::traits::LlmProvider;
use weft_core::types::{
    ChatMessage, ContentBlock, Role, ToolCallRequest, ToolContext, ToolDefinition, ToolResult,
};
use weft_llm::pricing;
use weft_tools::ToolRegistry;

/// Options for a single agent run.
#[derive(Clone)]
pub struct RunOptions {
    /// Checked at every suspension point.
    pub cancel: CancellationToken,
    /// Verbose step logging.
    pub debug: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            cancel: CancellationToken::new(),
            debug: false,
        }
    }
}

/// Drives an agent to completion against an LLM provider and the tool
/// registry.
///
/// `run` always returns the [`AgentExecution`] envelope; failures land on
/// the record as status Failed plus an error message, with every step
/// accumulated before the failure intact.
pub struct AgentRunner {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
}

/// Fixed sub-task decomposition used by the multi_agent archetype.
const SUBTASK_ASPECTS: &[(&str, &str)] = &[
    ("research", "Gather the relevant facts and context."),
    ("analysis", "Analyze the gathered material and draw conclusions."),
    ("summary", "Condense the conclusions into their essentials."),
];

impl AgentRunner {
    pub fn new(llm: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self { llm, tools }
    }

    /// Run the agent loop for the given textual input.
    pub async fn run(&self, agent: &Agent, input: &str, opts: RunOptions) -> AgentExecution {
        let mut exec = AgentExecution::new(&agent.id, input);
        info!(
            agent_id = %agent.id,
            archetype = ?agent.archetype,
            execution_id = %exec.id,
            "Starting agent run"
        );

        let outcome = match agent.archetype {
            AgentArchetype::PromptBased => self.run_prompt_based(agent, input, &opts, &mut exec).await,
            AgentArchetype::ToolUsing => self.run_tool_using(agent, input, &opts, &mut exec).await,
            AgentArchetype::MultiAgent => self.run_multi_agent(agent, input, &opts, &mut exec).await,
            AgentArchetype::Workflow => self.run_workflow_bridge(agent, input, &opts, &mut exec).await,
            AgentArchetype::Autonomous => self.run_autonomous(agent, input, &opts, &mut exec).await,
        };

        match outcome {
            Ok(output) => {
                info!(
                    execution_id = %exec.id,
                    steps = exec.steps.len(),
                    tokens = exec.metrics.total_tokens,
                    "Agent run complete"
                );
                exec.complete(output);
            }
            Err(e) => {
                error!(execution_id = %exec.id, error = %e, "Agent run failed");
                exec.fail(e.to_string());
            }
        }
        exec
    }

    /// One `generate` call with cancellation and usage accounting.
    async fn generate(
        &self,
        agent: &Agent,
        prompt: &str,
        opts: &RunOptions,
        exec: &mut AgentExecution,
    ) -> Result<String> {
        if opts.cancel.is_cancelled() {
            return Err(WeftError::Cancelled);
        }
        let completion = tokio::select! {
            result = self.llm.generate(&agent.model, prompt) => result?,
            _ = opts.cancel.cancelled() => return Err(WeftError::Cancelled),
        };
        exec.record_usage(
            completion.usage,
            pricing::cost(&agent.model.model_id, &completion.usage),
        );
        Ok(completion.content)
    }

    /// Single LLM call; the raw completion text is the output.
    async fn run_prompt_based(
        &self,
        agent: &Agent,
        input: &str,
        opts: &RunOptions,
        exec: &mut AgentExecution,
    ) -> Result<String> {
        let system = agent.system_prompt();
        let prompt = if system.is_empty() {
            input.to_string()
        } else {
            format!("{}\n\n{}", system, input)
        };

        let mut step = ExecutionStep::start(StepKind::LlmCall, json!({ "prompt": prompt }))
            .describe("single prompt completion");
        match self.generate(agent, &prompt, opts, exec).await {
            Ok(content) => {
                step.succeed(json!({ "content": content }));
                exec.steps.push(step);
                Ok(content)
            }
            Err(e) => {
                step.fail(e.to_string());
                exec.steps.push(step);
                Err(e)
            }
        }
    }

    /// Bounded tool-calling loop: one execution step per LLM call.
    async fn run_tool_using(
        &self,
        agent: &Agent,
        input: &str,
        opts: &RunOptions,
        exec: &mut AgentExecution,
    ) -> Result<String> {
        let max_steps = agent.limits.max_steps;
        let tool_defs = self.tool_definitions(agent);

        let mut messages = Vec::new();
        let system = agent.system_prompt();
        if !system.is_empty() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(input));

        for step_no in 0..max_steps {
            debug!(step = step_no, "Agent loop iteration");

            if opts.cancel.is_cancelled() {
                return Err(WeftError::Cancelled);
            }
            let response = tokio::select! {
                result = self.llm.chat(&agent.model, messages.clone(), &tool_defs) => result,
                _ = opts.cancel.cancelled() => Err(WeftError::Cancelled),
            };
            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    let mut step =
                        ExecutionStep::start(StepKind::LlmCall, json!({ "step": step_no }));
                    step.fail(e.to_string());
                    exec.steps.push(step);
                    return Err(e);
                }
            };
            exec.record_usage(
                response.usage,
                pricing::cost(&agent.model.model_id, &response.usage),
            );

            if response.requests_tools() {
                let mut step = ExecutionStep::start(
                    StepKind::LlmToolCall,
                    json!({ "step": step_no, "tool_calls": response.tool_calls }),
                );

                // Assistant message carrying the tool-use blocks.
                let mut blocks = Vec::new();
                if let Some(text) = &response.content {
                    if !text.is_empty() {
                        blocks.push(ContentBlock::Text { text: text.clone() });
                    }
                }
                for call in &response.tool_calls {
                    blocks.push(ContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: call.arguments.clone(),
                    });
                }
                messages.push(ChatMessage {
                    role: Role::Assistant,
                    content: blocks,
                });

                // Execute each requested call; resolution failures become
                // per-call error results, not a loop abort.
                let mut result_blocks = Vec::new();
                let mut results_json = Vec::new();
                for call in &response.tool_calls {
                    let result = self.call_agent_tool(agent, call, opts, &exec.id).await?;
                    if result.is_error {
                        exec.metrics.error_count += 1;
                        warn!(tool = %call.name, error = %result.content, "Tool call failed");
                    }
                    results_json.push(json!({
                        "id": call.id,
                        "content": result.content,
                        "is_error": result.is_error,
                    }));
                    result_blocks.push(ContentBlock::ToolResult {
                        tool_use_id: call.id.clone(),
                        content: result.content,
                        is_error: result.is_error,
                    });
                }
                messages.push(ChatMessage {
                    role: Role::User,
                    content: result_blocks,
                });

                step.succeed(json!({ "results": results_json }));
                exec.steps.push(step);
                continue;
            }

            // Final content, no tool calls: the loop is done.
            let content = response.content.unwrap_or_default();
            let mut step = ExecutionStep::start(StepKind::LlmCall, json!({ "step": step_no }));
            step.succeed(json!({ "content": content }));
            exec.steps.push(step);
            return Ok(content);
        }

        Err(WeftError::MaxIterationsExceeded(max_steps))
    }

    /// Fixed two-phase flow: sequential sub-tasks then one synthesis.
    async fn run_multi_agent(
        &self,
        agent: &Agent,
        input: &str,
        opts: &RunOptions,
        exec: &mut AgentExecution,
    ) -> Result<String> {
        let mut sub_outputs = Vec::with_capacity(SUBTASK_ASPECTS.len());

        for (aspect, instruction) in SUBTASK_ASPECTS {
            let prompt = format!("{}\n\nTask: {}", instruction, input);
            let mut step = ExecutionStep::start(
                StepKind::Subtask,
                json!({ "aspect": aspect, "prompt": prompt }),
            )
            .describe(format!("sub-task: {}", aspect));

            match self.generate(agent, &prompt, opts, exec).await {
                Ok(content) => {
                    step.succeed(json!({ "content": content }));
                    exec.steps.push(step);
                    sub_outputs.push(format!("## {}\n{}", aspect, content));
                }
                Err(e) => {
                    step.fail(e.to_string());
                    exec.steps.push(step);
                    return Err(e);
                }
            }
        }

        let synthesis_prompt = format!(
            "Combine the following sub-task results into a single coherent answer.\n\n{}\n\nOriginal task: {}",
            sub_outputs.join("\n\n"),
            input
        );
        let mut step = ExecutionStep::start(
            StepKind::Synthesis,
            json!({ "prompt": synthesis_prompt }),
        )
        .describe("synthesize sub-task results");
        match self.generate(agent, &synthesis_prompt, opts, exec).await {
            Ok(content) => {
                step.succeed(json!({ "content": content }));
                exec.steps.push(step);
                Ok(content)
            }
            Err(e) => {
                step.fail(e.to_string());
                exec.steps.push(step);
                Err(e)
            }
        }
    }

    /// Bridging archetype: the input text embeds workflow execution
    /// results; one call turns them into a final answer.
    async fn run_workflow_bridge(
        &self,
        agent: &Agent,
        input: &str,
        opts: &RunOptions,
        exec: &mut AgentExecution,
    ) -> Result<String> {
        let prompt = format!(
            "The context below contains workflow execution results. Produce the final answer from them.\n\n{}",
            input
        );
        let mut step = ExecutionStep::start(StepKind::LlmCall, json!({ "prompt": prompt }))
            .describe("workflow result bridge");
        match self.generate(agent, &prompt, opts, exec).await {
            Ok(content) => {
                step.succeed(json!({ "content": content }));
                exec.steps.push(step);
                Ok(content)
            }
            Err(e) => {
                step.fail(e.to_string());
                exec.steps.push(step);
                Err(e)
            }
        }
    }

    /// Single opaque decide-then-execute step.
    async fn run_autonomous(
        &self,
        agent: &Agent,
        input: &str,
        opts: &RunOptions,
        exec: &mut AgentExecution,
    ) -> Result<String> {
        let prompt = format!(
            "Decide the single best next action for the task below, carry it out, and report the result.\n\nTask: {}",
            input
        );
        let mut step = ExecutionStep::start(StepKind::LlmCall, json!({ "prompt": prompt }))
            .describe("decide and execute");
        match self.generate(agent, &prompt, opts, exec).await {
            Ok(content) => {
                step.succeed(json!({ "content": content }));
                exec.steps.push(step);
                Ok(content)
            }
            Err(e) => {
                step.fail(e.to_string());
                exec.steps.push(step);
                Err(e)
            }
        }
    }

    /// Tool schemas exposed to the model, from the agent's bindings.
    fn tool_definitions(&self, agent: &Agent) -> Vec<ToolDefinition> {
        agent
            .tools
            .iter()
            .map(|binding| ToolDefinition {
                name: binding.name.clone(),
                description: binding.description.clone(),
                input_schema: if binding.parameters.is_null() {
                    json!({ "type": "object" })
                } else {
                    binding.parameters.clone()
                },
            })
            .collect()
    }

    /// Resolve and execute one requested tool call. Unresolvable names or
    /// types come back as error results; only cancellation aborts.
    async fn call_agent_tool(
        &self,
        agent: &Agent,
        call: &ToolCallRequest,
        opts: &RunOptions,
        execution_id: &weft_core::types::ExecutionId,
    ) -> Result<ToolResult> {
        let binding = match agent.tool_binding(&call.name) {
            Some(b) => b,
            None => {
                return Ok(ToolResult::error(format!(
                    "tool '{}' is not available to this agent",
                    call.name
                )))
            }
        };

        let ctx = ToolContext::new(execution_id.clone(), opts.cancel.clone());
        match self
            .tools
            .execute(&binding.tool_type, call.arguments.clone(), ctx)
            .await
        {
            Ok(result) => Ok(result),
            Err(WeftError::Cancelled) => Err(WeftError::Cancelled),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use weft_core::agent::{ExecutionLimits, MemoryConfig, ModelConfig, ToolBinding};
    use weft_core::traits::Tool;
    use weft_core::types::{ChatResponse, ExecutionStatus, StepStatus, TokenUsage};
    use weft_llm::ScriptedProvider;

    struct StubTool;

    impl Tool for StubTool {
        fn name(&self) -> &str {
            "stub"
        }
        fn description(&self) -> &str {
            "echoes its arguments"
        }
        fn input_schema(&self) -> serde_json::Value {
            json!({ "type": "object" })
        }
        fn execute(
            &self,
            input: serde_json::Value,
            _ctx: ToolContext,
        ) -> BoxFuture<'_, Result<ToolResult>> {
            Box::pin(async move { Ok(ToolResult::success(input.to_string())) })
        }
    }

    fn tool_using_agent(max_steps: usize) -> Agent {
        Agent {
            id: "a1".into(),
            name: "test agent".into(),
            archetype: AgentArchetype::ToolUsing,
            model: ModelConfig {
                provider: "scripted".into(),
                model_id: "test-model".into(),
                temperature: 0.0,
                max_tokens: 1024,
            },
            prompts: vec![],
            tools: vec![ToolBinding {
                name: "lookup".into(),
                description: "look something up".into(),
                parameters: serde_json::Value::Null,
                tool_type: "stub".into(),
            }],
            limits: ExecutionLimits {
                max_steps,
                timeout_secs: None,
                retry: Default::default(),
            },
            memory: MemoryConfig::default(),
        }
    }

    fn runner_with(provider: Arc<ScriptedProvider>) -> AgentRunner {
        let mut registry = ToolRegistry::new();
        registry.register(StubTool);
        AgentRunner::new(provider, Arc::new(registry))
    }

    fn tool_call_response(name: &str) -> ChatResponse {
        ChatResponse {
            content: None,
            tool_calls: vec![ToolCallRequest {
                id: "c1".into(),
                name: name.into(),
                arguments: json!({ "q": "rust" }),
            }],
            usage: TokenUsage::new(50, 10),
        }
    }

    #[tokio::test]
    async fn tool_then_final_content_completes_in_two_steps() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.enqueue_chat(tool_call_response("lookup"));
        provider.enqueue_chat(ChatResponse::text("the answer", TokenUsage::new(80, 20)));

        let runner = runner_with(provider);
        let exec = runner
            .run(&tool_using_agent(10), "find it", RunOptions::default())
            .await;

        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert_eq!(exec.output.as_deref(), Some("the answer"));
        assert_eq!(exec.steps.len(), 2);
        assert_eq!(exec.steps[0].kind, StepKind::LlmToolCall);
        assert_eq!(exec.steps[1].kind, StepKind::LlmCall);
        assert_eq!(exec.metrics.api_calls, 2);
        assert_eq!(exec.metrics.total_tokens, 160);
    }

    #[tokio::test]
    async fn endless_tool_calls_hit_the_iteration_limit() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.set_chat_fallback(tool_call_response("lookup"));

        let runner = runner_with(provider);
        let exec = runner
            .run(&tool_using_agent(5), "loop forever", RunOptions::default())
            .await;

        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert_eq!(exec.steps.len(), 5);
        assert!(exec.steps.iter().all(|s| s.kind == StepKind::LlmToolCall));
        let error = exec.error.unwrap();
        assert!(error.contains("maximum iterations"));
        assert!(error.contains('5'));
    }

    #[tokio::test]
    async fn unresolvable_tool_is_a_per_call_error_not_an_abort() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.enqueue_chat(tool_call_response("no_such_tool"));
        provider.enqueue_chat(ChatResponse::text("recovered", TokenUsage::new(10, 5)));

        let runner = runner_with(provider);
        let exec = runner
            .run(&tool_using_agent(10), "try it", RunOptions::default())
            .await;

        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert_eq!(exec.output.as_deref(), Some("recovered"));
        assert_eq!(exec.metrics.error_count, 1);

        let results = &exec.steps[0].output.as_ref().unwrap()["results"];
        assert_eq!(results[0]["is_error"], true);
    }

    #[tokio::test]
    async fn prompt_based_is_a_single_step() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.enqueue_text("hello from the model");

        let mut agent = tool_using_agent(10);
        agent.archetype = AgentArchetype::PromptBased;

        let runner = runner_with(provider);
        let exec = runner.run(&agent, "say hello", RunOptions::default()).await;

        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert_eq!(exec.output.as_deref(), Some("hello from the model"));
        assert_eq!(exec.steps.len(), 1);
        assert_eq!(exec.steps[0].kind, StepKind::LlmCall);
        assert_eq!(exec.steps[0].status, StepStatus::Completed);
        assert!(exec.metrics.total_cost > 0.0);
    }

    #[tokio::test]
    async fn multi_agent_runs_subtasks_then_synthesis() {
        let provider = Arc::new(ScriptedProvider::new());
        for text in ["facts", "conclusions", "essence", "combined answer"] {
            provider.enqueue_text(text);
        }

        let mut agent = tool_using_agent(10);
        agent.archetype = AgentArchetype::MultiAgent;

        let runner = runner_with(provider);
        let exec = runner.run(&agent, "big task", RunOptions::default()).await;

        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert_eq!(exec.output.as_deref(), Some("combined answer"));
        assert_eq!(exec.steps.len(), 4);
        assert!(exec.steps[..3].iter().all(|s| s.kind == StepKind::Subtask));
        assert_eq!(exec.steps[3].kind, StepKind::Synthesis);
        assert_eq!(exec.metrics.api_calls, 4);
    }

    #[tokio::test]
    async fn cancellation_fails_the_run() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.set_chat_fallback(tool_call_response("lookup"));

        let opts = RunOptions::default();
        opts.cancel.cancel();

        let runner = runner_with(provider);
        let exec = runner.run(&tool_using_agent(10), "x", opts).await;

        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert!(exec.error.unwrap().contains("cancelled"));
    }

    #[tokio::test]
    async fn failed_run_retains_earlier_steps() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.enqueue_chat(tool_call_response("lookup"));
        // Script exhausted on the second call: provider error.

        let runner = runner_with(provider);
        let exec = runner
            .run(&tool_using_agent(10), "x", RunOptions::default())
            .await;

        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert_eq!(exec.steps.len(), 2);
        assert_eq!(exec.steps[0].status, StepStatus::Completed);
        assert_eq!(exec.steps[1].status, StepStatus::Failed);
    }
}
