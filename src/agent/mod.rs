//! Agent orchestrator - implements the bounded reasoning loop
//!
//! THINKING → (ACTING → OBSERVING)* → ANSWERING → DONE
//!
//! Each THINKING entry asks the language model for a decision and counts one
//! iteration. Tool problems become observations for the next THINKING step;
//! only backend failures abort a run.

pub mod prompt;

pub use prompt::build_system_prompt;

use crate::config::AdvisorConfig;
use crate::error::AdvisorError;
use crate::llm::{LanguageModel, ThinkRequest};
use crate::memory::ConversationMemory;
use crate::models::{
    AgentRun, AgentState, Decision, ScratchpadStep, StepOutcome, ToolCall, ToolInput, ToolSpec,
    Utterance,
};
use crate::tools::ToolRegistry;
use crate::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;
const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(60);

const GIVE_UP_ANSWER: &str =
    "Maaf, saya belum berhasil menyelesaikan permintaan Anda. Coba ulangi dengan pertanyaan yang lebih spesifik.";

#[derive(Debug, Clone, Copy)]
pub struct AgentSettings {
    pub max_iterations: u32,
    pub backend_timeout: Duration,
}

impl AgentSettings {
    pub fn from_config(config: &AdvisorConfig) -> Self {
        Self {
            max_iterations: config.max_iterations.max(1),
            backend_timeout: config.llm.timeout,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }
}

/// Loop position, carrying the data the next transition needs
enum Phase {
    Thinking,
    Acting(ToolCall),
    Observing(ScratchpadStep),
    Answering(String),
    Failed(String),
}

/// Orchestrator that drives one utterance to an answer
pub struct AgentOrchestrator {
    model: Arc<dyn LanguageModel>,
    registry: Arc<ToolRegistry>,
    settings: AgentSettings,
    tool_specs: Vec<ToolSpec>,
    system_prompt: String,
}

impl AgentOrchestrator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        registry: Arc<ToolRegistry>,
        settings: AgentSettings,
    ) -> Self {
        let tool_specs = registry.specs();
        let system_prompt = build_system_prompt(&tool_specs);

        Self {
            model,
            registry,
            settings,
            tool_specs,
            system_prompt,
        }
    }

    /// Run the loop for one user utterance.
    ///
    /// Memory is only touched on the way out: the user utterance and the
    /// answer are appended when the run ends in DONE or FAILED. Backend
    /// errors return early and leave memory as it was.
    pub async fn run(&self, memory: &mut ConversationMemory, input: &str) -> Result<AgentRun> {
        let start_time = Instant::now();
        let history = memory.snapshot();
        let mut scratchpad: Vec<ScratchpadStep> = Vec::new();
        let mut reasoning_trace = vec![format!("INPUT: {}", input)];
        let mut iterations: u32 = 0;
        let mut phase = Phase::Thinking;

        info!(
            history = history.len(),
            max_iterations = self.settings.max_iterations,
            "Agent: starting run"
        );

        loop {
            phase = match phase {
                Phase::Thinking => {
                    if iterations >= self.settings.max_iterations {
                        Phase::Failed(format!(
                            "no final answer after {} iterations",
                            self.settings.max_iterations
                        ))
                    } else {
                        iterations += 1;
                        reasoning_trace.push(format!("{}: iteration {}", AgentState::Thinking, iterations));

                        let request = ThinkRequest {
                            system_prompt: &self.system_prompt,
                            history: &history,
                            input,
                            scratchpad: &scratchpad,
                            tools: &self.tool_specs,
                        };

                        match self.think(request).await? {
                            Decision::FinalAnswer { text } => Phase::Answering(text),
                            Decision::UseTool(call) => {
                                debug!(tool = %call.tool_name, iteration = iterations, "Model chose a tool");
                                Phase::Acting(call)
                            }
                        }
                    }
                }

                Phase::Acting(call) => {
                    reasoning_trace.push(format!(
                        "{}: {} {}",
                        AgentState::Acting,
                        call.tool_name,
                        call.tool_input
                    ));
                    let (observation, outcome) = self.act(&call).await;
                    Phase::Observing(ScratchpadStep::new(call, observation, outcome))
                }

                Phase::Observing(step) => {
                    reasoning_trace.push(format!(
                        "{}: {} ({:?}) {}",
                        AgentState::Observing,
                        step.action,
                        step.outcome,
                        preview(&step.observation)
                    ));
                    scratchpad.push(step);
                    Phase::Thinking
                }

                Phase::Answering(answer) => {
                    reasoning_trace.push(format!("{}: {}", AgentState::Answering, preview(&answer)));
                    memory.append(Utterance::user(input));
                    memory.append(Utterance::assistant(answer.clone()));
                    reasoning_trace.push(AgentState::Done.to_string());

                    info!(
                        iterations,
                        tool_calls = scratchpad.len(),
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Agent: run complete"
                    );

                    return Ok(AgentRun {
                        answer,
                        state: AgentState::Done,
                        iterations,
                        failure: None,
                        reasoning_trace,
                    });
                }

                Phase::Failed(reason) => {
                    let failure = AdvisorError::MaxIterationsExceeded(reason).to_string();
                    let answer = best_effort_answer(&failure, &scratchpad);

                    warn!(iterations, failure = %failure, "Agent: giving up");

                    memory.append(Utterance::user(input));
                    memory.append(Utterance::assistant(answer.clone()));
                    reasoning_trace.push(format!("{}: {}", AgentState::Failed, failure));

                    return Ok(AgentRun {
                        answer,
                        state: AgentState::Failed,
                        iterations,
                        failure: Some(failure),
                        reasoning_trace,
                    });
                }
            };
        }
    }

    /// Caller-facing entry point that never fails. Backend errors become an
    /// apology and leave memory untouched.
    pub async fn chat(&self, memory: &mut ConversationMemory, input: &str) -> AgentRun {
        match self.run(memory, input).await {
            Ok(run) => run,
            Err(e) => {
                error!("Agent run failed: {}", e);
                AgentRun {
                    answer: format!("Maaf terjadi error: {}", e),
                    state: AgentState::Failed,
                    iterations: 0,
                    failure: Some(e.to_string()),
                    reasoning_trace: vec![
                        format!("INPUT: {}", input),
                        format!("{}: {}", AgentState::Failed, e),
                    ],
                }
            }
        }
    }

    async fn think(&self, request: ThinkRequest<'_>) -> Result<Decision> {
        match tokio::time::timeout(self.settings.backend_timeout, self.model.complete(request)).await {
            Ok(decision) => decision,
            Err(_) => Err(AdvisorError::Backend(format!(
                "language model timed out after {}s",
                self.settings.backend_timeout.as_secs_f32()
            ))),
        }
    }

    /// Dispatch a tool call. Every failure is turned into an observation.
    async fn act(&self, call: &ToolCall) -> (String, StepOutcome) {
        let tool = match self.registry.resolve(&call.tool_name) {
            Ok(tool) => tool,
            Err(_) => {
                warn!(tool = %call.tool_name, "Model asked for an unknown tool");
                return (
                    format!(
                        "tool not found: {}; valid tools are: {}",
                        call.tool_name,
                        self.registry.list().join(", ")
                    ),
                    StepOutcome::UnknownTool,
                );
            }
        };

        let input = ToolInput {
            tool_name: tool.name().to_string(),
            parameters: call.tool_input.clone(),
        };

        let started = Instant::now();
        let result = tool.execute(&input).await;
        debug!(
            tool = tool.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Tool executed"
        );

        match result {
            Ok(observation) => (observation, StepOutcome::Success),
            Err(AdvisorError::InvalidInput(detail)) => {
                warn!(tool = tool.name(), %detail, "Invalid tool input");
                (format!("invalid tool input: {}", detail), StepOutcome::InvalidInput)
            }
            Err(e) => {
                warn!(tool = tool.name(), error = %e, "Tool execution failed");
                (format!("tool execution failed: {}", e), StepOutcome::Failed)
            }
        }
    }
}

/// Apology carrying the failure, plus the last successful observation if
/// there was one
fn best_effort_answer(failure: &str, scratchpad: &[ScratchpadStep]) -> String {
    let apology = format!("{} ({})", GIVE_UP_ANSWER, failure);
    match scratchpad.iter().rev().find(|step| step.succeeded()) {
        Some(step) => format!(
            "{}\n\nInformasi terakhir yang saya temukan:\n{}",
            apology, step.observation
        ),
        None => apology,
    }
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 120;
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() > LIMIT {
        format!("{}…", first_line.chars().take(LIMIT).collect::<String>())
    } else {
        first_line.to_string()
    }
}
