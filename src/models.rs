//! Core data models for the advisor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// One turn of dialogue. Fields are private so an utterance cannot change
/// after it has been created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Utterance {
    id: Uuid,
    role: Role,
    text: String,
    timestamp: DateTime<Utc>,
}

impl Utterance {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

//
// ================= Tool I/O =================
//

/// Parameters handed to a tool. `parameters` is either a plain JSON string
/// or a structured object; each tool validates its own shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub parameters: serde_json::Value,
}

/// Public description of a tool as shown to the language model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A tool choice produced by the language model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub tool_name: String,
    pub tool_input: serde_json::Value,
    pub thought: String,
}

/// What the backend decided during THINKING.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    FinalAnswer { text: String },
    UseTool(ToolCall),
}

impl Decision {
    pub fn final_answer(text: impl Into<String>) -> Self {
        Decision::FinalAnswer { text: text.into() }
    }

    pub fn use_tool(
        tool_name: impl Into<String>,
        tool_input: serde_json::Value,
        thought: impl Into<String>,
    ) -> Self {
        Decision::UseTool(ToolCall {
            tool_name: tool_name.into(),
            tool_input,
            thought: thought.into(),
        })
    }
}

//
// ================= Scratchpad =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    UnknownTool,
    InvalidInput,
    Failed,
}

/// One thought/action/observation triple. Only lives for the duration of a
/// single orchestration call.
#[derive(Debug, Clone, PartialEq)]
pub struct ScratchpadStep {
    pub thought: String,
    pub action: String,
    pub action_input: serde_json::Value,
    pub observation: String,
    pub outcome: StepOutcome,
}

impl ScratchpadStep {
    pub fn new(call: ToolCall, observation: String, outcome: StepOutcome) -> Self {
        Self {
            thought: call.thought,
            action: call.tool_name,
            action_input: call.tool_input,
            observation,
            outcome,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == StepOutcome::Success
    }
}

//
// ================= Orchestration =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentState {
    Thinking,
    Acting,
    Observing,
    Answering,
    Done,
    Failed,
}

/// Caller-visible result of one orchestration call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    pub answer: String,
    pub state: AgentState,
    pub iterations: u32,
    pub failure: Option<String>,
    pub reasoning_trace: Vec<String>,
}

//
// ================= Profile & Interactions =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub owner_name: String,
    pub business_type: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredProfile {
    pub id: i64,
    #[serde(flatten)]
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    pub id: i64,
    pub profile_id: Option<i64>,
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::User => "User",
            Role::Assistant => "INA",
            Role::Tool => "Tool",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentState::Thinking => "THINKING",
            AgentState::Acting => "ACTING",
            AgentState::Observing => "OBSERVING",
            AgentState::Answering => "ANSWERING",
            AgentState::Done => "DONE",
            AgentState::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}
