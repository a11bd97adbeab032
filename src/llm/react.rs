//! ReAct text protocol parser
//!
//! Models that answer in plain text use the classic format:
//!
//! ```text
//! Thought: ...
//! Action: tool_name
//! Action Input: {"json": "or plain text"}
//! ```
//!
//! or `Final Answer: ...`. Text without any marker is taken as the answer.

use crate::models::{Decision, ToolCall};
use serde_json::Value;

const THOUGHT: &str = "Thought:";
const ACTION: &str = "Action:";
const ACTION_INPUT: &str = "Action Input:";
const OBSERVATION: &str = "Observation:";
const FINAL_ANSWER: &str = "Final Answer:";

/// Parse model text into a decision
pub fn parse_react_output(text: &str) -> Decision {
    let action_at = find_action(text);
    let final_at = text.find(FINAL_ANSWER);

    match (action_at, final_at) {
        (Some(a), Some(f)) if f < a => final_answer(text, f),
        (Some(a), _) => match parse_action(text, a) {
            Some(call) => Decision::UseTool(call),
            None => match final_at {
                Some(f) => final_answer(text, f),
                None => Decision::final_answer(text.trim()),
            },
        },
        (None, Some(f)) => final_answer(text, f),
        (None, None) => Decision::final_answer(text.trim()),
    }
}

/// Position of an `Action:` marker that is not part of `Action Input:`
fn find_action(text: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(pos) = text[offset..].find(ACTION) {
        let at = offset + pos;
        let preceded_by_word = text[..at]
            .chars()
            .next_back()
            .map(|c| c.is_alphanumeric())
            .unwrap_or(false);
        if !preceded_by_word {
            return Some(at);
        }
        offset = at + ACTION.len();
    }
    None
}

fn final_answer(text: &str, at: usize) -> Decision {
    Decision::final_answer(text[at + FINAL_ANSWER.len()..].trim())
}

fn parse_action(text: &str, at: usize) -> Option<ToolCall> {
    let after_action = &text[at + ACTION.len()..];
    let tool_name = after_action
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('`')
        .to_string();
    if tool_name.is_empty() {
        return None;
    }

    let raw_input = match after_action.find(ACTION_INPUT) {
        Some(pos) => {
            let rest = &after_action[pos + ACTION_INPUT.len()..];
            let end = rest.find(OBSERVATION).unwrap_or(rest.len());
            rest[..end].trim()
        }
        None => "",
    };

    let thought = text[..at].trim();
    let thought = thought.strip_prefix(THOUGHT).unwrap_or(thought).trim();

    Some(ToolCall {
        tool_name,
        tool_input: parse_action_input(raw_input),
        thought: thought.to_string(),
    })
}

/// JSON when it parses, otherwise the text with surrounding quotes removed
fn parse_action_input(raw: &str) -> Value {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    match serde_json::from_str::<Value>(cleaned) {
        Ok(value) => value,
        Err(_) => Value::String(cleaned.trim_matches('"').to_string()),
    }
}
