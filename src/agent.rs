use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::frame::DataFrame;

// Contracts for the external reasoning collaborators. Provider wiring and
// credentials live outside this crate.

pub trait TabularAgent {
    fn ask(&self, question: &str, frame: &DataFrame) -> Result<AgentResponse, AnalysisError>;
}

pub trait LanguageModel {
    fn complete(&self, prompt: &str) -> Result<String, AnalysisError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub output: String,
    #[serde(default)]
    pub intermediate_steps: Vec<AgentStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStep {
    pub tool: String,
    pub tool_input: serde_json::Value,
}

impl AgentResponse {
    // The last tool invocation carries the script the agent ran to answer;
    // its input is a JSON object with the source under `query`.
    pub fn last_tool_code(&self) -> Option<&str> {
        self.intermediate_steps
            .last()?
            .tool_input
            .get("query")?
            .as_str()
    }
}

// Pulls the body of the first complete triple-backtick fence out of a model
// completion. The opening fence may carry a language tag; an unclosed fence
// yields nothing.
pub fn extract_code_block(response: &str) -> Option<&str> {
    let after_open = response.split_once("```")?.1;
    let (block, _) = after_open.split_once("```")?;

    let body = match block.split_once('\n') {
        Some((first_line, rest)) if is_language_tag(first_line) => rest,
        _ => block,
    };

    let body = body.trim();
    if body.is_empty() {
        None
    } else {
        Some(body)
    }
}

fn is_language_tag(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.chars().all(|c| c.is_ascii_alphanumeric())
}
