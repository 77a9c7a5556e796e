use serde_json::json;
use std::cell::RefCell;
use std::path::Path;
use std::sync::Once;
use tempfile::TempDir;

use analysis_workbench_service::agent::{
    self, AgentResponse, AgentStep, LanguageModel, TabularAgent,
};
use analysis_workbench_service::frame::DataFrame;
use analysis_workbench_service::profile::ColumnKind;
use analysis_workbench_service::sandbox::ErrorSink;
use analysis_workbench_service::{AnalysisError, Workbench};

static INIT: Once = Once::new();

fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

const PEOPLE_CSV: &[u8] = b"name,age,score\nAn,23,7.5\nBinh,35,6.0\nChi,41,8.25\n";

#[derive(Default)]
struct CollectingSink {
    messages: RefCell<Vec<String>>,
}

impl CollectingSink {
    fn take(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }
}

impl ErrorSink for CollectingSink {
    fn report(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}

// Stand-in for the external tabular-data agent: a fixed answer plus an
// optional recorded tool invocation carrying plot code.
struct ScriptedAgent {
    answer: String,
    code: Option<String>,
    fail: bool,
}

impl ScriptedAgent {
    fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            code: None,
            fail: false,
        }
    }

    fn with_code(answer: &str, code: &str) -> Self {
        Self {
            answer: answer.to_string(),
            code: Some(code.to_string()),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            answer: String::new(),
            code: None,
            fail: true,
        }
    }
}

impl TabularAgent for ScriptedAgent {
    fn ask(&self, _question: &str, _frame: &DataFrame) -> Result<AgentResponse, AnalysisError> {
        if self.fail {
            return Err(AnalysisError::AgentFailure {
                message: "model backend unavailable".to_string(),
            });
        }

        let intermediate_steps = match &self.code {
            Some(code) => vec![AgentStep {
                tool: "run_dataframe_script".to_string(),
                tool_input: json!({ "query": code }),
            }],
            None => Vec::new(),
        };

        Ok(AgentResponse {
            output: self.answer.clone(),
            intermediate_steps,
        })
    }
}

struct ScriptedModel {
    response: String,
}

impl LanguageModel for ScriptedModel {
    fn complete(&self, _prompt: &str) -> Result<String, AnalysisError> {
        Ok(self.response.clone())
    }
}

fn test_workbench() -> (Workbench, TempDir) {
    init_test_logging();

    let dir = TempDir::new().expect("Failed to create temp dir");
    let workbench = Workbench::new(dir.path().join("catalog.sqlite"), dir.path().join("uploads"))
        .expect("Failed to create workbench");
    (workbench, dir)
}

#[test]
fn test_upload_registers_dataset_with_computed_shape() {
    let (workbench, _dir) = test_workbench();

    // When: raw bytes arrive from the upload channel
    let record = workbench
        .upload_dataset("people.csv", PEOPLE_CSV)
        .expect("Upload should succeed");

    // Then: the catalog record reflects the parsed file
    assert_eq!(record.num_rows, 3);
    assert_eq!(record.num_cols, 3);
    assert_eq!(record.status, "Uploaded");
    assert!(
        record.name.ends_with("_people.csv"),
        "Storage name should keep the original filename: {}",
        record.name
    );
    assert!(
        record.name.len() > "people.csv".len(),
        "Storage name should carry a timestamp prefix"
    );
    assert!(
        Path::new(&record.path).exists(),
        "Uploaded bytes should be persisted at {}",
        record.path
    );
}

#[test]
fn test_upload_of_undecodable_bytes_registers_nothing() {
    let (workbench, _dir) = test_workbench();

    let result = workbench.upload_dataset("garbage.csv", b"a,b\n\x00\xff\x81");

    assert!(
        matches!(&result, Err(AnalysisError::DecodeFailure { .. })),
        "Expected a decode failure, got {:?}",
        result.map(|r| r.id)
    );
    let datasets = workbench
        .store()
        .list_datasets()
        .expect("Failed to list datasets");
    assert!(datasets.is_empty(), "Failed upload must not be registered");
}

#[test]
fn test_ask_with_plain_answer_persists_chat_only() {
    let (workbench, _dir) = test_workbench();
    let record = workbench
        .upload_dataset("people.csv", PEOPLE_CSV)
        .expect("Upload should succeed");
    let agent = ScriptedAgent::answering("There are 3 rows.");
    let sink = CollectingSink::default();

    let outcome = workbench
        .ask(&agent, &record.id, "How many rows?", &sink)
        .expect("Query should succeed");

    assert_eq!(outcome.answer, "There are 3 rows.");
    assert!(outcome.figure.is_none());
    assert!(outcome.executed_code.is_none());

    let entries = workbench
        .store()
        .list_chat_entries(&record.id)
        .expect("Failed to list entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].question, "How many rows?");
    assert_eq!(entries[0].answer, "There are 3 rows.");

    let cards = workbench
        .store()
        .list_chart_cards(&record.id)
        .expect("Failed to list cards");
    assert!(cards.is_empty(), "No chart was drawn, so no card");
}

#[test]
fn test_ask_with_plot_code_persists_chart_card() {
    let (workbench, _dir) = test_workbench();
    let record = workbench
        .upload_dataset("people.csv", PEOPLE_CSV)
        .expect("Upload should succeed");
    let agent = ScriptedAgent::with_code("Ages are spread out.", "hist(df[\"age\"], bins=3)");
    let sink = CollectingSink::default();

    let outcome = workbench
        .ask(&agent, &record.id, "Show the age distribution", &sink)
        .expect("Query should succeed");

    assert!(outcome.figure.is_some(), "Reports: {:?}", sink.take());
    assert_eq!(outcome.executed_code.as_deref(), Some("hist(df[\"age\"], bins=3)"));

    let cards = workbench
        .store()
        .list_chart_cards(&record.id)
        .expect("Failed to list cards");
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].question, "Show the age distribution");
    assert_eq!(cards[0].code, "hist(df[\"age\"], bins=3)");

    let entries = workbench
        .store()
        .list_chat_entries(&record.id)
        .expect("Failed to list entries");
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_ask_with_broken_plot_code_keeps_answer_but_no_card() {
    let (workbench, _dir) = test_workbench();
    let record = workbench
        .upload_dataset("people.csv", PEOPLE_CSV)
        .expect("Upload should succeed");
    let agent = ScriptedAgent::with_code("Here is a chart.", "hist(df[\"salary\"])");
    let sink = CollectingSink::default();

    let outcome = workbench
        .ask(&agent, &record.id, "Plot salaries", &sink)
        .expect("The answer itself should survive a failed chart");

    // Then: the failure was reported inline and only the chat entry persisted
    assert!(outcome.figure.is_none());
    assert!(!sink.take().is_empty(), "Sandbox failure should be reported");
    assert_eq!(
        workbench
            .store()
            .list_chart_cards(&record.id)
            .expect("Failed to list cards")
            .len(),
        0
    );
    assert_eq!(
        workbench
            .store()
            .list_chat_entries(&record.id)
            .expect("Failed to list entries")
            .len(),
        1
    );
}

#[test]
fn test_ask_agent_failure_persists_nothing() {
    let (workbench, _dir) = test_workbench();
    let record = workbench
        .upload_dataset("people.csv", PEOPLE_CSV)
        .expect("Upload should succeed");
    let agent = ScriptedAgent::failing();
    let sink = CollectingSink::default();

    let result = workbench.ask(&agent, &record.id, "How many rows?", &sink);

    assert!(
        matches!(result, Err(AnalysisError::AgentFailure { .. })),
        "Expected the agent failure to surface"
    );
    assert!(workbench
        .store()
        .list_chat_entries(&record.id)
        .expect("Failed to list entries")
        .is_empty());
    assert!(workbench
        .store()
        .list_chart_cards(&record.id)
        .expect("Failed to list cards")
        .is_empty());
}

#[test]
fn test_ask_unknown_dataset_halts() {
    let (workbench, _dir) = test_workbench();
    let agent = ScriptedAgent::answering("unused");
    let sink = CollectingSink::default();

    let result = workbench.ask(&agent, "ds_missing", "Anything?", &sink);

    assert!(
        matches!(&result, Err(AnalysisError::DatasetNotFound { .. })),
        "Expected not-found, got {:?}",
        result.map(|o| o.answer)
    );
}

#[test]
fn test_chart_card_replay_is_deterministic() {
    let (workbench, _dir) = test_workbench();
    let record = workbench
        .upload_dataset("people.csv", PEOPLE_CSV)
        .expect("Upload should succeed");
    let agent = ScriptedAgent::with_code("Spread of ages.", "hist(df[\"age\"], bins=3)");
    let sink = CollectingSink::default();

    let outcome = workbench
        .ask(&agent, &record.id, "Show ages", &sink)
        .expect("Query should succeed");

    // When: the stored card is replayed later against the same dataset
    let card = workbench
        .store()
        .list_chart_cards(&record.id)
        .expect("Failed to list cards")
        .remove(0);
    let (_record, frame) = workbench
        .open_dataset(&record.id)
        .expect("Failed to reopen dataset");
    let replayed = workbench.replay_chart_card(&card, &frame, &sink);

    // Then: the replay reproduces the original figure
    assert_eq!(replayed, outcome.figure);
    assert!(replayed.is_some());
}

#[test]
fn test_suggest_chart_with_fenced_code() {
    let (workbench, _dir) = test_workbench();
    let record = workbench
        .upload_dataset("people.csv", PEOPLE_CSV)
        .expect("Upload should succeed");
    let model = ScriptedModel {
        response: "Here you go:\n```python\nbar(df[\"name\"])\ntitle(\"People\")\n```\nEnjoy!"
            .to_string(),
    };
    let sink = CollectingSink::default();

    let suggestion = workbench
        .suggest_chart(&model, &record.id, "count people by name", &sink)
        .expect("Suggestion should succeed");

    assert_eq!(
        suggestion.code.as_deref(),
        Some("bar(df[\"name\"])\ntitle(\"People\")")
    );
    assert!(suggestion.figure.is_some(), "Reports: {:?}", sink.take());
}

#[test]
fn test_suggest_chart_without_fence_reports_and_returns_nothing() {
    let (workbench, _dir) = test_workbench();
    let record = workbench
        .upload_dataset("people.csv", PEOPLE_CSV)
        .expect("Upload should succeed");
    let model = ScriptedModel {
        response: "I am unable to produce a chart for that.".to_string(),
    };
    let sink = CollectingSink::default();

    let suggestion = workbench
        .suggest_chart(&model, &record.id, "something odd", &sink)
        .expect("A fence-less completion is reported, not fatal");

    assert!(suggestion.code.is_none());
    assert!(suggestion.figure.is_none());
    assert!(
        sink.take()[0].contains("no fenced code block"),
        "The missing fence should be reported"
    );
}

#[test]
fn test_profile_dataset_classifies_columns() {
    let (workbench, _dir) = test_workbench();
    let csv = b"user_id,active,amount,region\n\
u1,yes,10.5,north\n\
u2,no,11.0,south\n\
u3,yes,9.75,north\n\
u4,no,10.0,east\n\
u5,yes,10.25,south\n\
u6,no,10.75,north\n";
    let record = workbench
        .upload_dataset("accounts.csv", csv)
        .expect("Upload should succeed");

    let profiles = workbench
        .profile_dataset(&record.id)
        .expect("Profiling should succeed");

    let kind_of = |name: &str| {
        profiles
            .iter()
            .find(|p| p.name == name)
            .unwrap_or_else(|| panic!("Missing profile for {}", name))
            .kind
    };

    assert_eq!(kind_of("user_id"), ColumnKind::Identifier);
    assert_eq!(kind_of("active"), ColumnKind::Boolean);
    assert_eq!(kind_of("amount"), ColumnKind::Numeric);
    assert_eq!(kind_of("region"), ColumnKind::Categorical);

    let amount = profiles
        .iter()
        .find(|p| p.name == "amount")
        .expect("Missing amount profile");
    let summary = amount.numeric.as_ref().expect("Numeric summary expected");
    assert_eq!(summary.min, 9.75);
    assert_eq!(summary.max, 11.0);
    assert_eq!(amount.missing_pct, 0.0);
}

#[test]
fn test_extract_code_block_variants() {
    assert_eq!(
        agent::extract_code_block("```python\nhist(df[\"a\"])\n```"),
        Some("hist(df[\"a\"])")
    );
    assert_eq!(
        agent::extract_code_block("text before ```\nbar(df[\"b\"])\n``` text after"),
        Some("bar(df[\"b\"])")
    );
    assert_eq!(agent::extract_code_block("no fences here"), None);
    assert_eq!(
        agent::extract_code_block("unclosed ```python\nhist(df[\"a\"])"),
        None
    );
}

#[test]
fn test_last_tool_code_takes_final_step() {
    let response = AgentResponse {
        output: "done".to_string(),
        intermediate_steps: vec![
            AgentStep {
                tool: "run_dataframe_script".to_string(),
                tool_input: json!({ "query": "df.describe()" }),
            },
            AgentStep {
                tool: "run_dataframe_script".to_string(),
                tool_input: json!({ "query": "hist(df[\"age\"])" }),
            },
        ],
    };

    assert_eq!(response.last_tool_code(), Some("hist(df[\"age\"])"));
}
