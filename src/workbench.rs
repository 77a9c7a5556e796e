use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::agent::{self, LanguageModel, TabularAgent};
use crate::catalog::{ChartCard, DatasetRecord};
use crate::error::AnalysisError;
use crate::figure::Figure;
use crate::frame::DataFrame;
use crate::loader;
use crate::profile::{self, ColumnProfile};
use crate::sandbox::{self, ErrorSink};
use crate::store::CatalogStore;

#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub answer: String,
    pub executed_code: Option<String>,
    pub figure: Option<Figure>,
}

#[derive(Debug, Clone)]
pub struct ChartSuggestion {
    pub code: Option<String>,
    pub figure: Option<Figure>,
}

// Ties the catalog store, loader, sandbox and collaborator contracts into the
// per-interaction operations the pages call. Every call runs to completion
// before the next one starts; state lives in the store, not here.
pub struct Workbench {
    store: CatalogStore,
    uploads_dir: PathBuf,
}

impl Workbench {
    pub fn new(
        database_path: impl Into<PathBuf>,
        uploads_dir: impl Into<PathBuf>,
    ) -> Result<Self, AnalysisError> {
        let uploads_dir = uploads_dir.into();
        fs::create_dir_all(&uploads_dir)?;

        let store = CatalogStore::new(database_path);
        store.init_schema()?;

        Ok(Self { store, uploads_dir })
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    // Persists the raw bytes under a timestamp-prefixed name, then registers
    // the dataset. A file that fails to decode is never registered.
    pub fn upload_dataset(
        &self,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<DatasetRecord, AnalysisError> {
        let now = Utc::now();
        let basename = Path::new(original_filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.csv".to_string());
        let storage_name = format!("{}_{}", now.format("%Y%m%d_%H%M%S"), basename);
        let path = self.uploads_dir.join(&storage_name);

        fs::write(&path, bytes)?;
        let frame = loader::load(&path)?;

        let dataset_id = self.store.create_dataset(
            &storage_name,
            &path.to_string_lossy(),
            frame.num_rows() as i32,
            frame.num_cols() as i32,
            now,
        )?;

        info!(
            "Uploaded {} as dataset {} ({} rows x {} cols)",
            basename,
            dataset_id,
            frame.num_rows(),
            frame.num_cols()
        );

        self.store
            .get_dataset(&dataset_id)?
            .ok_or(AnalysisError::DatasetNotFound { dataset_id })
    }

    pub fn open_dataset(
        &self,
        dataset_id: &str,
    ) -> Result<(DatasetRecord, DataFrame), AnalysisError> {
        let record =
            self.store
                .get_dataset(dataset_id)?
                .ok_or_else(|| AnalysisError::DatasetNotFound {
                    dataset_id: dataset_id.to_string(),
                })?;

        let frame = loader::load(Path::new(&record.path))?;
        Ok((record, frame))
    }

    // One question against one dataset. An agent failure propagates before
    // anything is persisted; a successful answer always lands in the chat
    // history, and in the chart cards too when its plot code drew a figure.
    pub fn ask(
        &self,
        agent: &dyn TabularAgent,
        dataset_id: &str,
        question: &str,
        errors: &dyn ErrorSink,
    ) -> Result<QueryOutcome, AnalysisError> {
        let (record, frame) = self.open_dataset(dataset_id)?;

        let response = agent.ask(question, &frame)?;

        let mut executed_code = None;
        let mut figure = None;

        if let Some(code) = response.last_tool_code() {
            if sandbox::looks_like_plot_code(code) {
                figure = sandbox::execute(code, &frame, errors);
                if figure.is_some() {
                    self.store
                        .create_chart_card(&record.id, question, &response.output, code)?;
                }
                executed_code = Some(code.to_string());
            }
        }

        self.store
            .append_chat_entry(&record.id, question, &response.output)?;

        Ok(QueryOutcome {
            answer: response.output,
            executed_code,
            figure,
        })
    }

    // Free-form chart suggestion: the model writes the plot script, the
    // sandbox runs it. Nothing is persisted either way.
    pub fn suggest_chart(
        &self,
        model: &dyn LanguageModel,
        dataset_id: &str,
        description: &str,
        errors: &dyn ErrorSink,
    ) -> Result<ChartSuggestion, AnalysisError> {
        let (_record, frame) = self.open_dataset(dataset_id)?;

        let prompt = chart_prompt(&frame, description);
        let response = model.complete(&prompt)?;

        match agent::extract_code_block(&response) {
            Some(code) => {
                let figure = sandbox::execute(code, &frame, errors);
                Ok(ChartSuggestion {
                    code: Some(code.to_string()),
                    figure,
                })
            }
            None => {
                errors.report("Model response contained no fenced code block");
                Ok(ChartSuggestion {
                    code: None,
                    figure: None,
                })
            }
        }
    }

    pub fn replay_chart_card(
        &self,
        card: &ChartCard,
        frame: &DataFrame,
        errors: &dyn ErrorSink,
    ) -> Option<Figure> {
        sandbox::execute(&card.code, frame, errors)
    }

    pub fn profile_dataset(&self, dataset_id: &str) -> Result<Vec<ColumnProfile>, AnalysisError> {
        let (_record, frame) = self.open_dataset(dataset_id)?;
        Ok(profile::profile_columns(&frame))
    }
}

fn chart_prompt(frame: &DataFrame, description: &str) -> String {
    format!(
        "You are a data visualization assistant. You are given a dataframe `df` \
         with columns: {:?}. The user described the chart they want as: '{}'. \
         Respond with a single fenced code block containing plot script calls \
         (hist, bar, line, scatter, title, xlabel, ylabel) against `df`.",
        frame.column_names(),
        description
    )
}
