use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

use crate::catalog::{
    ChartCard, ChatEntry, ChatMessage, ChatSession, DatasetRecord, DatasetSummary, MessageRole,
};
use crate::error::AnalysisError;
use crate::models::*;
use crate::schema;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

// One connection per operation; nothing is pooled or held across calls.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    database_path: PathBuf,
}

impl CatalogStore {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }

    pub fn database_path(&self) -> &PathBuf {
        &self.database_path
    }

    fn connect(&self) -> Result<SqliteConnection, AnalysisError> {
        let url = self.database_path.to_string_lossy();
        SqliteConnection::establish(&url).map_err(|e| AnalysisError::ConfigError {
            message: format!(
                "Failed to open catalog database {}: {}",
                self.database_path.display(),
                e
            ),
        })
    }

    pub fn init_schema(&self) -> Result<(), AnalysisError> {
        let mut conn = self.connect()?;

        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| AnalysisError::ConfigError {
                message: format!("Failed to run migrations: {}", e),
            })?;

        Ok(())
    }

    pub fn create_dataset(
        &self,
        name: &str,
        path: &str,
        num_rows: i32,
        num_cols: i32,
        uploaded_at: DateTime<Utc>,
    ) -> Result<String, AnalysisError> {
        use crate::schema::datasets::dsl::datasets;

        let dataset_id = format!("ds_{}", Uuid::new_v4().simple());
        info!("Registering dataset {} as {}", name, dataset_id);

        let mut conn = self.connect()?;

        let new_dataset = NewDatasetRow {
            id: &dataset_id,
            name,
            path,
            num_rows,
            num_cols,
            uploaded_at,
            status: "Uploaded",
        };

        diesel::insert_into(datasets)
            .values(&new_dataset)
            .execute(&mut conn)?;

        Ok(dataset_id)
    }

    pub fn list_datasets(&self) -> Result<Vec<DatasetSummary>, AnalysisError> {
        use crate::schema::datasets::dsl::*;

        let mut conn = self.connect()?;

        let rows = datasets
            .select((id, name, num_rows, num_cols, uploaded_at, status))
            .order(uploaded_at.asc())
            .load::<(String, String, i32, i32, DateTime<Utc>, String)>(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(
                |(row_id, row_name, rows_count, cols_count, uploaded, row_status)| {
                    DatasetSummary {
                        id: row_id,
                        name: row_name,
                        num_rows: rows_count,
                        num_cols: cols_count,
                        uploaded_at: uploaded,
                        status: row_status,
                    }
                },
            )
            .collect())
    }

    pub fn get_dataset(&self, dataset_id: &str) -> Result<Option<DatasetRecord>, AnalysisError> {
        use crate::schema::datasets::dsl::*;

        let mut conn = self.connect()?;

        let row = datasets
            .filter(id.eq(dataset_id))
            .get_result::<DatasetRow>(&mut conn)
            .optional()?;

        Ok(row.map(|r| r.into()))
    }

    // No-op when the id is absent, matching the zero-rows-affected contract.
    pub fn rename_dataset(&self, dataset_id: &str, new_name: &str) -> Result<(), AnalysisError> {
        use crate::schema::datasets::dsl::*;

        let mut conn = self.connect()?;

        diesel::update(datasets.filter(id.eq(dataset_id)))
            .set(name.eq(new_name))
            .execute(&mut conn)?;

        Ok(())
    }

    // Foreign keys are declared but not engine-enforced, so the cascade is
    // explicit: messages -> sessions -> chart cards -> chat history -> dataset.
    pub fn delete_dataset(&self, dataset_id: &str) -> Result<(), AnalysisError> {
        info!("Deleting dataset {} and dependent records", dataset_id);

        let mut conn = self.connect()?;

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let session_ids = schema::chat_sessions::table
                .select(schema::chat_sessions::id)
                .filter(schema::chat_sessions::dataset_id.eq(dataset_id));

            diesel::delete(
                schema::chat_messages::table
                    .filter(schema::chat_messages::session_id.eq_any(session_ids)),
            )
            .execute(conn)?;

            diesel::delete(
                schema::chat_sessions::table
                    .filter(schema::chat_sessions::dataset_id.eq(dataset_id)),
            )
            .execute(conn)?;

            diesel::delete(
                schema::chart_cards::table.filter(schema::chart_cards::dataset_id.eq(dataset_id)),
            )
            .execute(conn)?;

            diesel::delete(
                schema::chat_history::table.filter(schema::chat_history::dataset_id.eq(dataset_id)),
            )
            .execute(conn)?;

            diesel::delete(schema::datasets::table.filter(schema::datasets::id.eq(dataset_id)))
                .execute(conn)?;

            Ok(())
        })?;

        Ok(())
    }

    pub fn append_chat_entry(
        &self,
        entry_dataset_id: &str,
        entry_question: &str,
        entry_answer: &str,
    ) -> Result<i64, AnalysisError> {
        use crate::schema::chat_history::dsl::*;

        let mut conn = self.connect()?;

        let new_entry = NewChatEntryRow {
            dataset_id: entry_dataset_id,
            created_at: Utc::now(),
            question: entry_question,
            answer: entry_answer,
        };

        let entry_id = diesel::insert_into(chat_history)
            .values(&new_entry)
            .returning(id)
            .get_result::<i64>(&mut conn)?;

        Ok(entry_id)
    }

    pub fn list_chat_entries(&self, entry_dataset_id: &str) -> Result<Vec<ChatEntry>, AnalysisError> {
        use crate::schema::chat_history::dsl::*;

        let mut conn = self.connect()?;

        let rows = chat_history
            .filter(dataset_id.eq(entry_dataset_id))
            .order(id.asc())
            .get_results::<ChatEntryRow>(&mut conn)?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    pub fn create_chart_card(
        &self,
        card_dataset_id: &str,
        card_question: &str,
        card_answer: &str,
        card_code: &str,
    ) -> Result<i64, AnalysisError> {
        use crate::schema::chart_cards::dsl::*;

        let mut conn = self.connect()?;

        let new_card = NewChartCardRow {
            dataset_id: card_dataset_id,
            question: card_question,
            answer: card_answer,
            code: card_code,
            created_at: Utc::now(),
        };

        let card_id = diesel::insert_into(chart_cards)
            .values(&new_card)
            .returning(id)
            .get_result::<i64>(&mut conn)?;

        Ok(card_id)
    }

    pub fn list_chart_cards(&self, card_dataset_id: &str) -> Result<Vec<ChartCard>, AnalysisError> {
        use crate::schema::chart_cards::dsl::*;

        let mut conn = self.connect()?;

        let rows = chart_cards
            .filter(dataset_id.eq(card_dataset_id))
            .order(id.desc())
            .get_results::<ChartCardRow>(&mut conn)?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    pub fn delete_chart_card(&self, card_id: i64) -> Result<(), AnalysisError> {
        use crate::schema::chart_cards::dsl::*;

        let mut conn = self.connect()?;

        diesel::delete(chart_cards.filter(id.eq(card_id))).execute(&mut conn)?;

        Ok(())
    }

    pub fn create_chat_session(
        &self,
        session_dataset_id: &str,
        session_title: &str,
    ) -> Result<i64, AnalysisError> {
        use crate::schema::chat_sessions::dsl::*;

        let mut conn = self.connect()?;

        let new_session = NewChatSessionRow {
            dataset_id: session_dataset_id,
            title: session_title,
            created_at: Utc::now(),
        };

        let session_id = diesel::insert_into(chat_sessions)
            .values(&new_session)
            .returning(id)
            .get_result::<i64>(&mut conn)?;

        Ok(session_id)
    }

    pub fn list_chat_sessions(
        &self,
        session_dataset_id: &str,
    ) -> Result<Vec<ChatSession>, AnalysisError> {
        use crate::schema::chat_sessions::dsl::*;

        let mut conn = self.connect()?;

        let rows = chat_sessions
            .filter(dataset_id.eq(session_dataset_id))
            .order(created_at.desc())
            .get_results::<ChatSessionRow>(&mut conn)?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    // Only the title changes; created_at keeps the original creation time.
    pub fn rename_chat_session(
        &self,
        chat_session_id: i64,
        new_title: &str,
    ) -> Result<(), AnalysisError> {
        use crate::schema::chat_sessions::dsl::*;

        let mut conn = self.connect()?;

        diesel::update(chat_sessions.filter(id.eq(chat_session_id)))
            .set(title.eq(new_title))
            .execute(&mut conn)?;

        Ok(())
    }

    pub fn delete_chat_session(&self, chat_session_id: i64) -> Result<(), AnalysisError> {
        let mut conn = self.connect()?;

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::delete(
                schema::chat_messages::table
                    .filter(schema::chat_messages::session_id.eq(chat_session_id)),
            )
            .execute(conn)?;

            diesel::delete(
                schema::chat_sessions::table.filter(schema::chat_sessions::id.eq(chat_session_id)),
            )
            .execute(conn)?;

            Ok(())
        })?;

        Ok(())
    }

    pub fn append_chat_message(
        &self,
        message_session_id: i64,
        message_role: MessageRole,
        message_content: &str,
    ) -> Result<i64, AnalysisError> {
        use crate::schema::chat_messages::dsl::*;

        let mut conn = self.connect()?;

        let new_message = NewChatMessageRow {
            session_id: message_session_id,
            role: message_role.as_str(),
            content: message_content,
            created_at: Utc::now(),
        };

        let message_id = diesel::insert_into(chat_messages)
            .values(&new_message)
            .returning(id)
            .get_result::<i64>(&mut conn)?;

        Ok(message_id)
    }

    pub fn list_chat_messages(
        &self,
        message_session_id: i64,
    ) -> Result<Vec<ChatMessage>, AnalysisError> {
        use crate::schema::chat_messages::dsl::*;

        let mut conn = self.connect()?;

        let rows = chat_messages
            .filter(session_id.eq(message_session_id))
            .order(id.asc())
            .get_results::<ChatMessageRow>(&mut conn)?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    pub fn delete_chat_message(
        &self,
        message_session_id: i64,
        message_id: i64,
    ) -> Result<(), AnalysisError> {
        use crate::schema::chat_messages::dsl::*;

        let mut conn = self.connect()?;

        diesel::delete(
            chat_messages
                .filter(session_id.eq(message_session_id))
                .filter(id.eq(message_id)),
        )
        .execute(&mut conn)?;

        Ok(())
    }
}
