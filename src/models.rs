use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::catalog::{
    ChartCard, ChatEntry, ChatMessage, ChatSession, DatasetRecord, MessageRole,
};
use crate::schema::{chart_cards, chat_history, chat_messages, chat_sessions, datasets};

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = datasets)]
#[diesel(primary_key(id))]
pub struct DatasetRow {
    pub id: String,
    pub name: String,
    pub path: String,
    pub num_rows: i32,
    pub num_cols: i32,
    pub uploaded_at: DateTime<Utc>,
    pub status: String,
}

#[derive(Insertable)]
#[diesel(table_name = datasets)]
pub struct NewDatasetRow<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub path: &'a str,
    pub num_rows: i32,
    pub num_cols: i32,
    pub uploaded_at: DateTime<Utc>,
    pub status: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone)]
#[diesel(table_name = chat_history)]
#[diesel(belongs_to(DatasetRow, foreign_key = dataset_id))]
pub struct ChatEntryRow {
    pub id: i64,
    pub dataset_id: String,
    pub created_at: DateTime<Utc>,
    pub question: String,
    pub answer: String,
}

#[derive(Insertable)]
#[diesel(table_name = chat_history)]
pub struct NewChatEntryRow<'a> {
    pub dataset_id: &'a str,
    pub created_at: DateTime<Utc>,
    pub question: &'a str,
    pub answer: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone)]
#[diesel(table_name = chart_cards)]
#[diesel(belongs_to(DatasetRow, foreign_key = dataset_id))]
pub struct ChartCardRow {
    pub id: i64,
    pub dataset_id: String,
    pub question: String,
    pub answer: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = chart_cards)]
pub struct NewChartCardRow<'a> {
    pub dataset_id: &'a str,
    pub question: &'a str,
    pub answer: &'a str,
    pub code: &'a str,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone)]
#[diesel(table_name = chat_sessions)]
#[diesel(belongs_to(DatasetRow, foreign_key = dataset_id))]
pub struct ChatSessionRow {
    pub id: i64,
    pub dataset_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = chat_sessions)]
pub struct NewChatSessionRow<'a> {
    pub dataset_id: &'a str,
    pub title: &'a str,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone)]
#[diesel(table_name = chat_messages)]
#[diesel(belongs_to(ChatSessionRow, foreign_key = session_id))]
pub struct ChatMessageRow {
    pub id: i64,
    pub session_id: i64,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = chat_messages)]
pub struct NewChatMessageRow<'a> {
    pub session_id: i64,
    pub role: &'a str,
    pub content: &'a str,
    pub created_at: DateTime<Utc>,
}

impl From<DatasetRow> for DatasetRecord {
    fn from(row: DatasetRow) -> Self {
        DatasetRecord {
            id: row.id,
            name: row.name,
            path: row.path,
            num_rows: row.num_rows,
            num_cols: row.num_cols,
            uploaded_at: row.uploaded_at,
            status: row.status,
        }
    }
}

impl From<ChatEntryRow> for ChatEntry {
    fn from(row: ChatEntryRow) -> Self {
        ChatEntry {
            id: row.id,
            dataset_id: row.dataset_id,
            created_at: row.created_at,
            question: row.question,
            answer: row.answer,
        }
    }
}

impl From<ChartCardRow> for ChartCard {
    fn from(row: ChartCardRow) -> Self {
        ChartCard {
            id: row.id,
            dataset_id: row.dataset_id,
            question: row.question,
            answer: row.answer,
            code: row.code,
            created_at: row.created_at,
        }
    }
}

impl From<ChatSessionRow> for ChatSession {
    fn from(row: ChatSessionRow) -> Self {
        ChatSession {
            id: row.id,
            dataset_id: row.dataset_id,
            title: row.title,
            created_at: row.created_at,
        }
    }
}

impl From<ChatMessageRow> for ChatMessage {
    fn from(row: ChatMessageRow) -> Self {
        let role = match row.role.as_str() {
            "user" => MessageRole::User,
            _ => MessageRole::Assistant,
        };

        ChatMessage {
            id: row.id,
            session_id: row.session_id,
            role,
            content: row.content,
            created_at: row.created_at,
        }
    }
}
