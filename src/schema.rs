diesel::table! {
    datasets (id) {
        id -> Text,
        name -> Text,
        path -> Text,
        num_rows -> Integer,
        num_cols -> Integer,
        uploaded_at -> TimestamptzSqlite,
        status -> Text,
    }
}

diesel::table! {
    chat_history (id) {
        id -> BigInt,
        dataset_id -> Text,
        created_at -> TimestamptzSqlite,
        question -> Text,
        answer -> Text,
    }
}

diesel::table! {
    chart_cards (id) {
        id -> BigInt,
        dataset_id -> Text,
        question -> Text,
        answer -> Text,
        code -> Text,
        created_at -> TimestamptzSqlite,
    }
}

diesel::table! {
    chat_sessions (id) {
        id -> BigInt,
        dataset_id -> Text,
        title -> Text,
        created_at -> TimestamptzSqlite,
    }
}

diesel::table! {
    chat_messages (id) {
        id -> BigInt,
        session_id -> BigInt,
        role -> Text,
        content -> Text,
        created_at -> TimestamptzSqlite,
    }
}

diesel::joinable!(chat_history -> datasets (dataset_id));
diesel::joinable!(chart_cards -> datasets (dataset_id));
diesel::joinable!(chat_sessions -> datasets (dataset_id));
diesel::joinable!(chat_messages -> chat_sessions (session_id));

diesel::allow_tables_to_appear_in_same_query!(
    datasets,
    chat_history,
    chart_cards,
    chat_sessions,
    chat_messages,
);
