//! Executing entity commands, executables and transactions.

use std::time::Duration;

use futures::TryStreamExt;
use sqlx::Row;
use tabula_core::expr::{prop, value};
use tabula_core::{Arg, SqlValue};
use tabula_derive::{Entity, SqlEnum};
use tabula_sqlite::{decode_row, ClientError, ClientOptions, SqliteClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, SqlEnum)]
enum Priority {
    Low = 1,
    High = 5,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Entity)]
#[entity(table = "notes")]
struct Note {
    #[column(primary_key, autoincrement)]
    id: i64,
    title: String,
    #[column(nullable)]
    body: Option<String>,
    #[column(enum_repr = "i32")]
    priority: Priority,
    #[column(default = false)]
    pinned: bool,
}

fn note(title: &str, priority: Priority) -> Note {
    Note {
        id: 0,
        title: title.to_string(),
        body: None,
        priority,
        pinned: false,
    }
}

async fn client_with(options: ClientOptions) -> SqliteClient {
    let client = SqliteClient::connect(options).await.unwrap();
    client.update_schema::<Note>().await.unwrap();
    for (title, priority) in [
        ("groceries", Priority::Low),
        ("taxes", Priority::High),
        ("garden", Priority::Low),
    ] {
        client.insert(&note(title, priority)).await.unwrap();
    }
    client
}

async fn client() -> SqliteClient {
    client_with(ClientOptions::default()).await
}

// =============================================================================
// Entity commands
// =============================================================================

#[tokio::test]
async fn test_insert_load_and_count() {
    let client = client().await;
    assert_eq!(client.count::<Note>(None).await.unwrap(), 3);

    let high = prop("priority").eq(value(Priority::High));
    assert_eq!(client.count::<Note>(Some(&high)).await.unwrap(), 1);

    let rows = client.load::<Note>(Some(high)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get::<String, _>("title"), "taxes");
    assert_eq!(rows[0].get::<i64, _>("priority"), 5);
    assert_eq!(rows[0].get::<Option<String>, _>("body"), None);
}

#[tokio::test]
async fn test_update_and_delete_by_key() {
    let client = client().await;

    let mut taxes = note("taxes, filed", Priority::Low);
    taxes.id = 2;
    taxes.body = Some(String::from("done"));
    assert_eq!(client.update(&taxes).await.unwrap(), 1);

    let rows = client.load::<Note>(Some(prop("id").eq(2))).await.unwrap();
    assert_eq!(rows[0].get::<String, _>("title"), "taxes, filed");
    assert_eq!(rows[0].get::<Option<String>, _>("body").as_deref(), Some("done"));

    assert_eq!(client.delete(&taxes).await.unwrap(), 1);
    assert_eq!(client.delete(&taxes).await.unwrap(), 0);
    assert_eq!(client.count::<Note>(None).await.unwrap(), 2);
}

#[tokio::test]
async fn test_null_comparison_becomes_is_null() {
    let client = client().await;
    let missing_body = prop("body").eq(SqlValue::Null);
    assert_eq!(client.count::<Note>(Some(&missing_body)).await.unwrap(), 3);

    let with_body = prop("body").ne(SqlValue::Null);
    assert_eq!(client.count::<Note>(Some(&with_body)).await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_many_with_array_argument() {
    let client = client().await;

    assert_eq!(client.delete_many::<Note, _>([1_i64, 3]).await.unwrap(), 2);
    assert_eq!(client.delete_many::<Note, _>(Vec::<i64>::new()).await.unwrap(), 0);

    let rows = client.load::<Note>(None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get::<String, _>("title"), "taxes");
}

#[tokio::test]
async fn test_prepared_operation_is_reusable() {
    let client = client().await;
    let commands = client.commands::<Note>().unwrap();
    let insert = commands.insert().unwrap();

    for title in ["a", "b"] {
        let args = commands.insert_args(&note(title, Priority::High));
        client.bind(&insert, &args).unwrap().execute().await.unwrap();
    }
    assert_eq!(client.count::<Note>(None).await.unwrap(), 5);

    let err = client.bind(&insert, &[]).unwrap_err();
    assert!(matches!(
        err,
        ClientError::Core(tabula_core::Error::ArgumentMismatch(_))
    ));
}

#[tokio::test]
async fn test_case_insensitive_properties() {
    let strict = client().await;
    let err = strict
        .count::<Note>(Some(&prop("Title").eq("taxes")))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Property 'Title' not found"));

    let relaxed = client_with(ClientOptions::default().case_insensitive_properties(true)).await;
    let n = relaxed
        .count::<Note>(Some(&prop("Title").eq("taxes")))
        .await
        .unwrap();
    assert_eq!(n, 1);
}

// =============================================================================
// Executables
// =============================================================================

#[tokio::test]
async fn test_select_query_streams_rows_lazily() {
    let client = client().await;
    let query = client
        .select::<Note>()
        .unwrap()
        .column(prop("title"))
        .order_by_desc(prop("id"))
        .limit(2)
        .build(client.dialect())
        .unwrap();
    let executable = client.bind(&query, &[]).unwrap();

    let titles: Vec<String> = executable
        .fetch()
        .map_ok(|row| row.get::<String, _>("title"))
        .try_collect()
        .await
        .unwrap();
    assert_eq!(titles, vec!["garden", "taxes"]);
}

#[tokio::test]
async fn test_scalar_and_row_decoding() {
    let client = client().await;

    let executable = client.raw(
        "SELECT MAX(priority) AS top, ? AS label FROM notes",
        vec![SqlValue::Text(String::from("max"))],
    );
    assert_eq!(executable.scalar().await.unwrap(), SqlValue::Int(5));

    let rows = executable.fetch_all().await.unwrap();
    assert_eq!(
        decode_row(&rows[0]).unwrap(),
        vec![
            (String::from("top"), SqlValue::Int(5)),
            (String::from("label"), SqlValue::Text(String::from("max"))),
        ]
    );

    let empty = client.raw("SELECT id FROM notes WHERE id < 0", Vec::new());
    assert_eq!(empty.scalar().await.unwrap(), SqlValue::Null);
}

#[tokio::test]
async fn test_failed_statement_reports_sql_and_params() {
    let client = client().await;
    let err = client
        .raw(
            "INSERT INTO notes (id, title, priority, pinned) VALUES (?, ?, ?, ?)",
            vec![
                SqlValue::Int(1),
                SqlValue::Text(String::from("duplicate")),
                SqlValue::Int(1),
                SqlValue::Int(0),
            ],
        )
        .execute()
        .await
        .unwrap_err();

    match err {
        ClientError::Statement { sql, params, .. } => {
            assert!(sql.starts_with("INSERT INTO notes"));
            assert_eq!(params.len(), 4);
            assert_eq!(params[1], SqlValue::Text(String::from("duplicate")));
        }
        other => panic!("expected statement error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_command_timeout() {
    let client = SqliteClient::connect(ClientOptions::default().command_timeout(Duration::from_millis(20)))
        .await
        .unwrap();
    let slow = client.raw(
        "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 100000000) SELECT COUNT(*) FROM c",
        Vec::new(),
    );
    let err = slow.scalar().await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout { timeout, .. } if timeout == Duration::from_millis(20)));
}

// =============================================================================
// Transactions
// =============================================================================

#[tokio::test]
async fn test_dropped_transaction_rolls_back() {
    let client = client().await;
    let commands = client.commands::<Note>().unwrap();
    let insert = client
        .bind(
            &commands.insert().unwrap(),
            &commands.insert_args(&note("draft", Priority::Low)),
        )
        .unwrap();

    {
        let mut transaction = client.begin().await.unwrap();
        insert.execute_in(&mut transaction).await.unwrap();
        let inside = client
            .bind(&commands.count(None).unwrap(), &[])
            .unwrap()
            .scalar_in(&mut transaction)
            .await
            .unwrap();
        assert_eq!(inside, SqlValue::Int(4));
    }
    assert_eq!(client.count::<Note>(None).await.unwrap(), 3);

    let mut transaction = client.begin().await.unwrap();
    insert.execute_in(&mut transaction).await.unwrap();
    transaction.commit().await.unwrap();
    assert_eq!(client.count::<Note>(None).await.unwrap(), 4);
}

#[tokio::test]
async fn test_explicit_rollback_and_reader_in_transaction() {
    let client = client().await;
    let mut transaction = client.begin().await.unwrap();

    let commands = client.commands::<Note>().unwrap();
    let deleted = client
        .bind(&commands.delete_many().unwrap(), &[Arg::array([1_i64, 2, 3])])
        .unwrap()
        .execute_in(&mut transaction)
        .await
        .unwrap();
    assert_eq!(deleted, 3);

    let load = client.bind(&commands.load(None).unwrap(), &[]).unwrap();
    let rows: Vec<_> = load.fetch_in(&mut transaction).try_collect().await.unwrap();
    assert!(rows.is_empty());

    transaction.rollback().await.unwrap();
    assert_eq!(client.count::<Note>(None).await.unwrap(), 3);
}

// =============================================================================
// Maintenance
// =============================================================================

#[tokio::test]
async fn test_truncate_with_sequence_reset() {
    let client = client().await;

    assert_eq!(client.truncate("notes", true).await.unwrap(), 3);
    assert_eq!(client.count::<Note>(None).await.unwrap(), 0);

    client.insert(&note("fresh", Priority::Low)).await.unwrap();
    let id = client
        .raw("SELECT id FROM notes", Vec::new())
        .scalar()
        .await
        .unwrap();
    assert_eq!(id, SqlValue::Int(1));
}

#[tokio::test]
async fn test_file_database_persists_across_clients() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("notes.db").display());

    {
        let client = client_with(ClientOptions::new(url.clone())).await;
        assert_eq!(client.count::<Note>(None).await.unwrap(), 3);
        client.pool().close().await;
    }

    let client = SqliteClient::open(&url).await.unwrap();
    assert!(client.table_exists("notes").await.unwrap());
    assert!(client.update_schema::<Note>().await.unwrap().is_noop());
    client.drop_table("notes").await.unwrap();
    assert!(!client.table_exists("notes").await.unwrap());
}
