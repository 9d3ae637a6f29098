//! The synchronous client.

use sqlx::Row;
use tabula_core::expr::prop;
use tabula_core::SqlValue;
use tabula_derive::Entity;
use tabula_sqlite::{BlockingClient, ClientOptions};

#[allow(dead_code)]
#[derive(Debug, Clone, Entity)]
#[entity(table = "events")]
struct Event {
    #[column(primary_key, autoincrement)]
    id: i64,
    kind: String,
    #[column(index)]
    weight: i32,
}

fn event(kind: &str, weight: i32) -> Event {
    Event {
        id: 0,
        kind: kind.to_string(),
        weight,
    }
}

fn client() -> BlockingClient {
    let client = BlockingClient::connect(ClientOptions::default()).unwrap();
    assert!(!client.update_schema::<Event>().unwrap().is_noop());
    for (kind, weight) in [("open", 1), ("click", 2), ("close", 3)] {
        assert_eq!(client.insert(&event(kind, weight)).unwrap(), 1);
    }
    client
}

// =============================================================================
// Plain calls
// =============================================================================

#[test]
fn test_schema_and_counts() {
    let client = client();
    assert!(client.table_exists("events").unwrap());
    assert!(client.schema("events").unwrap().is_some());
    assert!(client.update_schema::<Event>().unwrap().is_noop());

    assert_eq!(client.count::<Event>(None).unwrap(), 3);
    let heavy = prop("weight").gt(1);
    assert_eq!(client.count::<Event>(Some(&heavy)).unwrap(), 2);
}

#[test]
fn test_rows_are_read_lazily() {
    let client = client();
    let load = client
        .client()
        .raw("SELECT kind FROM events ORDER BY weight", Vec::new());

    let mut rows = client.rows(&load);
    let first = rows.next().unwrap().unwrap();
    assert_eq!(first.get::<String, _>("kind"), "open");
    // Dropping a half-read iterator releases the connection.
    drop(rows);

    let kinds: Vec<String> = client
        .rows(&load)
        .map(|row| row.unwrap().get::<String, _>("kind"))
        .collect();
    assert_eq!(kinds, vec!["open", "click", "close"]);
}

// =============================================================================
// Transactions
// =============================================================================

#[test]
fn test_dropped_transaction_rolls_back() {
    let client = client();
    let wipe = client.client().raw("DELETE FROM events", Vec::new());

    {
        let mut transaction = client.begin().unwrap();
        assert_eq!(client.execute_in(&wipe, &mut transaction).unwrap(), 3);
    }
    assert_eq!(client.count::<Event>(None).unwrap(), 3);

    let transaction = client.begin().unwrap();
    transaction.rollback().unwrap();
    assert_eq!(client.count::<Event>(None).unwrap(), 3);
}

#[test]
fn test_committed_transaction_is_visible() {
    let client = client();
    let add = client.client().raw(
        "INSERT INTO events (kind, weight) VALUES (?, ?)",
        vec![SqlValue::Text(String::from("scroll")), SqlValue::Int(4)],
    );
    let total = client
        .client()
        .raw("SELECT SUM(weight) FROM events", Vec::new());

    let mut transaction = client.begin().unwrap();
    client.execute_in(&add, &mut transaction).unwrap();
    assert_eq!(
        client.scalar_in(&total, &mut transaction).unwrap(),
        SqlValue::Int(10)
    );
    {
        let kinds: Vec<String> = client
            .rows_in(&total, &mut transaction)
            .unwrap()
            .map(|row| row.unwrap().get::<i64, _>(0).to_string())
            .collect();
        assert_eq!(kinds, vec!["10"]);
    }
    transaction.commit().unwrap();

    assert_eq!(client.scalar(&total).unwrap(), SqlValue::Int(10));
    assert_eq!(client.execute(&add).unwrap(), 1);
    assert_eq!(client.count::<Event>(None).unwrap(), 5);
}
