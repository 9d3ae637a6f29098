//! Example: Evolving a Blog Schema
//!
//! This example maps a `posts` table, fills it, then ships a second version
//! of the entity and lets `update_schema` bring the live table in line.
//!
//! Run with: cargo run --example blog_schema -p tabula-sqlite

use futures::TryStreamExt;
use sqlx::Row;
use tabula_core::expr::{count_all, prop};
use tabula_derive::Entity;
use tabula_sqlite::{ClientOptions, SqliteClient};

// =============================================================================
// Entity Versions
// =============================================================================

/// First release: posts with a title and a body.
#[allow(dead_code)]
#[derive(Debug, Clone, Entity)]
#[entity(table = "posts")]
struct PostV1 {
    #[column(primary_key, autoincrement)]
    id: i64,
    title: String,
    body: String,
    #[column(index)]
    published: bool,
}

/// Second release: posts gain an author and lose the index on
/// `published`.
#[allow(dead_code)]
#[derive(Debug, Clone, Entity)]
#[entity(table = "posts")]
struct PostV2 {
    #[column(primary_key, autoincrement)]
    id: i64,
    title: String,
    body: String,
    published: bool,
    #[column(index, default = "anonymous")]
    author: String,
}

fn post(title: &str, published: bool) -> PostV1 {
    PostV1 {
        id: 0,
        title: title.to_string(),
        body: format!("All about {title}."),
        published,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .without_time()
        .init();

    let client = SqliteClient::connect(ClientOptions::default()).await?;

    // =========================================================================
    // Version 1
    // =========================================================================

    let outcome = client.update_schema::<PostV1>().await?;
    println!("v1: {} ({} statements)", outcome.plan.kind(), outcome.executed);

    for (title, published) in [("Ownership", true), ("Lifetimes", true), ("Async", false)] {
        client.insert(&post(title, published)).await?;
    }
    let live = client.count::<PostV1>(Some(&prop("published").eq(true))).await?;
    println!("v1: {live} published post(s)");

    // =========================================================================
    // Version 2
    // =========================================================================

    let outcome = client.update_schema::<PostV2>().await?;
    println!("v2: {} ({} statements)", outcome.plan.kind(), outcome.executed);
    if let Some(schema) = client.schema("posts").await? {
        println!("{}", serde_json::to_string_pretty(&schema)?);
    }

    let per_author = client
        .select::<PostV2>()?
        .column(prop("author"))
        .column(count_all().alias("posts"))
        .group_by(prop("author"))
        .build(client.dialect())?;
    let executable = client.bind(&per_author, &[])?;
    let mut rows = executable.fetch();
    while let Some(row) = rows.try_next().await? {
        println!(
            "{}: {} post(s)",
            row.get::<String, _>("author"),
            row.get::<i64, _>("posts")
        );
    }

    Ok(())
}
