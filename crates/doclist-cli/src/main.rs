//! `doclist`: print every document of a Firestore collection as JSON.

use std::io::{self, Write};

use anyhow::{anyhow, Context};
use clap::Parser;
use serde_json::{Map, Value};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use doclist_firestore::{
    Credentials, FirestoreClient, FirestoreConfig, ListOptions, TypedDocument,
};

/// List every document of a Firestore collection.
#[derive(Debug, Parser)]
#[command(name = "doclist", version)]
struct Cli {
    /// Collection path, e.g. `users` or `users alice posts`
    #[arg(required = true)]
    segments: Vec<String>,

    /// GCP project (defaults to GCP_PROJECT_ID / FIREBASE_PROJECT_ID)
    #[arg(long)]
    project: Option<String>,

    /// Database ID (defaults to FIRESTORE_DATABASE_ID or "(default)")
    #[arg(long)]
    database: Option<String>,

    /// Bearer token; a service account is used when absent
    #[arg(long, env = "FIRESTORE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Sort order, e.g. "name" or "priority desc"
    #[arg(long)]
    order_by: Option<String>,

    /// Read the collection as of this RFC 3339 timestamp
    #[arg(long)]
    read_time: Option<String>,

    /// Include missing documents
    #[arg(long)]
    show_missing: bool,

    /// Documents per page
    #[arg(long)]
    page_size: Option<u32>,

    /// One JSON document per line instead of a single array
    #[arg(long)]
    jsonl: bool,
}

impl Cli {
    fn list_options(&self) -> ListOptions {
        ListOptions {
            order_by: self.order_by.clone(),
            read_time: self.read_time.clone(),
            show_missing: self.show_missing.then_some(true),
            page_size: self.page_size,
        }
    }

    fn config(&self) -> anyhow::Result<FirestoreConfig> {
        let mut config = match &self.project {
            Some(project) => FirestoreConfig::from_env_for(project.clone()),
            None => FirestoreConfig::from_env()?,
        };
        if let Some(database) = &self.database {
            config.database_id = database.clone();
        }
        Ok(config)
    }

    fn credentials(&self) -> anyhow::Result<Credentials> {
        match &self.token {
            Some(token) => Ok(Credentials::bearer(token.clone())),
            None => Ok(Credentials::from_env()?),
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("doclist=info".parse()?);

    // stdout carries the documents; logs go to stderr.
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

fn write_documents<W: Write>(
    out: &mut W,
    documents: &[TypedDocument<Map<String, Value>>],
    jsonl: bool,
) -> anyhow::Result<()> {
    if jsonl {
        for document in documents {
            serde_json::to_writer(&mut *out, document)?;
            writeln!(out)?;
        }
    } else {
        serde_json::to_writer_pretty(&mut *out, documents)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let config = cli.config()?;
    let client = FirestoreClient::new(config, cli.credentials()?)?;

    let segments: Vec<&str> = cli.segments.iter().map(String::as_str).collect();
    info!(
        project = %client.config().project_id,
        collection = %segments.join("/"),
        "Listing collection"
    );

    let documents: Vec<TypedDocument<Map<String, Value>>> = client
        .list_all(&segments, &cli.list_options())
        .await
        .with_context(|| format!("failed to list {}", segments.join("/")))?;

    info!(count = documents.len(), "Listed collection");

    let stdout = io::stdout();
    write_documents(&mut stdout.lock(), &documents, cli.jsonl)
}
