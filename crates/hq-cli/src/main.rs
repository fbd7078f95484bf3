//! # hq: command-line client for the history hub
//!
//! - `hq query --fields url,method --where "method = 'POST'"`: Query recorded history.
//! - `hq raw "<query>"`: Send a full query string as-is.
//! - `hq ingest <file.json>`: Upload recorded transactions.
//! - `hq status`: Report hub status as JSON.

use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tabled::builder::Builder;
use tabled::settings::Style;

use hq_core::FieldRegistry;

/// Words that would let a fragment rewrite the assembled query.
const RESERVED: [&str; 4] = ["SELECT", "FROM", "WHERE", "LIMIT"];

/// Longest cell printed in table output, in characters.
const MAX_CELL_CHARS: usize = 120;

/// hq: query recorded HTTP proxy history.
#[derive(Parser)]
#[command(name = "hq", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the history with conditions (assembles the SQL for you).
    Query {
        /// Comma-separated fields to select, e.g. `url,method,status_code`.
        #[arg(long, value_delimiter = ',', required = true)]
        fields: Vec<String>,

        /// Conditions joined with `and`, e.g. "method = 'POST' and req.body like 'password'".
        #[arg(long = "where")]
        conditions: String,

        /// Maximum number of rows.
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Print rows as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Run a full query string, e.g. "SELECT url FROM proxy WHERE method = 'GET'".
    Raw {
        query: String,

        #[arg(long)]
        json: bool,
    },

    /// Upload recorded transactions from a JSON file.
    Ingest { file: PathBuf },

    /// Report hub status as JSON.
    Status,
}

/// Response wrapper used by the hub's query and history routes.
#[derive(Debug, Deserialize)]
struct Envelope {
    code: u16,
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

fn main() {
    let cli = Cli::parse();

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to build tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(async_main(cli.command)) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn async_main(cmd: Commands) -> Result<(), String> {
    let client = reqwest::Client::new();
    let base_url =
        std::env::var("HQ_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8889".to_string());

    match cmd {
        Commands::Query {
            fields,
            conditions,
            limit,
            json,
        } => {
            let fields: Vec<String> = fields.iter().map(|f| f.trim().to_string()).collect();
            check_input(&fields, &conditions, &FieldRegistry::with_builtins())?;

            let query = build_query(&fields, &conditions, limit);
            let form = [("query", STANDARD.encode(query.as_bytes()))];
            let resp = client
                .post(format!("{}/query", base_url))
                .form(&form)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            print_rows(read_envelope(resp).await?, &fields, json)
        }

        Commands::Raw { query, json } => {
            let payload = serde_json::json!({ "query": query });
            let resp = post_request(&client, &format!("{}/api/query", base_url), &payload).await?;
            print_rows(read_envelope(resp).await?, &[], json)
        }

        Commands::Ingest { file } => {
            let content = std::fs::read_to_string(&file)
                .map_err(|e| format!("cannot read {}: {}", file.display(), e))?;
            let payload: serde_json::Value = serde_json::from_str(&content)
                .map_err(|e| format!("{} is not valid JSON: {}", file.display(), e))?;
            if !payload.is_array() {
                return Err(format!("{} must contain a JSON array", file.display()));
            }

            let resp =
                post_request(&client, &format!("{}/api/history", base_url), &payload).await?;
            let envelope = read_envelope(resp).await?;
            let data = envelope.data.unwrap_or_default();
            println!(
                "Recorded {} transactions ({} stored)",
                data["recorded"], data["stored"]
            );
            Ok(())
        }

        Commands::Status => {
            let resp = client
                .get(format!("{}/api/status", base_url))
                .send()
                .await
                .map_err(|e| e.to_string())?;
            let json = resp
                .json::<serde_json::Value>()
                .await
                .map_err(|e| e.to_string())?;
            println!("{}", pretty(&json));
            Ok(())
        }
    }
}

/// Validate the pieces of a `query` command before they are assembled.
///
/// Fields must be names the engine knows and no fragment may carry a clause
/// keyword.
fn check_input(fields: &[String], conditions: &str, registry: &FieldRegistry) -> Result<(), String> {
    for reserved in RESERVED {
        if let Some(field) = fields.iter().find(|f| f.to_uppercase().contains(reserved)) {
            return Err(format!("Invalid field: {}", field));
        }
        if conditions.to_uppercase().contains(reserved) {
            return Err(format!("Invalid condition: {}", conditions));
        }
    }

    if let Some(field) = fields.iter().find(|f| !registry.contains(f.as_str())) {
        return Err(format!(
            "Invalid field: {} (known fields: {})",
            field,
            registry.names().join(", ")
        ));
    }
    Ok(())
}

fn build_query(fields: &[String], conditions: &str, limit: usize) -> String {
    format!(
        "SELECT {} FROM proxy WHERE {} LIMIT {}",
        fields.join(","),
        conditions.trim(),
        limit
    )
}

async fn post_request(
    client: &reqwest::Client,
    url: &str,
    json: &serde_json::Value,
) -> Result<reqwest::Response, String> {
    client
        .post(url)
        .json(json)
        .send()
        .await
        .map_err(|e| e.to_string())
}

/// Decode the hub envelope, turning a non-2xx reply into its message.
async fn read_envelope(resp: reqwest::Response) -> Result<Envelope, String> {
    let status = resp.status();
    let text = resp.text().await.map_err(|e| e.to_string())?;
    match serde_json::from_str::<Envelope>(&text) {
        Ok(envelope) if status.is_success() => Ok(envelope),
        Ok(envelope) => Err(format!("{} ({})", envelope.message, envelope.code)),
        Err(_) if status.is_success() => Err(format!("unexpected response: {}", text.trim())),
        Err(_) => Err(format!("{}: {}", status, text.trim())),
    }
}

fn print_rows(envelope: Envelope, fields: &[String], json: bool) -> Result<(), String> {
    let rows = envelope.data.unwrap_or_default();
    if json {
        println!("{}", pretty(&rows));
        return Ok(());
    }

    let rows = rows.as_array().cloned().unwrap_or_default();
    if rows.is_empty() {
        println!("No matching transactions.");
        return Ok(());
    }
    println!("{}", render_table(&rows, fields));
    Ok(())
}

/// Render rows as a table. Columns follow `fields` when given, otherwise the
/// keys of the rows in first-seen order.
fn render_table(rows: &[serde_json::Value], fields: &[String]) -> String {
    let columns: Vec<String> = if fields.is_empty() {
        let mut columns: Vec<String> = Vec::new();
        for key in rows.iter().filter_map(|r| r.as_object()).flat_map(|o| o.keys()) {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
        columns
    } else {
        fields.iter().map(|f| f.to_lowercase()).collect()
    };

    let mut builder = Builder::default();
    builder.push_record(columns.iter().cloned());
    for row in rows {
        builder.push_record(columns.iter().map(|c| cell(&row[c.as_str()])));
    }

    let mut table = builder.build();
    table.with(Style::modern());
    table.to_string()
}

fn cell(value: &serde_json::Value) -> String {
    let text = match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.replace("\r\n", " ").replace('\n', " "),
        other => other.to_string(),
    };
    if text.chars().count() > MAX_CELL_CHARS {
        let mut cut: String = text.chars().take(MAX_CELL_CHARS).collect();
        cut.push('…');
        cut
    } else {
        text
    }
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
