use anyhow::{Context, Result};
use assetquery_core::mapping::read_text_latin1_fallback;
use assetquery_core::model::{IP_ADDRESS_FILTER, YEAR_FILTER};
use assetquery_core::{
    sanitize, Document, FilterSet, IntentKind, IntentMappingTable, Map, QueryError, Value,
};
use assetquery_router::dispatch;
use assetquery_storage::{read_snapshot, DocumentStore, InMemoryStore, SnapshotWriter};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "assetquery")]
#[command(about = "AssetQuery admin CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Convert a scan export CSV into a document snapshot.
    Import {
        #[arg(long)]
        csv: PathBuf,
        /// `.jsonl` or `.jsonl.zst`
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the intent label space in classifier index order.
    Labels {
        #[arg(long)]
        mapping: PathBuf,
    },
    /// Run one intent against a snapshot without a model.
    Dispatch {
        #[arg(long)]
        mapping: PathBuf,
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        intent: String,
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        year: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Import { csv, out } => {
            let docs = documents_from_csv(&csv)?;
            tracing::info!(rows = docs.len(), csv = %csv.display(), "scan export parsed");
            let mut writer = SnapshotWriter::create(out.clone())?;
            for doc in &docs {
                writer.write_document(doc)?;
            }
            let n = writer.finish()?;
            println!("wrote {n} documents to {}", out.display());
        }
        Cmd::Labels { mapping } => {
            let table = IntentMappingTable::from_path(&mapping)?;
            for (i, label) in table.label_space().labels().iter().enumerate() {
                println!("{i}\t{label}");
            }
        }
        Cmd::Dispatch {
            mapping,
            data,
            intent,
            ip,
            year,
        } => {
            let table = IntentMappingTable::from_path(&mapping)?;
            let store = InMemoryStore::from_documents(
                read_snapshot(&data).with_context(|| format!("load {}", data.display()))?,
            );
            let filters = filter_set(ip, year);
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let out = rt.block_on(run_dispatch(&table, &store, &intent, filters))?;
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

/// One document per row, keyed by header. Empty cells become null; everything else stays text.
fn documents_from_csv(path: &Path) -> Result<Vec<Document>> {
    let text = read_text_latin1_fallback(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = rdr.headers()?.clone();
    let mut docs = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("row {}", i + 2))?;
        let doc: Document = headers
            .iter()
            .zip(record.iter())
            .map(|(h, cell)| {
                let v = if cell.is_empty() {
                    Value::Null
                } else {
                    Value::from(cell)
                };
                (h.to_string(), v)
            })
            .collect();
        docs.push(doc);
    }
    Ok(docs)
}

/// Dispatches one intent and wraps the outcome the way `/predict` does, minus the ranking:
/// an intent with no mapping row yields null `results` and the in-band `error` message.
async fn run_dispatch(
    table: &IntentMappingTable,
    store: &dyn DocumentStore,
    intent: &str,
    filters: FilterSet,
) -> Result<Value> {
    let kind = IntentKind::resolve(intent, table);
    tracing::info!(intent, intent_kind = kind.name(), "dispatching offline");
    let (results, error) = match dispatch(&kind, &filters, store).await {
        Ok(v) => (sanitize(v), None),
        Err(e @ QueryError::MappingMiss { .. }) => (Value::Null, Some(e.to_string())),
        Err(e) => return Err(e.into()),
    };

    let mut out = Map::new();
    out.insert("intent".into(), Value::from(intent));
    out.insert(
        "filters".into(),
        Value::Map(
            filters
                .0
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect(),
        ),
    );
    out.insert("results".into(), results);
    if let Some(error) = error {
        out.insert("error".into(), Value::from(error));
    }
    Ok(Value::Map(out))
}

fn filter_set(ip: Option<String>, year: Option<String>) -> FilterSet {
    let mut filters = FilterSet::default();
    if let Some(ip) = ip {
        filters.0.insert(IP_ADDRESS_FILTER.to_string(), ip);
    }
    if let Some(year) = year {
        filters.0.insert(YEAR_FILTER.to_string(), year);
    }
    filters
}
