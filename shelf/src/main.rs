use std::sync::Arc;

use anyhow::{bail, Context, Result};
use dotenv::dotenv;
use shelf::api::SearchMode;
use shelf::backend::HttpSearchBackend;
use shelf::config::{ShelfConfig, StoreKind};
use shelf::connection::{CloseReason, ConnectionWaiter, TcpTransport};
use shelf::store::postgres::PgBookStore;
use shelf::store::{BookStore, MemoryStore};
use shelf::{SearchDispatcher, SearchError};
use shelf_db::Db;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage:\n  shelf search [--mode text|semantic] <query...>\n  shelf wait <host:port>";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_logging();
    let cfg = ShelfConfig::from_env();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("search") => run_search(&cfg, &args[1..]).await,
        Some("wait") => run_wait(&cfg, &args[1..]).await,
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shelf=info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run_search(cfg: &ShelfConfig, args: &[String]) -> Result<()> {
    let mut mode = SearchMode::Text;
    let mut terms = Vec::new();
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        if arg == "--mode" {
            let value = it.next().context("--mode needs a value")?;
            mode = value.parse().with_context(|| format!("bad --mode {value}"))?;
        } else {
            terms.push(arg.as_str());
        }
    }

    let backend = HttpSearchBackend::new(&cfg.backend_url, cfg.http_timeout())
        .with_context(|| format!("backend url {}", cfg.backend_url))?;
    let store: Arc<dyn BookStore> = match cfg.store {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Postgres => Arc::new(PgBookStore::new(Arc::new(Db::new(cfg.db.clone())))),
    };
    info!(endpoint = %backend.endpoint(), %mode, "dispatching search");
    let dispatcher = SearchDispatcher::new(Arc::new(backend), store, cfg.rate_window());
    dispatcher.configure(mode);

    match dispatcher.search_active(&terms.join(" ")).await {
        Ok(envelope) => {
            println!("{}", serde_json::to_string_pretty(&envelope)?);
            Ok(())
        }
        Err(SearchError::RateLimited { retry_after_secs }) => {
            eprintln!("{} search is rate limited; try again in {retry_after_secs}s", mode.display_name());
            std::process::exit(3);
        }
        Err(e) => Err(e).context("search failed"),
    }
}

async fn run_wait(cfg: &ShelfConfig, args: &[String]) -> Result<()> {
    let Some(addr) = args.first() else {
        bail!("{USAGE}");
    };

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let mut waiter = ConnectionWaiter::new(TcpTransport::open(addr.clone(), cfg.upgrade_protocol.clone()));
    let result = waiter.wait_for_connection(cfg.connect_timeout_secs, &cancel).await;
    let reason = match &result {
        Ok(outcome) => outcome.close_reason(),
        Err(_) => CloseReason::Error,
    };
    waiter.close_with_reason(reason).await;
    debug!(state = ?waiter.transport().state(), "transport released");

    let outcome = result.context("connection wait")?;
    println!("{addr}: {outcome:?}");
    outcome.into_result().with_context(|| format!("connecting to {addr}"))
}
