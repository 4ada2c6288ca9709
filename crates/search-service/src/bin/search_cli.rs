//! Interactive catalog/market search over JSON files.
//!
//! Usage: search-cli <catalog.json> [market.json]
//!
//! Reads commands from stdin:
//!   catalog <query>   search the catalog
//!   market <query>    search market items
//!   status            print index status
//!   quit              exit

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use search_service::{
    CatalogInitOutcome, FileStore, JsonFileCatalogSource, JsonFileMarketSource, MarketSource,
    SearchConfig, SearchHooks, SearchService, ServiceError, ServiceResult, StaticMarketSource,
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    env_logger::init();

    if let Err(error) = run().await {
        eprintln!("search-cli: {error}");
        std::process::exit(1);
    }
}

async fn run() -> ServiceResult<()> {
    let mut args = std::env::args().skip(1);
    let Some(catalog_path) = args.next().map(PathBuf::from) else {
        eprintln!("usage: search-cli <catalog.json> [market.json]");
        std::process::exit(2);
    };
    let market_path = args.next().map(PathBuf::from);

    let config = match std::env::var_os("SEARCH_CONFIG") {
        Some(path) => SearchConfig::load(&PathBuf::from(path))?,
        None => SearchConfig::default(),
    };
    let cache_dir = config.resolved_cache_dir();
    log::info!("using search cache at {}", cache_dir.display());

    let market_source: Arc<dyn MarketSource> = match &market_path {
        Some(path) => Arc::new(JsonFileMarketSource::new(path)),
        None => Arc::new(StaticMarketSource::default()),
    };
    let hooks = SearchHooks::new(
        SearchService::spawn(config),
        Arc::new(FileStore::new(cache_dir)),
        Arc::new(JsonFileCatalogSource::new(catalog_path)),
        market_source,
    );

    let _subscription = hooks.on_status_change(|status| {
        log::debug!(
            "index status: catalog ready={} ({}) market ready={} ({})",
            status.catalog_ready,
            status.catalog_count,
            status.market_ready,
            status.market_count
        );
    });

    match hooks.init_catalog_search_index().await {
        CatalogInitOutcome::Restored { count } => println!("catalog restored ({count} items)"),
        CatalogInitOutcome::Rebuilt { count, saved } => {
            println!("catalog indexed ({count} items, cached: {saved})")
        }
        CatalogInitOutcome::Empty => println!("catalog is empty"),
        CatalogInitOutcome::Failed(reason) => println!("catalog unavailable: {reason}"),
    }
    if market_path.is_some() {
        hooks.init_market_search_index().await?;
        let status = hooks
            .service()
            .wait_for_market_ready(hooks.service().config().ready_timeout())
            .await?;
        println!("market indexed ({} items)", status.market_count);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|error| ServiceError::Internal(format!("failed to read stdin: {error}")))?
    {
        let line = line.trim();
        let (command, query) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "catalog" => {
                for item in hooks.search_catalog(query).await.unwrap_or_default() {
                    match item.price {
                        Some(price) => println!("{:>12}  {}  ({price})", item.id, item.name),
                        None => println!("{:>12}  {}", item.id, item.name),
                    }
                }
            }
            "market" => {
                for item in hooks.search_limiteds(query).await.unwrap_or_default() {
                    println!(
                        "{:>12}  {} [{}]  value={} demand={} trend={}",
                        item.id,
                        item.name,
                        item.acronym,
                        item.value
                            .map(|value| value.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        item.demand_label,
                        item.trend_label
                    );
                }
            }
            "status" => {
                let mut status_rx = hooks.service().subscribe_status();
                hooks.service().refresh_status().await?;
                let _ = tokio::time::timeout(Duration::from_secs(1), status_rx.changed()).await;
                println!("{:?}", *status_rx.borrow());
            }
            "quit" | "exit" => break,
            "" => {}
            other => eprintln!("unknown command {other:?}; try catalog, market, status or quit"),
        }
    }

    hooks.service().terminate().await
}
