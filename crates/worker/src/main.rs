use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tickerlens_core::analytics::clustering::DEFAULT_CLUSTERS;
use tickerlens_core::analytics::similarity::DEFAULT_NEIGHBORS;
use tickerlens_core::domain::catalog;
use tickerlens_core::domain::market::is_valid_symbol;
use tickerlens_core::pipeline::Pipeline;

/// Symbols taken from a category when no explicit list is given.
const CATEGORY_SIZE: usize = 5;

#[derive(Debug, Parser)]
#[command(name = "tickerlens_worker", about = "Run market analytics from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Last close, metrics, info, headlines, sentiment and forecast for one symbol.
    Quote { symbol: String },
    /// Cluster a set of symbols into behavioral groups.
    Analyze {
        #[command(flatten)]
        universe: Universe,
        #[arg(long, default_value_t = DEFAULT_CLUSTERS)]
        k: usize,
    },
    /// Buy/hold/sell call for one symbol.
    Recommend { symbol: String },
    /// Nearest comparable symbols to SYMBOL within a pool.
    Similar {
        symbol: String,
        #[command(flatten)]
        pool: Pool,
        #[arg(long, default_value_t = DEFAULT_NEIGHBORS)]
        k: usize,
    },
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct Universe {
    /// Comma-separated symbols, e.g. AAPL,MSFT,XOM
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,
    /// Catalog category name, e.g. "Technology"
    #[arg(long)]
    category: Option<String>,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct Pool {
    #[arg(long, value_delimiter = ',')]
    pool: Vec<String>,
    #[arg(long)]
    category: Option<String>,
}

fn check_symbol(raw: &str) -> anyhow::Result<String> {
    let symbol = raw.trim();
    anyhow::ensure!(is_valid_symbol(symbol), "invalid symbol {raw:?}");
    Ok(symbol.to_uppercase())
}

fn resolve_symbols(symbols: &[String], category: Option<&str>) -> anyhow::Result<Vec<String>> {
    if let Some(category) = category {
        let resolved = catalog::symbols_for(category, CATEGORY_SIZE);
        anyhow::ensure!(
            !resolved.is_empty(),
            "unknown category {category:?} (known: {})",
            catalog::categories().collect::<Vec<_>>().join(", ")
        );
        return Ok(resolved);
    }
    let cleaned = symbols
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| check_symbol(s))
        .collect::<anyhow::Result<Vec<_>>>()?;
    anyhow::ensure!(!cleaned.is_empty(), "no symbols given");
    Ok(cleaned)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{out}");
    Ok(())
}

async fn run(pipeline: &Pipeline, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Quote { symbol } => print_json(&pipeline.quote(&check_symbol(&symbol)?).await),
        Command::Analyze { universe, k } => {
            anyhow::ensure!(k > 0, "--k must be at least 1");
            let symbols = resolve_symbols(&universe.symbols, universe.category.as_deref())?;
            tracing::info!(symbols = symbols.len(), k, "analyzing market");
            print_json(&pipeline.analyze_market(&symbols, k).await)
        }
        Command::Recommend { symbol } => {
            print_json(&pipeline.recommend(&check_symbol(&symbol)?).await)
        }
        Command::Similar { symbol, pool, k } => {
            let symbol = check_symbol(&symbol)?;
            let pool = resolve_symbols(&pool.pool, pool.category.as_deref())?;
            tracing::info!(%symbol, pool = pool.len(), k, "searching similar symbols");
            print_json(&pipeline.similar(&symbol, &pool, k).await)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = tickerlens_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let cli = Cli::parse();
    let pipeline = Pipeline::from_settings(&settings)?;

    if let Err(err) = run(&pipeline, cli.command).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "command failed");
        return Err(err);
    }
    Ok(())
}

fn init_sentry(settings: &tickerlens_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_analyze_with_symbol_list() {
        let cli = Cli::try_parse_from(["tickerlens_worker", "analyze", "--symbols", "aapl,MSFT", "--k", "2"])
            .unwrap();
        match cli.command {
            Command::Analyze { universe, k } => {
                assert_eq!(universe.symbols, vec!["aapl", "MSFT"]);
                assert_eq!(k, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn symbols_and_category_are_exclusive() {
        let res = Cli::try_parse_from([
            "tickerlens_worker",
            "similar",
            "AAPL",
            "--pool",
            "MSFT",
            "--category",
            "Technology",
        ]);
        assert!(res.is_err());
        assert!(Cli::try_parse_from(["tickerlens_worker", "analyze"]).is_err());
    }

    #[test]
    fn resolves_category_or_explicit_list() {
        assert_eq!(resolve_symbols(&[], Some("energy")).unwrap().len(), 5);
        assert!(resolve_symbols(&[], Some("Crypto")).is_err());
        assert_eq!(
            resolve_symbols(&[" xom ".to_string(), "".to_string()], None).unwrap(),
            vec!["XOM"]
        );
        assert!(resolve_symbols(&[], None).is_err());
    }

    #[test]
    fn malformed_symbols_are_refused() {
        assert!(check_symbol("AAPL?range=max").is_err());
        assert!(check_symbol("A/B").is_err());
        assert_eq!(check_symbol(" brk-b ").unwrap(), "BRK-B");
        assert!(resolve_symbols(&["MSFT".to_string(), "A/B".to_string()], None).is_err());
    }
}
