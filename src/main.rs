//! Polymarket Smart Money Telegram Bot
//!
//! Surfaces recent trades from Nansen Smart Money addresses.

use clap::{Parser, Subcommand};
use smartmoney_bot::{
    client::{LabelCache, NansenClient, SubgraphClient},
    config::Config,
    session::SmartMoneyService,
    telegram::TelegramBot,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "smartmoney-bot")]
#[command(about = "Telegram bot surfacing Polymarket trades from Smart Money addresses")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Telegram bot
    Run,
    /// Print recent trades from the activity subgraph
    Trades {
        /// Number of trades to show
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
    /// Classify a single address via Nansen
    Classify {
        /// Blockchain address to look up
        address: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run => run_bot(config).await,
        Commands::Trades { limit } => show_trades(config, limit).await,
        Commands::Classify { address } => classify_address(config, &address).await,
    }
}

async fn run_bot(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting Smart Money bot");

    let bot_token = config.telegram.require_token()?.to_string();

    let subgraph = Arc::new(SubgraphClient::new(config.subgraph.url.as_deref())?);
    let cache = Arc::new(LabelCache::new());
    let nansen = Arc::new(NansenClient::new(
        config.nansen.require_api_key()?,
        &config.nansen.chain,
        cache,
    )?);

    let service = Arc::new(SmartMoneyService::new(
        subgraph,
        nansen,
        config.subgraph.window_minutes,
        config.subgraph.limit,
    ));

    let bot = Arc::new(TelegramBot::new(
        bot_token,
        service,
        config.subgraph.window_minutes,
    ));

    bot.start_polling().await;
    Ok(())
}

async fn show_trades(config: Config, limit: u32) -> anyhow::Result<()> {
    let client = SubgraphClient::new(config.subgraph.url.as_deref())?;
    let trades = client
        .fetch_recent_trades(config.subgraph.window_minutes, limit)
        .await?;

    println!(
        "\n📊 {} trades in the last {} minutes:\n",
        trades.len(),
        config.subgraph.window_minutes
    );

    for trade in trades {
        println!(
            "{:<44} {:<4} {:>10} @ {:<8} {}",
            trade.maker_address.as_deref().unwrap_or("-"),
            trade.outcome.as_deref().unwrap_or("-"),
            trade.size.as_deref().unwrap_or("-"),
            trade.price.as_deref().unwrap_or("-"),
            trade.market.question.as_deref().unwrap_or("?"),
        );
    }

    Ok(())
}

async fn classify_address(config: Config, address: &str) -> anyhow::Result<()> {
    let cache = Arc::new(LabelCache::new());
    let client = NansenClient::new(config.nansen.require_api_key()?, &config.nansen.chain, cache)?;

    let result = client.classify_address(address).await?;

    println!("\n🔍 {}\n", address);
    println!("Smart Money: {}", if result.is_smart { "yes" } else { "no" });
    if result.labels.is_empty() {
        println!("Labels: none");
    } else {
        println!("Labels: {}", result.labels.join(", "));
    }

    Ok(())
}
