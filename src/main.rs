use clap::Parser;
use perpbot::api::{BingxMarketData, NullTradeSink, PaperGateway, TradeSink};
use perpbot::config::Settings;
use perpbot::db::PostgresTradeSink;
use perpbot::execution::TradingEngine;
use perpbot::persistence::RedisPersistence;
use perpbot::Result;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Persisted regime history older than this is pruned at startup
const REGIME_KEEP_HOURS: u64 = 72;

#[derive(Parser, Debug)]
#[command(name = "perpbot", about = "Perpetual futures paper-trading bot")]
struct Cli {
    /// TOML config file; PERPBOT__SECTION__FIELD env vars override it
    #[arg(short, long)]
    config: Option<String>,

    /// Comma-separated symbols, overriding the config list
    #[arg(short, long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Clear a latched kill switch before trading starts
    #[arg(long)]
    reset_kill_switch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if !cli.symbols.is_empty() {
        settings.trading.symbols = cli.symbols.clone();
    }

    tracing::info!("🚀 perpbot starting");
    tracing::info!("  Symbols: {}", settings.trading.symbols.join(", "));
    tracing::info!("  Cycle interval: {}s", settings.trading.cycle_interval_secs);
    tracing::info!("  Paper balance: ${:.2}", settings.paper.initial_balance);

    let market = BingxMarketData::new(&settings.bingx)?;
    let gateway = PaperGateway::new(&settings.paper);

    let database_url = settings
        .database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok());
    let sink = connect_trade_sink(database_url.as_deref()).await;

    let redis_url = settings
        .redis_url
        .clone()
        .or_else(|| std::env::var("REDIS_URL").ok());
    let mut redis = connect_redis(redis_url.as_deref()).await;

    let cycle_secs = settings.trading.cycle_interval_secs;
    let symbols = settings.trading.symbols.clone();
    let mut engine = TradingEngine::new(settings, market, gateway, sink);

    if let Some(ref mut redis) = redis {
        match redis.load_risk_state().await {
            Ok(Some((stats, kill_switch))) => engine.risk_mut().restore(stats, kill_switch),
            Ok(None) => tracing::info!("No persisted risk state found, starting fresh"),
            Err(e) => tracing::warn!("Failed to load risk state from Redis: {}", e),
        }

        for symbol in &symbols {
            match redis.load_regimes(symbol, 24).await {
                Ok(history) => {
                    if let Some(last) = history.last() {
                        tracing::info!(
                            %symbol,
                            regime = ?last.regime,
                            confidence = last.confidence,
                            "last persisted regime"
                        );
                    }
                }
                Err(e) => tracing::warn!(%symbol, "Failed to load regime history: {}", e),
            }
            if let Err(e) = redis.cleanup_old_regimes(symbol, REGIME_KEEP_HOURS).await {
                tracing::warn!(%symbol, "Failed to prune regime history: {}", e);
            }
        }
    }

    if engine.risk().kill_switch().is_active() {
        if cli.reset_kill_switch {
            engine.risk_mut().reset_kill_switch();
        } else {
            tracing::error!(
                "Kill switch is latched ({}); no entries until --reset-kill-switch",
                engine.risk().kill_switch().reason().unwrap_or("unknown")
            );
        }
    }

    let mut ticker = interval(Duration::from_secs(cycle_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!("Press Ctrl+C to stop...");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("⚠️  Received Ctrl+C, shutting down...");
                break;
            }
            _ = ticker.tick() => {
                engine.run_cycle().await;
                persist_state(redis.as_mut(), &engine).await;
            }
        }
    }

    persist_state(redis.as_mut(), &engine).await;

    tracing::info!(
        "👋 perpbot stopped ({} open positions, total pnl ${:.2})",
        engine.book().len(),
        engine.risk().stats().total_pnl
    );
    Ok(())
}

fn setup_logging() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "perpbot=info".to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn connect_trade_sink(database_url: Option<&str>) -> Box<dyn TradeSink> {
    let url = match database_url {
        Some(url) => url,
        None => {
            tracing::info!("No DATABASE_URL configured, trades will not be journaled");
            return Box::new(NullTradeSink);
        }
    };

    match PostgresTradeSink::new(url).await {
        Ok(sink) => Box::new(sink),
        Err(e) => {
            tracing::warn!(
                "Failed to connect to Postgres ({}), continuing without trade journal",
                e
            );
            Box::new(NullTradeSink)
        }
    }
}

async fn connect_redis(redis_url: Option<&str>) -> Option<RedisPersistence> {
    let url = redis_url?;

    match RedisPersistence::new(url).await {
        Ok(redis) => Some(redis),
        Err(e) => {
            tracing::warn!(
                "Failed to connect to Redis ({}), risk state will not survive restarts",
                e
            );
            None
        }
    }
}

async fn persist_state<M, G, S>(
    redis: Option<&mut RedisPersistence>,
    engine: &TradingEngine<M, G, S>,
) where
    M: perpbot::api::MarketDataSource,
    G: perpbot::api::OrderGateway,
    S: TradeSink,
{
    if let Some(redis) = redis {
        let stats = engine.risk().stats().clone();
        let kill_switch = engine.risk().kill_switch().clone();
        if let Err(e) = redis.save_risk_state(&stats, &kill_switch).await {
            tracing::warn!("Failed to persist risk state: {}", e);
        }

        for assessment in engine.regime_assessments() {
            if let Err(e) = redis.save_regime(assessment).await {
                tracing::warn!(symbol = %assessment.symbol, "Failed to persist regime: {}", e);
            }
        }
    }
}
