use crate::Result;
use serde::Deserialize;

/// Full bot configuration
///
/// Every field has a default, so the bot runs with no config file at all.
/// Values are layered: defaults, then an optional TOML file, then
/// `PERPBOT__SECTION__FIELD` environment variables.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub trading: TradingConfig,
    pub scoring: ScoringConfig,
    pub filters: FilterConfig,
    pub indicators: IndicatorConfig,
    pub regime: RegimeConfig,
    pub risk: RiskConfig,
    pub entry: EntryConfig,
    pub paper: PaperConfig,
    pub bingx: BingxConfig,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
}

impl Settings {
    /// Load settings from an optional TOML file plus environment overrides
    ///
    /// A missing file falls back to defaults; a malformed file is fatal.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let cfg = builder
            .add_source(config::Environment::with_prefix("PERPBOT").separator("__"))
            .build()?;

        Ok(cfg.try_deserialize()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Symbols traded each cycle, in order
    pub symbols: Vec<String>,
    /// Candle interval requested from the exchange
    pub candle_interval: String,
    /// Candles fetched per request
    pub candle_limit: u32,
    /// Seconds between trading cycles
    pub cycle_interval_secs: u64,
    /// Seconds after startup before the first entry is allowed
    pub initial_wait_secs: u64,
    /// Seconds between directional signals for the same scorer
    pub cooldown_secs: u64,
    pub leverage: u32,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTC-USDT".to_string()],
            candle_interval: "15m".to_string(),
            candle_limit: 100,
            cycle_interval_secs: 15,
            initial_wait_secs: 30,
            cooldown_secs: 180,
            leverage: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub min_score_long: f64,
    pub min_score_short: f64,
    /// Winning side must beat the other by this margin
    pub min_score_difference: f64,
    pub min_exit_score: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_score_long: 4.0,
            min_score_short: 4.0,
            min_score_difference: 1.0,
            min_exit_score: 3.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Floor for entry signal confidence after regime adjustment
    pub min_confidence: f64,
    /// Floor for acting on a technical exit signal
    pub exit_confidence: f64,
    /// Reject entries when volatility exceeds this percent
    pub max_volatility_pct: f64,
    /// Drop signals with multiple strongly opposed indicators
    pub contradiction_check: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.55,
            exit_confidence: 0.70,
            max_volatility_pct: 5.0,
            contradiction_check: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub min_candles: usize,
    pub rsi_period: usize,
    pub ema_short: usize,
    pub ema_long: usize,
    /// EMA separation (percent) needed for a "strong" trend label
    pub ema_trend_threshold_pct: f64,
    pub bollinger_period: usize,
    pub bollinger_std: f64,
    pub bollinger_oversold: f64,
    pub bollinger_overbought: f64,
    pub momentum_period: usize,
    pub momentum_threshold: f64,
    pub momentum_strong: f64,
    pub volatility_window: usize,
    pub volatility_high: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            min_candles: 30,
            rsi_period: 14,
            ema_short: 9,
            ema_long: 21,
            ema_trend_threshold_pct: 0.15,
            bollinger_period: 20,
            bollinger_std: 2.0,
            bollinger_oversold: 0.15,
            bollinger_overbought: 0.85,
            momentum_period: 8,
            momentum_threshold: 0.3,
            momentum_strong: 1.5,
            volatility_window: 15,
            volatility_high: 1.8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Trend threshold as a fraction (0.02 = 2% move over the lookback)
    pub trend_threshold: f64,
    /// Distance beyond support/resistance that counts as a breakout
    pub breakout_threshold: f64,
    /// Engine cycles between regime refreshes per symbol
    pub refresh_cycles: u32,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            trend_threshold: 0.02,
            breakout_threshold: 0.015,
            refresh_cycles: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    /// Retrace from the best price that arms the trailing exit
    pub trailing_stop_pct: f64,
    pub max_daily_trades: u32,
    pub max_daily_loss_usdt: f64,
    pub max_drawdown_pct: f64,
    /// Consecutive losses that trip the kill switch
    pub consecutive_loss_limit: u32,
    /// Total loss (percent of initial balance) that trips the kill switch
    pub kill_switch_total_loss_pct: f64,
    pub max_hold_minutes: i64,
    /// Take a small winner off the table once it has aged
    pub quick_profit_pct: f64,
    pub quick_profit_min_minutes: i64,
    /// Position may grow to at most this multiple of its original size
    pub max_position_multiplier: f64,
    /// Cumulative scale-outs capped at this fraction of the position
    pub max_scale_out_fraction: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stop_loss_pct: 2.0,
            take_profit_pct: 3.0,
            trailing_stop_pct: 0.5,
            max_daily_trades: 30,
            max_daily_loss_usdt: 30.0,
            max_drawdown_pct: 10.0,
            consecutive_loss_limit: 3,
            kill_switch_total_loss_pct: 10.0,
            max_hold_minutes: 240,
            quick_profit_pct: 1.2,
            quick_profit_min_minutes: 45,
            max_position_multiplier: 2.0,
            max_scale_out_fraction: 0.9,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Entry quality (0-100) required to enter immediately
    pub min_quality: f64,
    pub min_risk_reward: f64,
    /// Notional size before quality/risk-reward multipliers
    pub base_size_usdt: f64,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            min_quality: 60.0,
            min_risk_reward: 1.5,
            base_size_usdt: 50.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    pub initial_balance: f64,
    /// Taker fee in basis points applied per fill
    pub fee_bps: f64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_balance: 1000.0,
            fee_bps: 5.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BingxConfig {
    pub base_url: String,
    pub rate_limit_rpm: u32,
}

impl Default for BingxConfig {
    fn default() -> Self {
        Self {
            base_url: "https://open-api.bingx.com".to_string(),
            rate_limit_rpm: 100,
        }
    }
}
