use crate::config::{FilterConfig, RiskConfig};
use crate::execution::position_book::Position;
use crate::indicators::IndicatorSnapshot;
use crate::models::{ExitReason, PositionSide, TradingSignal};
use crate::risk::kill_switch::KillSwitch;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RiskRejection {
    #[error("kill switch active: {0}")]
    KillSwitch(String),
    #[error("daily trade limit reached ({0})")]
    DailyTradeLimit(u32),
    #[error("daily loss limit reached ({0:.2} USDT)")]
    DailyLossLimit(f64),
    #[error("{0} consecutive losses")]
    ConsecutiveLosses(u32),
    #[error("volatility {0:.2}% above limit")]
    ExcessiveVolatility(f64),
    #[error("chasing an overextended move (RSI {0:.1})")]
    Overextended(f64),
}

/// Running pnl and trade statistics
///
/// Daily fields reset at UTC midnight; everything else accumulates for
/// the life of the bot. Serialized as-is into the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskStats {
    pub day: NaiveDate,
    pub daily_trades: u32,
    pub daily_pnl: f64,
    pub total_pnl: f64,
    pub wins: u32,
    pub losses: u32,
    pub consecutive_losses: u32,
    pub best_trade: f64,
    pub worst_trade: f64,
    /// Loss accumulated since the last equity high, in USDT
    pub current_drawdown: f64,
    pub max_drawdown: f64,
}

impl Default for RiskStats {
    fn default() -> Self {
        Self {
            day: Utc::now().date_naive(),
            daily_trades: 0,
            daily_pnl: 0.0,
            total_pnl: 0.0,
            wins: 0,
            losses: 0,
            consecutive_losses: 0,
            best_trade: 0.0,
            worst_trade: 0.0,
            current_drawdown: 0.0,
            max_drawdown: 0.0,
        }
    }
}

impl RiskStats {
    pub fn win_rate(&self) -> f64 {
        let total = self.wins + self.losses;
        if total == 0 {
            return 0.0;
        }
        self.wins as f64 / total as f64
    }
}

/// Gates every entry and drives every non-signal exit
pub struct RiskManager {
    config: RiskConfig,
    filters: FilterConfig,
    initial_balance: f64,
    stats: RiskStats,
    kill_switch: KillSwitch,
    /// Most favorable price seen per open position, for the trailing stop
    best_price: HashMap<String, f64>,
}

impl RiskManager {
    pub fn new(config: RiskConfig, filters: FilterConfig, initial_balance: f64) -> Self {
        Self {
            config,
            filters,
            initial_balance,
            stats: RiskStats::default(),
            kill_switch: KillSwitch::new(),
            best_price: HashMap::new(),
        }
    }

    pub fn stats(&self) -> &RiskStats {
        &self.stats
    }

    pub fn kill_switch(&self) -> &KillSwitch {
        &self.kill_switch
    }

    pub fn reset_kill_switch(&mut self) {
        self.kill_switch.reset();
    }

    /// Restore previously persisted state after a restart
    pub fn restore(&mut self, stats: RiskStats, kill_switch: KillSwitch) {
        self.stats = stats;
        self.kill_switch = kill_switch;
    }

    /// Account-level gate checked before any new position
    pub fn can_open_position(&mut self) -> Result<(), RiskRejection> {
        self.roll_daily();

        if self.kill_switch.is_active() {
            let reason = self.kill_switch.reason().unwrap_or("unknown").to_string();
            return Err(RiskRejection::KillSwitch(reason));
        }

        if self.stats.daily_trades >= self.config.max_daily_trades {
            return Err(RiskRejection::DailyTradeLimit(self.stats.daily_trades));
        }

        if self.stats.daily_pnl <= -self.config.max_daily_loss_usdt {
            return Err(RiskRejection::DailyLossLimit(self.stats.daily_pnl));
        }

        if self.stats.consecutive_losses >= self.config.consecutive_loss_limit {
            self.kill_switch.trip(format!(
                "{} consecutive losses",
                self.stats.consecutive_losses
            ));
            return Err(RiskRejection::ConsecutiveLosses(
                self.stats.consecutive_losses,
            ));
        }

        Ok(())
    }

    /// Market-condition sanity check on a filtered entry signal
    pub fn validate_signal(
        &self,
        signal: &TradingSignal,
        snapshot: &IndicatorSnapshot,
    ) -> Result<(), RiskRejection> {
        if !signal.action.is_entry() {
            return Ok(());
        }

        let volatility = snapshot.volatility_or_zero();
        if volatility > self.filters.max_volatility_pct {
            return Err(RiskRejection::ExcessiveVolatility(volatility));
        }

        let rsi = snapshot.rsi_or_neutral();
        match signal.action.entry_side() {
            Some(PositionSide::Long) if rsi > 80.0 => Err(RiskRejection::Overextended(rsi)),
            Some(PositionSide::Short) if rsi < 20.0 => Err(RiskRejection::Overextended(rsi)),
            _ => Ok(()),
        }
    }

    /// Count an opened position against today's trade budget
    pub fn register_entry(&mut self) {
        self.roll_daily();
        self.stats.daily_trades += 1;
    }

    /// Price and time based exits, checked in priority order
    ///
    /// The trailing stop only arms once the best price has been at least
    /// `trailing_stop_pct` in profit, so it never fires on a position
    /// that was never ahead.
    pub fn check_exit_conditions(
        &mut self,
        position: &Position,
        price: f64,
    ) -> Option<ExitReason> {
        let pnl = position.pnl_pct(price);

        if pnl <= -self.config.stop_loss_pct {
            return Some(ExitReason::StopLoss);
        }

        let best = self
            .best_price
            .entry(position.symbol.clone())
            .or_insert(position.entry_price);
        let better = match position.side {
            PositionSide::Long => price > *best,
            PositionSide::Short => price < *best,
        };
        if better {
            *best = price;
        }
        let best = *best;

        let best_pnl = position.pnl_pct(best);
        let retrace = match position.side {
            PositionSide::Long => (best - price) / best * 100.0,
            PositionSide::Short => (price - best) / best * 100.0,
        };
        if best_pnl >= self.config.trailing_stop_pct && retrace >= self.config.trailing_stop_pct {
            return Some(ExitReason::TrailingStop);
        }

        if pnl >= self.config.take_profit_pct {
            return Some(ExitReason::TakeProfit);
        }

        let age = position.age_minutes();
        if age >= self.config.max_hold_minutes {
            return Some(ExitReason::MaxHoldTime);
        }

        if pnl >= self.config.quick_profit_pct && age >= self.config.quick_profit_min_minutes {
            return Some(ExitReason::QuickProfit);
        }

        None
    }

    /// Forget trailing state once a position is fully closed
    pub fn release_symbol(&mut self, symbol: &str) {
        self.best_price.remove(symbol);
    }

    /// Record a realized pnl and trip the kill switch when limits break
    pub fn update_statistics(&mut self, pnl: f64) {
        self.roll_daily();

        self.stats.daily_pnl += pnl;
        self.stats.total_pnl += pnl;

        if pnl < 0.0 {
            self.stats.losses += 1;
            self.stats.consecutive_losses += 1;
            if pnl < self.stats.worst_trade {
                self.stats.worst_trade = pnl;
            }
            self.stats.current_drawdown += -pnl;
            if self.stats.current_drawdown > self.stats.max_drawdown {
                self.stats.max_drawdown = self.stats.current_drawdown;
            }
        } else {
            self.stats.wins += 1;
            self.stats.consecutive_losses = 0;
            if pnl > self.stats.best_trade {
                self.stats.best_trade = pnl;
            }
            self.stats.current_drawdown = (self.stats.current_drawdown - pnl).max(0.0);
        }

        let total_loss_limit = self.initial_balance * self.config.kill_switch_total_loss_pct / 100.0;
        if self.stats.total_pnl <= -total_loss_limit {
            self.kill_switch.trip(format!(
                "total loss {:.2} USDT over {:.0}% of initial balance",
                -self.stats.total_pnl, self.config.kill_switch_total_loss_pct
            ));
        }

        if self.stats.consecutive_losses >= self.config.consecutive_loss_limit {
            self.kill_switch.trip(format!(
                "{} consecutive losses",
                self.stats.consecutive_losses
            ));
        }

        let drawdown_pct = self.stats.current_drawdown / self.initial_balance * 100.0;
        if drawdown_pct >= self.config.max_drawdown_pct {
            self.kill_switch
                .trip(format!("drawdown {drawdown_pct:.1}% of initial balance"));
        }

        tracing::info!(
            pnl,
            daily_pnl = self.stats.daily_pnl,
            total_pnl = self.stats.total_pnl,
            consecutive_losses = self.stats.consecutive_losses,
            "trade recorded"
        );
    }

    /// Reset daily counters at UTC midnight; the kill switch stays latched
    fn roll_daily(&mut self) {
        let today = Utc::now().date_naive();
        if today != self.stats.day {
            tracing::info!(
                closed_day = %self.stats.day,
                daily_pnl = self.stats.daily_pnl,
                daily_trades = self.stats.daily_trades,
                "daily risk counters reset"
            );
            self.stats.day = today;
            self.stats.daily_trades = 0;
            self.stats.daily_pnl = 0.0;
        }
    }
}
