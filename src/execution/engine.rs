use crate::api::{CloseRequest, MarketDataSource, OrderGateway, OrderRequest, TradeSink};
use crate::config::Settings;
use crate::entry::EntryAdvisor;
use crate::execution::position_book::{Position, PositionBook};
use crate::execution::scaling::{ScalingAnalyzer, ScalingDecision};
use crate::indicators::IndicatorSnapshot;
use crate::models::{ExitReason, PositionSide, TradeAction, TradeRecord, TradingSignal};
use crate::regime::{RegimeAssessment, RegimeDetector, RegimeFilter};
use crate::risk::RiskManager;
use crate::signal::SignalScorer;
use crate::Result;
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

const REGIME_HOURLY_LIMIT: u32 = 48;
const REGIME_FOUR_HOUR_LIMIT: u32 = 60;
const REGIME_DAILY_LIMIT: u32 = 10;

/// One trading cycle for all configured symbols
///
/// Owns every collaborator explicitly; nothing here is global. The
/// generic parameters let tests drive the engine with in-memory
/// implementations of the three external interfaces.
pub struct TradingEngine<M, G, S>
where
    M: MarketDataSource,
    G: OrderGateway,
    S: TradeSink,
{
    settings: Settings,
    market: M,
    gateway: G,
    sink: S,
    scorer: SignalScorer,
    detector: RegimeDetector,
    filter: RegimeFilter,
    advisor: EntryAdvisor,
    scaling: ScalingAnalyzer,
    risk: RiskManager,
    book: PositionBook,
    /// Cached assessment plus cycles elapsed since it was computed
    regime_cache: HashMap<String, (RegimeAssessment, u32)>,
}

impl<M, G, S> TradingEngine<M, G, S>
where
    M: MarketDataSource,
    G: OrderGateway,
    S: TradeSink,
{
    pub fn new(settings: Settings, market: M, gateway: G, sink: S) -> Self {
        let scorer = SignalScorer::new(
            settings.scoring.clone(),
            settings.filters.clone(),
            settings.trading.initial_wait_secs,
            settings.trading.cooldown_secs,
        );
        let detector = RegimeDetector::new(settings.regime.clone());
        let filter = RegimeFilter::new(settings.filters.clone());
        let advisor = EntryAdvisor::new(settings.entry.clone());
        let scaling = ScalingAnalyzer::new(settings.risk.clone());
        let risk = RiskManager::new(
            settings.risk.clone(),
            settings.filters.clone(),
            settings.paper.initial_balance,
        );
        let book = PositionBook::new(
            settings.risk.max_position_multiplier,
            settings.risk.max_scale_out_fraction,
        );

        Self {
            settings,
            market,
            gateway,
            sink,
            scorer,
            detector,
            filter,
            advisor,
            scaling,
            risk,
            book,
            regime_cache: HashMap::new(),
        }
    }

    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    pub fn risk_mut(&mut self) -> &mut RiskManager {
        &mut self.risk
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    pub fn book_mut(&mut self) -> &mut PositionBook {
        &mut self.book
    }

    /// Latest cached regime assessment per symbol
    pub fn regime_assessments(&self) -> impl Iterator<Item = &RegimeAssessment> {
        self.regime_cache.values().map(|(assessment, _)| assessment)
    }

    /// Run one cycle over every configured symbol
    ///
    /// A failure on one symbol never stops the others.
    pub async fn run_cycle(&mut self) {
        let symbols = self.settings.trading.symbols.clone();
        for symbol in symbols {
            if let Err(e) = self.tick(&symbol).await {
                tracing::error!(%symbol, error = %e, "symbol cycle failed");
            }
        }
    }

    /// One full decision pass for a single symbol
    pub async fn tick(&mut self, symbol: &str) -> Result<()> {
        let candles = self
            .market
            .fetch_candles(
                symbol,
                &self.settings.trading.candle_interval,
                self.settings.trading.candle_limit,
            )
            .await;
        if candles.is_empty() {
            tracing::warn!(symbol, "no candles this cycle, skipping");
            return Ok(());
        }

        let price = self.market.current_price(symbol).await;
        if price <= 0.0 {
            tracing::warn!(symbol, "no live price this cycle, skipping");
            return Ok(());
        }

        let mut snapshot = IndicatorSnapshot::compute(&candles, &self.settings.indicators);
        snapshot.current_price = price;

        if self.book.is_open(symbol) {
            self.manage_position(symbol, &snapshot, &candles).await
        } else {
            self.try_enter(symbol, &snapshot, &candles).await
        }
    }

    async fn manage_position(
        &mut self,
        symbol: &str,
        snapshot: &IndicatorSnapshot,
        candles: &[crate::models::Candle],
    ) -> Result<()> {
        let position = match self.book.get(symbol) {
            Some(p) => p.clone(),
            None => return Ok(()),
        };
        let price = snapshot.current_price;

        // Hard risk exits first
        if let Some(reason) = self.risk.check_exit_conditions(&position, price) {
            return self.close_full(&position, price, reason).await;
        }

        // Technical exit only above the confidence floor
        let exit_signal = self.scorer.evaluate_exit(symbol, snapshot, position.side);
        if exit_signal.action.is_exit()
            && exit_signal.confidence >= self.settings.filters.exit_confidence
        {
            tracing::info!(symbol, reason = %exit_signal.reason, "technical exit");
            return self
                .close_full(&position, price, ExitReason::TechnicalExit)
                .await;
        }

        let assessment = self.assessment(symbol).await;
        match self.scaling.evaluate(&position, snapshot, &assessment, candles) {
            ScalingDecision::ScaleOut(plan) => {
                let size = position.size * plan.fraction;
                let request = CloseRequest {
                    symbol: symbol.to_string(),
                    side: position.side,
                    action: TradeAction::ScaleOut,
                    size_usdt: size,
                    entry_price: position.entry_price,
                    price,
                    exit_reason: ExitReason::ScaleOut,
                };

                let outcome = self.gateway.close_position(&request).await;
                if outcome.position_missing {
                    self.reconcile_missing(symbol);
                    return Ok(());
                }
                if !outcome.success {
                    tracing::warn!(symbol, error = ?outcome.error, "scale-out order failed");
                    return Ok(());
                }

                self.book.scale_out(symbol, plan.fraction)?;
                self.risk.update_statistics(outcome.pnl);
                self.record(
                    symbol,
                    position.side,
                    TradeAction::ScaleOut,
                    size,
                    outcome.executed_price,
                    outcome.fee,
                    Some(outcome.pnl),
                    plan.confidence,
                    Some(ExitReason::ScaleOut),
                )
                .await;
                tracing::info!(symbol, reason = %plan.reason, "scaled out");
            }
            ScalingDecision::ScaleIn(plan) => {
                let size = position.size * plan.fraction;
                let request = OrderRequest {
                    symbol: symbol.to_string(),
                    side: position.side,
                    action: TradeAction::ScaleIn,
                    size_usdt: size,
                    price,
                    leverage: self.settings.trading.leverage,
                    confidence: plan.confidence,
                    reason: plan.reason.clone(),
                };

                let outcome = self.gateway.open_position(&request).await;
                if !outcome.success {
                    tracing::warn!(symbol, error = ?outcome.error, "scale-in order failed");
                    return Ok(());
                }

                self.book.scale_in(symbol, size, outcome.executed_price)?;
                self.record(
                    symbol,
                    position.side,
                    TradeAction::ScaleIn,
                    size,
                    outcome.executed_price,
                    outcome.fee,
                    None,
                    plan.confidence,
                    None,
                )
                .await;
                tracing::info!(symbol, reason = %plan.reason, "scaled in");
            }
            ScalingDecision::Hold => {}
        }

        Ok(())
    }

    async fn try_enter(
        &mut self,
        symbol: &str,
        snapshot: &IndicatorSnapshot,
        candles: &[crate::models::Candle],
    ) -> Result<()> {
        let assessment = self.assessment(symbol).await;
        let adjustments = assessment.adjustments(&self.settings.scoring);

        let signal = self.scorer.evaluate_entry(symbol, snapshot, &adjustments);
        if !signal.action.is_entry() {
            return Ok(());
        }

        let signal = self.filter.apply(signal, &assessment, snapshot);
        let side = match signal.action.entry_side() {
            Some(side) => side,
            None => return Ok(()),
        };

        if let Err(rejection) = self.risk.can_open_position() {
            tracing::info!(symbol, %rejection, "entry blocked by risk gate");
            return Ok(());
        }
        if let Err(rejection) = self.risk.validate_signal(&signal, snapshot) {
            tracing::info!(symbol, %rejection, "entry rejected by market conditions");
            return Ok(());
        }

        let quality = match self.advisor.evaluate(candles, side) {
            Some(q) => q,
            None => return Ok(()),
        };
        if !quality.should_enter_now {
            tracing::info!(
                symbol,
                quality = quality.quality,
                risk_reward = quality.risk_reward,
                timing = ?quality.timing,
                "entry quality too low"
            );
            return Ok(());
        }

        let size = self.advisor.position_size(&quality, adjustments.size_factor);
        let request = OrderRequest {
            symbol: symbol.to_string(),
            side,
            action: TradeAction::Open,
            size_usdt: size,
            price: quality.entry_price,
            leverage: self.settings.trading.leverage,
            confidence: signal.confidence,
            reason: signal.reason.clone(),
        };

        let outcome = self.gateway.open_position(&request).await;
        if !outcome.success {
            tracing::warn!(symbol, error = ?outcome.error, "entry order failed");
            return Ok(());
        }

        self.book
            .open(symbol, side, size, outcome.executed_price)?;
        self.risk.register_entry();
        self.record(
            symbol,
            side,
            TradeAction::Open,
            size,
            outcome.executed_price,
            outcome.fee,
            None,
            signal.confidence,
            None,
        )
        .await;

        log_entry(&signal, size);
        Ok(())
    }

    async fn close_full(
        &mut self,
        position: &Position,
        price: f64,
        reason: ExitReason,
    ) -> Result<()> {
        let request = CloseRequest {
            symbol: position.symbol.clone(),
            side: position.side,
            action: TradeAction::Close,
            size_usdt: position.size,
            entry_price: position.entry_price,
            price,
            exit_reason: reason,
        };

        let outcome = self.gateway.close_position(&request).await;
        if outcome.position_missing {
            self.reconcile_missing(&position.symbol);
            return Ok(());
        }
        if !outcome.success {
            tracing::warn!(
                symbol = %position.symbol,
                error = ?outcome.error,
                "close order failed, keeping position"
            );
            return Ok(());
        }

        let closed = self.book.close(&position.symbol)?;
        self.risk.update_statistics(outcome.pnl);
        self.risk.release_symbol(&closed.symbol);
        self.record(
            &closed.symbol,
            closed.side,
            TradeAction::Close,
            closed.size,
            outcome.executed_price,
            outcome.fee,
            Some(outcome.pnl),
            1.0,
            Some(reason),
        )
        .await;

        tracing::info!(
            symbol = %closed.symbol,
            reason = reason.as_str(),
            pnl = outcome.pnl,
            "position closed"
        );
        Ok(())
    }

    /// The venue lost the position; drop ours without statistics
    fn reconcile_missing(&mut self, symbol: &str) {
        self.book.force_remove(symbol);
        self.risk.release_symbol(symbol);
    }

    /// Cached regime assessment, refreshed every `refresh_cycles` cycles
    async fn assessment(&mut self, symbol: &str) -> RegimeAssessment {
        let refresh_cycles = self.settings.regime.refresh_cycles;
        if let Some((cached, age)) = self.regime_cache.get_mut(symbol) {
            if *age < refresh_cycles {
                *age += 1;
                return cached.clone();
            }
        }

        let hourly = self
            .market
            .fetch_candles(symbol, "1h", REGIME_HOURLY_LIMIT)
            .await;
        let four_hour = self
            .market
            .fetch_candles(symbol, "4h", REGIME_FOUR_HOUR_LIMIT)
            .await;
        let daily = self
            .market
            .fetch_candles(symbol, "1d", REGIME_DAILY_LIMIT)
            .await;

        let assessment = self.detector.assess(symbol, &hourly, &four_hour, &daily);
        self.regime_cache
            .insert(symbol.to_string(), (assessment.clone(), 0));
        assessment
    }

    #[allow(clippy::too_many_arguments)]
    async fn record(
        &mut self,
        symbol: &str,
        side: PositionSide,
        action: TradeAction,
        size: f64,
        price: f64,
        fee: f64,
        pnl: Option<f64>,
        confidence: f64,
        exit_reason: Option<ExitReason>,
    ) {
        let record = TradeRecord {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            action,
            size,
            price,
            fee,
            pnl,
            confidence,
            exit_reason,
            timestamp: Utc::now(),
        };

        // Journal failures never affect trading state
        if let Err(e) = self.sink.record_trade(&record).await {
            tracing::warn!(symbol, error = %e, "failed to record trade");
        }
    }
}

fn log_entry(signal: &TradingSignal, size: f64) {
    tracing::info!(
        symbol = %signal.symbol,
        action = ?signal.action,
        confidence = signal.confidence,
        score = signal.score,
        size,
        reason = %signal.reason,
        "position opened"
    );
}
