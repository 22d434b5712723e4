use crate::regime::RegimeAssessment;
use crate::risk::{KillSwitch, RiskStats};
use crate::Result;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::time::{timeout, Duration};

const RISK_STATS_KEY: &str = "risk:stats";
const KILL_SWITCH_KEY: &str = "risk:kill_switch";

/// Redis persistence for risk state and regime history
///
/// Risk stats and the kill switch survive process restarts so a crash
/// never forgets a halted account. Regime assessments go into sorted
/// sets keyed by symbol with timestamps as scores.
pub struct RedisPersistence {
    conn: ConnectionManager,
}

impl RedisPersistence {
    /// Connect to Redis
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;

        // Add 5 second timeout to connection attempt
        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| "Redis connection timeout after 5 seconds")??;

        tracing::info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }

    /// Persist the current risk statistics and kill-switch state
    pub async fn save_risk_state(
        &mut self,
        stats: &RiskStats,
        kill_switch: &KillSwitch,
    ) -> Result<()> {
        let stats_json = serde_json::to_string(stats)?;
        let switch_json = serde_json::to_string(kill_switch)?;

        self.conn
            .set::<_, _, ()>(RISK_STATS_KEY, stats_json)
            .await?;
        self.conn
            .set::<_, _, ()>(KILL_SWITCH_KEY, switch_json)
            .await?;

        tracing::debug!("Saved risk state to Redis");

        Ok(())
    }

    /// Load persisted risk state, if any exists
    pub async fn load_risk_state(&mut self) -> Result<Option<(RiskStats, KillSwitch)>> {
        let stats_json: Option<String> = self.conn.get(RISK_STATS_KEY).await?;
        let switch_json: Option<String> = self.conn.get(KILL_SWITCH_KEY).await?;

        match stats_json {
            Some(stats_json) => {
                let stats: RiskStats = serde_json::from_str(&stats_json)?;
                let kill_switch = match switch_json {
                    Some(json) => serde_json::from_str(&json)?,
                    None => KillSwitch::new(),
                };
                tracing::info!("Restored risk state from Redis");
                Ok(Some((stats, kill_switch)))
            }
            None => Ok(None),
        }
    }

    /// Append a regime assessment to the symbol's history
    ///
    /// Stores in sorted set: `regime:{symbol}` with timestamp as score
    pub async fn save_regime(&mut self, assessment: &RegimeAssessment) -> Result<()> {
        let key = format!("regime:{}", assessment.symbol);
        let value = serde_json::to_string(assessment)?;
        let score = assessment.timestamp.timestamp() as f64;

        self.conn.zadd::<_, _, _, ()>(&key, value, score).await?;

        tracing::debug!(symbol = %assessment.symbol, "saved regime assessment");

        Ok(())
    }

    /// Load recent regime assessments for a symbol, oldest first
    pub async fn load_regimes(
        &mut self,
        symbol: &str,
        hours_back: u64,
    ) -> Result<Vec<RegimeAssessment>> {
        let key = format!("regime:{}", symbol);

        let cutoff = Utc::now() - chrono::Duration::hours(hours_back as i64);
        let min_score = cutoff.timestamp() as f64;

        let results: Vec<String> = self.conn.zrangebyscore(&key, min_score, "+inf").await?;

        let mut assessments = Vec::with_capacity(results.len());
        for json_str in results {
            assessments.push(serde_json::from_str(&json_str)?);
        }

        tracing::debug!(
            symbol,
            count = assessments.len(),
            "loaded regime history from Redis"
        );

        Ok(assessments)
    }

    /// Remove regime history older than `keep_hours` to bound growth
    pub async fn cleanup_old_regimes(&mut self, symbol: &str, keep_hours: u64) -> Result<usize> {
        let key = format!("regime:{}", symbol);

        let cutoff = Utc::now() - chrono::Duration::hours(keep_hours as i64);
        let max_score = cutoff.timestamp() as f64;

        let removed: usize = self.conn.zrembyscore(&key, "-inf", max_score).await?;

        if removed > 0 {
            tracing::debug!(symbol, removed, "cleaned up old regime history");
        }

        Ok(removed)
    }
}
