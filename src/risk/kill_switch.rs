use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latched trading halt
///
/// Once tripped it stays active across daily rollovers and restarts of
/// the trading loop; only an explicit operator reset clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KillSwitch {
    active: bool,
    reason: Option<String>,
    tripped_at: Option<DateTime<Utc>>,
}

impl KillSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn tripped_at(&self) -> Option<DateTime<Utc>> {
        self.tripped_at
    }

    /// Trip the switch; a second trip keeps the first reason
    pub fn trip(&mut self, reason: impl Into<String>) {
        if self.active {
            return;
        }
        let reason = reason.into();
        tracing::error!(%reason, "kill switch tripped, trading halted");
        self.active = true;
        self.reason = Some(reason);
        self.tripped_at = Some(Utc::now());
    }

    pub fn reset(&mut self) {
        if self.active {
            tracing::warn!(reason = ?self.reason, "kill switch manually reset");
        }
        self.active = false;
        self.reason = None;
        self.tripped_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trip_latches() {
        let mut ks = KillSwitch::new();
        assert!(!ks.is_active());

        ks.trip("drawdown limit");
        assert!(ks.is_active());
        assert_eq!(ks.reason(), Some("drawdown limit"));
        assert!(ks.tripped_at().is_some());
    }

    #[test]
    fn test_second_trip_keeps_first_reason() {
        let mut ks = KillSwitch::new();
        ks.trip("first");
        ks.trip("second");
        assert_eq!(ks.reason(), Some("first"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut ks = KillSwitch::new();
        ks.trip("drawdown limit");
        ks.reset();

        assert!(!ks.is_active());
        assert!(ks.reason().is_none());
        assert!(ks.tripped_at().is_none());
    }
}
