// Risk management module
pub mod kill_switch;
pub mod manager;

pub use kill_switch::KillSwitch;
pub use manager::{RiskManager, RiskRejection, RiskStats};
