pub mod signals;

pub use signals::{parse_arm, SignalConfig, SignalReader};
