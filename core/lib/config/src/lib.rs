pub use crate::configs::{ViaRuneEtcherConfig, ViaRuneEtcherSecrets};

pub mod configs;
