pub use self::via_rune_etcher::{ViaRuneEtcherConfig, ViaRuneEtcherSecrets};

pub mod via_rune_etcher;
