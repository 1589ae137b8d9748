use via_config::{ViaRuneEtcherConfig, ViaRuneEtcherSecrets};

use crate::{envy_load, FromEnv};

impl FromEnv for ViaRuneEtcherConfig {
    fn from_env() -> anyhow::Result<Self> {
        envy_load("via_rune_etcher", "VIA_RUNE_ETCHER_")
    }
}

impl FromEnv for ViaRuneEtcherSecrets {
    fn from_env() -> anyhow::Result<Self> {
        envy_load("via_rune_etcher_secrets", "VIA_RUNE_ETCHER_")
    }
}
