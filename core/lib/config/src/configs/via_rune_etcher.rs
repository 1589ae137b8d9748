use std::{fmt, str::FromStr};

use bitcoin::{network::ParseNetworkError, Network};
use serde::{Deserialize, Serialize};

/// Parameters of a single rune etching run.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ViaRuneEtcherConfig {
    /// Name of the used Bitcoin network. Mainnet is refused by the etcher.
    pub network: String,
    /// Address receiving the premine, output 0 of the reveal transaction.
    pub receiver_address: String,
    /// Value of the receiver output in sats, 600 if unset.
    pub receiver_value: Option<u64>,

    /// Rune name, optionally spaced with `.` or `•`.
    pub rune_name: String,
    /// Single character currency symbol.
    pub symbol: Option<String>,
    pub divisibility: Option<u8>,
    pub premine: Option<u64>,

    /// Minting terms. Terms are declared if any of these is set.
    pub mint_amount: Option<u64>,
    pub mint_cap: Option<u64>,
    pub mint_height_start: Option<u64>,
    pub mint_height_end: Option<u64>,
    pub mint_offset_start: Option<u64>,
    pub mint_offset_end: Option<u64>,
    pub turbo: Option<bool>,

    /// MIME type of the revealed content, `text/plain;charset=utf-8` if unset.
    pub content_type: Option<String>,
    /// Content revealed in the inscription body.
    pub content: String,
}

impl ViaRuneEtcherConfig {
    /// Returns the Bitcoin network
    pub fn network(&self) -> Result<Network, ParseNetworkError> {
        Network::from_str(&self.network)
    }
}

impl ViaRuneEtcherConfig {
    /// Creates a config object suitable for use in unit tests.
    pub fn for_tests() -> Self {
        Self {
            network: Network::Regtest.to_string(),
            receiver_address: "bcrt1p5cyxnuxmeuwuvkwfem96lqzszd02n6xdcjrs20cac6yqjjwudpxqvg32hk"
                .into(),
            receiver_value: None,
            rune_name: "WET.GEDANG.ENAKKK".into(),
            symbol: Some("R".into()),
            divisibility: None,
            premine: Some(1_000_000),
            mint_amount: Some(1_000),
            mint_cap: Some(100),
            mint_height_start: None,
            mint_height_end: None,
            mint_offset_start: None,
            mint_offset_end: None,
            turbo: None,
            content_type: None,
            content: "I LOVE MY MOM".into(),
        }
    }
}

#[derive(Clone, Deserialize, PartialEq)]
pub struct ViaRuneEtcherSecrets {
    /// WIF encoded key of the etching operator.
    pub private_key: String,
}

impl fmt::Debug for ViaRuneEtcherSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViaRuneEtcherSecrets")
            .field("private_key", &"********")
            .finish()
    }
}

impl ViaRuneEtcherSecrets {
    /// Creates a secrets object suitable for use in unit tests.
    pub fn for_tests() -> Self {
        Self {
            private_key: "private_key".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network() {
        let mut config = ViaRuneEtcherConfig::for_tests();
        assert_eq!(config.network().unwrap(), Network::Regtest);

        config.network = "signet".into();
        assert_eq!(config.network().unwrap(), Network::Signet);

        config.network = "moonnet".into();
        assert!(config.network().is_err());
    }

    #[test]
    fn test_secrets_debug_is_masked() {
        let secrets = ViaRuneEtcherSecrets {
            private_key: "operator-wif-value".into(),
        };
        let debug = format!("{secrets:?}");

        assert!(debug.contains("********"));
        assert!(!debug.contains(&secrets.private_key));
    }
}
