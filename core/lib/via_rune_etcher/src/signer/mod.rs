use std::fmt;

use bitcoin::{
    key::UntweakedPublicKey,
    secp256k1::{schnorr::Signature as SchnorrSignature, All, Message, Secp256k1},
    Network, NetworkKind, PrivateKey,
};
use secp256k1::{Keypair, SecretKey};
use tracing::{debug, instrument};

use crate::{
    traits::BitcoinSigner,
    types::{BitcoinSignerResult, EtcherError, Result},
};

/// Holds the operator keypair and the x-only public key derived from it.
pub struct KeyManager {
    secp: Secp256k1<All>,
    keypair: Keypair,
    internal_key: UntweakedPublicKey,
    network: Network,
}

impl KeyManager {
    /// Loads the key from WIF, rejecting keys encoded for a different network kind.
    #[instrument(skip(private_key_wif), target = "via_rune_etcher::signer")]
    pub fn new(private_key_wif: &str, network: Network) -> Result<Self> {
        let private_key = PrivateKey::from_wif(private_key_wif)?;

        let expected = NetworkKind::from(network);
        if private_key.network != expected {
            return Err(EtcherError::NetworkMismatch {
                expected: format!("{expected:?}"),
                actual: format!("{:?}", private_key.network),
            });
        }

        Ok(Self::from_secret_key(private_key.inner, network))
    }

    pub fn from_secret_key(secret_key: SecretKey, network: Network) -> Self {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &secret_key);
        let (internal_key, _parity) = keypair.x_only_public_key();

        debug!("Loaded key with internal key {}", internal_key);

        Self {
            secp,
            keypair,
            internal_key,
            network,
        }
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager")
            .field("keypair", &"********")
            .field("internal_key", &self.internal_key)
            .field("network", &self.network)
            .finish()
    }
}

impl BitcoinSigner for KeyManager {
    fn sign_schnorr(&self, message: Message) -> BitcoinSignerResult<SchnorrSignature> {
        let signature = self.secp.sign_schnorr_no_aux_rand(&message, &self.keypair);

        self.secp
            .verify_schnorr(&signature, &message, &self.internal_key)
            .map_err(|e| EtcherError::SigningError(e.to_string()))?;

        Ok(signature)
    }

    fn get_internal_key(&self) -> BitcoinSignerResult<UntweakedPublicKey> {
        Ok(self.internal_key)
    }

    fn get_network(&self) -> Network {
        self.network
    }

    fn get_secp_ref(&self) -> &Secp256k1<All> {
        &self.secp
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn test_secret_key() -> SecretKey {
        SecretKey::from_slice(&[1u8; 32]).unwrap()
    }

    #[test]
    fn test_key_manager_from_wif() {
        let private_key = PrivateKey::new(test_secret_key(), Network::Regtest);
        let wif = private_key.to_wif();

        let manager = KeyManager::new(&wif, Network::Regtest).unwrap();
        let expected = KeyManager::from_secret_key(test_secret_key(), Network::Regtest);

        assert_eq!(
            manager.get_internal_key().unwrap(),
            expected.get_internal_key().unwrap()
        );
        assert_eq!(manager.get_network(), Network::Regtest);
    }

    #[test]
    fn test_key_manager_rejects_mainnet_wif_on_test_network() {
        let wif = PrivateKey::new(test_secret_key(), Network::Bitcoin).to_wif();

        assert_matches!(
            KeyManager::new(&wif, Network::Regtest),
            Err(EtcherError::NetworkMismatch { .. })
        );
    }

    #[test]
    fn test_key_manager_rejects_garbage() {
        assert_matches!(
            KeyManager::new("not-a-wif", Network::Regtest),
            Err(EtcherError::InvalidPrivateKey(_))
        );
    }

    #[test]
    fn test_schnorr_signature_is_deterministic() {
        let manager = KeyManager::from_secret_key(test_secret_key(), Network::Regtest);
        let message = Message::from_digest([7u8; 32]);

        let first = manager.sign_schnorr(message).unwrap();
        let second = manager.sign_schnorr(message).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let manager = KeyManager::from_secret_key(test_secret_key(), Network::Regtest);
        let debug = format!("{manager:?}");

        assert!(debug.contains("********"));
        assert!(!debug.contains(&test_secret_key().display_secret().to_string()));
    }
}
