use bitcoin::Network;
use secp256k1::SecretKey;
use via_config::ViaRuneEtcherConfig;

use super::{EtchingRequest, Etcher};
use crate::signer::KeyManager;

pub(crate) fn test_secret_key() -> SecretKey {
    SecretKey::from_slice(&[0x11; 32]).unwrap()
}

pub(crate) fn test_signer() -> KeyManager {
    KeyManager::from_secret_key(test_secret_key(), Network::Regtest)
}

/// Reference etching: `WET•GEDANG•ENAKKK`, premine 1 000 000, symbol `R`,
/// 100 mints of 1 000, content `I LOVE MY MOM`.
pub(crate) fn test_request() -> EtchingRequest {
    EtchingRequest::from_config(&ViaRuneEtcherConfig::for_tests()).unwrap()
}

pub(crate) fn test_etcher(request: EtchingRequest) -> Etcher {
    Etcher::new(Box::new(test_signer()), request).unwrap()
}
