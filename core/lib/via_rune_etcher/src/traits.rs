use bitcoin::{
    key::UntweakedPublicKey,
    secp256k1::{schnorr::Signature as SchnorrSignature, All, Message, Secp256k1},
    Network,
};

use crate::types::BitcoinSignerResult;

/// Key material the etcher signs with.
///
/// The x-only key returned by [`BitcoinSigner::get_internal_key`] is both the taproot
/// internal key and the key pushed in front of the envelope's `OP_CHECKSIG`.
pub trait BitcoinSigner: Send + Sync {
    fn sign_schnorr(&self, message: Message) -> BitcoinSignerResult<SchnorrSignature>;

    fn get_internal_key(&self) -> BitcoinSignerResult<UntweakedPublicKey>;

    fn get_network(&self) -> Network;

    fn get_secp_ref(&self) -> &Secp256k1<All>;
}
