use bitcoin::{
    hashes::Hash,
    psbt::Psbt,
    secp256k1::Message,
    sighash::{Prevouts, SighashCache},
    taproot::{self, TapLeafHash},
    TapSighashType, Transaction, TxOut, Witness,
};
use tracing::{debug, instrument};

use crate::{
    traits::BitcoinSigner,
    types::{EtcherError, Result},
};

/// Signs every script path of every input with `signer`.
///
/// The signature is stored in the PSBT as a partial signature, the witness itself is
/// only assembled by [`finalize_all_inputs`].
#[instrument(skip(psbt, signer), target = "via_rune_etcher::finalizer")]
pub fn sign_all_inputs(psbt: &mut Psbt, signer: &dyn BitcoinSigner) -> Result<()> {
    let prevouts = collect_prevouts(psbt)?;
    let internal_key = signer.get_internal_key()?;
    let mut sighash_cache = SighashCache::new(&psbt.unsigned_tx);

    for (index, input) in psbt.inputs.iter_mut().enumerate() {
        if input.tap_internal_key != Some(internal_key) {
            return Err(EtcherError::SigningError(format!(
                "Input {index} is not keyed to the signer"
            )));
        }

        for (script, leaf_version) in input.tap_scripts.values() {
            let leaf_hash = TapLeafHash::from_script(script, *leaf_version);
            let sighash = sighash_cache
                .taproot_script_spend_signature_hash(
                    index,
                    &Prevouts::All(&prevouts),
                    leaf_hash,
                    TapSighashType::Default,
                )
                .map_err(|e| EtcherError::SigningError(e.to_string()))?;

            let message = Message::from_digest(sighash.to_byte_array());
            let signature = signer.sign_schnorr(message)?;

            input.tap_script_sigs.insert(
                (internal_key, leaf_hash),
                taproot::Signature {
                    signature,
                    sighash_type: TapSighashType::Default,
                },
            );
        }

        debug!("Signed input {}", index);
    }

    Ok(())
}

/// Turns each signed input into its final `[signature, script, control block]` witness.
#[instrument(skip(psbt, signer), target = "via_rune_etcher::finalizer")]
pub fn finalize_all_inputs(psbt: &mut Psbt, signer: &dyn BitcoinSigner) -> Result<()> {
    let secp = signer.get_secp_ref();

    for (index, input) in psbt.inputs.iter_mut().enumerate() {
        let internal_key = input.tap_internal_key.ok_or_else(|| {
            EtcherError::FinalizationError(format!("Input {index} has no internal key"))
        })?;
        let output_key = input
            .witness_utxo
            .as_ref()
            .filter(|utxo| utxo.script_pubkey.is_p2tr())
            .and_then(|utxo| utxo.script_pubkey.as_bytes().get(2..34))
            .and_then(|key| bitcoin::XOnlyPublicKey::from_slice(key).ok())
            .ok_or_else(|| {
                EtcherError::FinalizationError(format!("Input {index} does not spend a P2TR output"))
            })?;

        let (control_block, (script, leaf_version)) =
            input.tap_scripts.iter().next().ok_or_else(|| {
                EtcherError::FinalizationError(format!("Input {index} has no tap script"))
            })?;

        if control_block.leaf_version != *leaf_version
            || control_block.internal_key != internal_key
            || !control_block.verify_taproot_commitment(secp, output_key, script)
        {
            return Err(EtcherError::FinalizationError(format!(
                "Control block of input {index} does not commit to its script"
            )));
        }

        let leaf_hash = TapLeafHash::from_script(script, *leaf_version);
        let signature = input
            .tap_script_sigs
            .get(&(internal_key, leaf_hash))
            .ok_or_else(|| {
                EtcherError::FinalizationError(format!("Input {index} is not signed"))
            })?;

        let mut witness = Witness::new();
        witness.push(signature.serialize());
        witness.push(script.as_bytes());
        witness.push(control_block.serialize());

        input.final_script_witness = Some(witness);
        input.tap_script_sigs.clear();
        input.tap_scripts.clear();
        input.tap_key_origins.clear();
        input.tap_internal_key = None;
        input.tap_merkle_root = None;

        debug!("Finalized input {}", index);
    }

    Ok(())
}

/// Extracts the network transaction, enforcing the PSBT absurd fee rate guard.
pub fn extract(psbt: Psbt) -> Result<Transaction> {
    psbt.extract_tx()
        .map_err(|e| EtcherError::FinalizationError(e.to_string()))
}

/// Extracts a draft whose placeholder input would trip the fee rate guard.
pub fn extract_unchecked(psbt: Psbt) -> Transaction {
    psbt.extract_tx_unchecked_fee_rate()
}

fn collect_prevouts(psbt: &Psbt) -> Result<Vec<TxOut>> {
    psbt.inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            input.witness_utxo.clone().ok_or_else(|| {
                EtcherError::SigningError(format!("Input {index} has no witness utxo"))
            })
        })
        .collect()
}
