use bitcoin::{
    constants::MAX_SCRIPT_ELEMENT_SIZE,
    key::UntweakedPublicKey,
    opcodes::{all, OP_0, OP_FALSE},
    script::{Builder as ScriptBuilder, PushBytesBuf},
    secp256k1::{Secp256k1, Verification},
    taproot::{ControlBlock, LeafVersion, TaprootBuilder, TaprootSpendInfo},
    Address, Network, ScriptBuf,
};
use tracing::{debug, instrument};

use crate::{
    inscriber::types::InscriptionContent,
    types::{
        EtcherError, Result, CONTENT_TYPE_TAG, ORD_PROTOCOL_ID, POINTER_TAG, RUNE_COMMITMENT_TAG,
    },
};

/// Reveal script plus the taproot data committing to it.
#[derive(Debug, Clone)]
pub struct InscriptionData {
    pub inscription_script: ScriptBuf,
    pub script_size: usize,
    pub leaf_version: LeafVersion,
    pub address: Address,
    pub script_pubkey: ScriptBuf,
    pub taproot_spend_info: TaprootSpendInfo,
}

impl InscriptionData {
    #[instrument(
        skip(content, commitment, secp, internal_key),
        target = "via_rune_etcher::script_builder"
    )]
    pub fn new<C: Verification>(
        content: &InscriptionContent,
        commitment: &[u8],
        secp: &Secp256k1<C>,
        internal_key: UntweakedPublicKey,
        network: Network,
    ) -> Result<Self> {
        debug!("Creating new InscriptionData");

        let basic_script = Self::build_basic_inscription_script(internal_key);
        let (inscription_script, script_size) =
            Self::complete_inscription(basic_script, content, commitment)?;

        let leaf_version = LeafVersion::TapScript;
        let (address, taproot_spend_info) = Self::construct_inscription_commitment_data(
            secp,
            &inscription_script,
            leaf_version,
            internal_key,
            network,
        )?;

        debug!("InscriptionData created, commit address {}", address);
        Ok(Self {
            inscription_script,
            script_size,
            leaf_version,
            script_pubkey: address.script_pubkey(),
            address,
            taproot_spend_info,
        })
    }

    /// Control block proving the reveal script is the single leaf of the output key.
    pub fn control_block(&self) -> Result<ControlBlock> {
        self.taproot_spend_info
            .control_block(&(self.inscription_script.clone(), self.leaf_version))
            .ok_or_else(|| {
                EtcherError::ScriptBuildError("Reveal script is not part of the tap tree".into())
            })
    }

    #[instrument(
        skip(secp, inscription_script, internal_key),
        target = "via_rune_etcher::script_builder"
    )]
    fn construct_inscription_commitment_data<C: Verification>(
        secp: &Secp256k1<C>,
        inscription_script: &ScriptBuf,
        leaf_version: LeafVersion,
        internal_key: UntweakedPublicKey,
        network: Network,
    ) -> Result<(Address, TaprootSpendInfo)> {
        debug!("Constructing inscription commitment data");
        let builder = TaprootBuilder::new()
            .add_leaf_with_ver(0, inscription_script.clone(), leaf_version)
            .map_err(|e| EtcherError::ScriptBuildError(format!("Failed to add leaf: {e}")))?;

        let taproot_spend_info = builder.finalize(secp, internal_key).map_err(|_| {
            EtcherError::ScriptBuildError("Failed to finalize taproot spend info".into())
        })?;

        let address = Address::p2tr_tweaked(taproot_spend_info.output_key(), network);

        debug!("Inscription commitment data constructed");
        Ok((address, taproot_spend_info))
    }

    fn build_basic_inscription_script(internal_key: UntweakedPublicKey) -> ScriptBuilder {
        ScriptBuilder::new()
            .push_x_only_key(&internal_key)
            .push_opcode(all::OP_CHECKSIG)
            .push_opcode(OP_FALSE)
            .push_opcode(all::OP_IF)
            .push_slice(ORD_PROTOCOL_ID)
    }

    #[instrument(
        skip(basic_script, content, commitment),
        target = "via_rune_etcher::script_builder"
    )]
    fn complete_inscription(
        basic_script: ScriptBuilder,
        content: &InscriptionContent,
        commitment: &[u8],
    ) -> Result<(ScriptBuf, usize)> {
        debug!(
            "Completing inscription, content type {}, body {} bytes",
            content.content_type,
            content.body.len()
        );
        let content_type_encoded = Self::encode_push_bytes(content.content_type.as_bytes())?;
        let commitment_encoded = Self::encode_push_bytes(commitment)?;
        let body_encoded = Self::encode_push_bytes(&content.body)?;

        let mut script = basic_script
            .push_slice(CONTENT_TYPE_TAG)
            .push_slice(content_type_encoded)
            .push_slice(POINTER_TAG)
            .push_opcode(OP_0)
            .push_slice(RUNE_COMMITMENT_TAG)
            .push_slice(commitment_encoded)
            .push_opcode(OP_0);

        if !content.body.is_empty() {
            script = script.push_slice(body_encoded);
        }

        let final_script = script.push_opcode(all::OP_ENDIF).into_script();
        let script_size = final_script.len();

        debug!("Inscription completed, script size: {}", script_size);
        Ok((final_script, script_size))
    }

    fn encode_push_bytes(data: &[u8]) -> Result<PushBytesBuf> {
        if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(EtcherError::ScriptBuildError(format!(
                "Push of {} bytes exceeds the {MAX_SCRIPT_ELEMENT_SIZE} byte element limit",
                data.len()
            )));
        }

        PushBytesBuf::try_from(data.to_vec())
            .map_err(|e| EtcherError::ScriptBuildError(e.to_string()))
    }
}
