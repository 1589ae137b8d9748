use bitcoin::{consensus::encode::serialize_hex, Amount, OutPoint, TxOut};
use tracing::{debug, info, instrument, warn};

use crate::{
    traits::BitcoinSigner,
    types::{EtcherError, Result},
};

pub mod fee;
pub mod finalizer;
pub mod script_builder;
#[cfg(test)]
pub(crate) mod test_utils;
pub mod tx_builder;
pub mod types;

pub use self::{
    fee::{FeeEstimate, RevealFeeCalculator},
    script_builder::InscriptionData,
    tx_builder::{RevealTemplate, RevealTxBuilder},
    types::{CommitInfo, EtchingRequest, InscriptionContent, PriorOutput, RevealInfo},
};

pub const REVEAL_TX_RECEIVER_OUTPUT_INDEX: u32 = 0;
pub const REVEAL_TX_DATA_OUTPUT_INDEX: u32 = 1;

/// Two phase rune etcher.
///
/// Phase one ([`Etcher::commit_info`]) derives the taproot address the operator funds.
/// Phase two ([`Etcher::reveal`]) spends that output once it has confirmed. Both phases
/// recompute the envelope from the same key and request.
pub struct Etcher {
    signer: Box<dyn BitcoinSigner>,
    request: EtchingRequest,
    inscription: InscriptionData,
    template: RevealTemplate,
}

impl std::fmt::Debug for Etcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Etcher")
            .field("request", &self.request)
            .field("inscription", &self.inscription)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

impl Etcher {
    #[instrument(skip(signer, request), target = "via_rune_etcher::inscriber")]
    pub fn new(signer: Box<dyn BitcoinSigner>, request: EtchingRequest) -> Result<Self> {
        if signer.get_network() != request.network() {
            return Err(EtcherError::NetworkMismatch {
                expected: request.network().to_string(),
                actual: signer.get_network().to_string(),
            });
        }

        let internal_key = signer.get_internal_key()?;
        let inscription = InscriptionData::new(
            request.content(),
            &request.commitment(),
            signer.get_secp_ref(),
            internal_key,
            request.network(),
        )?;

        let data_output = RevealTxBuilder::build_data_output(&request.runestone())?;
        let template = RevealTemplate {
            commit_script_pubkey: inscription.script_pubkey.clone(),
            script: inscription.inscription_script.clone(),
            leaf_version: inscription.leaf_version,
            control_block: inscription.control_block()?,
            internal_key,
            receiver: TxOut {
                value: request.receiver_value(),
                script_pubkey: request.receiver().script_pubkey(),
            },
            data_output,
        };

        debug!(
            "Etcher ready for {:?}, script size {}",
            request.spaced_rune().map(|rune| rune.to_string()),
            inscription.script_size
        );

        Ok(Self {
            signer,
            request,
            inscription,
            template,
        })
    }

    pub fn request(&self) -> &EtchingRequest {
        &self.request
    }

    pub fn inscription(&self) -> &InscriptionData {
        &self.inscription
    }

    pub fn template(&self) -> &RevealTemplate {
        &self.template
    }

    /// Phase one: the commit address and the amount it has to be funded with.
    #[instrument(skip(self), target = "via_rune_etcher::inscriber")]
    pub fn commit_info(&self) -> Result<CommitInfo> {
        let estimate = RevealFeeCalculator::estimate(&self.template, self.signer.as_ref())?;

        info!("Commit address {}", self.inscription.address);
        Ok(CommitInfo {
            address: self.inscription.address.clone(),
            script_pubkey: self.inscription.script_pubkey.clone(),
            fee: estimate.fee,
            reveal_vsize: estimate.vsize,
            required_funding: estimate.required_funding,
        })
    }

    /// Phase two: spends the funded commit output.
    ///
    /// `funded_value` defaults to the required funding. Anything above what the outputs
    /// carry is left to the miner.
    #[instrument(skip(self), target = "via_rune_etcher::inscriber")]
    pub fn reveal(&self, funding: OutPoint, funded_value: Option<Amount>) -> Result<RevealInfo> {
        let estimate = RevealFeeCalculator::estimate(&self.template, self.signer.as_ref())?;
        let funded = funded_value.unwrap_or(estimate.required_funding);

        if funded < estimate.required_funding {
            return Err(EtcherError::InsufficientFunding {
                required: estimate.required_funding,
                funded,
            });
        }

        let prior = PriorOutput {
            outpoint: funding,
            value: funded,
            script_pubkey: self.inscription.script_pubkey.clone(),
        };

        let mut psbt = self.template.draft(&prior)?;
        finalizer::sign_all_inputs(&mut psbt, self.signer.as_ref())?;
        finalizer::finalize_all_inputs(&mut psbt, self.signer.as_ref())?;
        let tx = finalizer::extract(psbt)?;

        let vsize = tx.vsize();
        if vsize != estimate.vsize {
            warn!(
                "Reveal vsize {} differs from the estimate {}",
                vsize, estimate.vsize
            );
        }

        let fee = funded - self.template.receiver.value;
        let txid = tx.compute_txid();
        let raw_tx_hex = serialize_hex(&tx);

        info!("Reveal transaction {} ({} vB, fee {} sat)", txid, vsize, fee.to_sat());
        Ok(RevealInfo {
            tx,
            txid,
            raw_tx_hex,
            vsize,
            fee,
        })
    }
}
