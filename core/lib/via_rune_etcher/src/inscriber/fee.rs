use std::str::FromStr;

use bitcoin::{Amount, OutPoint, Txid};
use tracing::{debug, info, instrument};

use crate::{
    inscriber::{finalizer, tx_builder::RevealTemplate, types::PriorOutput},
    traits::BitcoinSigner,
    types::{EtcherError, Result, FEE_RATE_SAT_PER_VB},
};

/// Outpoint standing in for the commit output while it does not exist yet.
pub const PLACEHOLDER_TXID: &str =
    "e2aa2f0e1b49567e3c5e2f5985898657930e9f3ec1580b38429499e318c62b64";

/// Oversized input value of the estimate draft, 10 BTC.
pub const PLACEHOLDER_VALUE: Amount = Amount::from_sat(1_000_000_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub vsize: usize,
    pub fee: Amount,
    pub required_funding: Amount,
}

pub struct RevealFeeCalculator;

impl RevealFeeCalculator {
    /// Signs and finalizes a throwaway draft and measures its virtual size.
    ///
    /// The witness of a script path spend has a fixed size once the script and the
    /// control block are fixed, so one measurement is exact.
    #[instrument(skip(template, signer), target = "via_rune_etcher::fee")]
    pub fn estimate(template: &RevealTemplate, signer: &dyn BitcoinSigner) -> Result<FeeEstimate> {
        let prior = Self::placeholder_output(template)?;

        let mut psbt = template.draft(&prior)?;
        finalizer::sign_all_inputs(&mut psbt, signer)?;
        finalizer::finalize_all_inputs(&mut psbt, signer)?;
        let tx = finalizer::extract_unchecked(psbt);

        let vsize = tx.vsize();
        let fee = Self::fee_for_vsize(vsize)?;
        let required_funding = fee
            .checked_add(template.receiver.value)
            .ok_or_else(|| EtcherError::TransactionBuildingError("Funding overflows".into()))?;

        debug!("Estimate draft weight {}", tx.weight());
        info!(
            "Reveal vsize {} vB, fee {} sat, required funding {} sat",
            vsize,
            fee.to_sat(),
            required_funding.to_sat()
        );

        Ok(FeeEstimate {
            vsize,
            fee,
            required_funding,
        })
    }

    pub fn fee_for_vsize(vsize: usize) -> Result<Amount> {
        (vsize as u64)
            .checked_mul(FEE_RATE_SAT_PER_VB)
            .map(Amount::from_sat)
            .ok_or_else(|| EtcherError::TransactionBuildingError("Fee overflows".into()))
    }

    fn placeholder_output(template: &RevealTemplate) -> Result<PriorOutput> {
        Ok(PriorOutput {
            outpoint: OutPoint {
                txid: Txid::from_str(PLACEHOLDER_TXID)?,
                vout: 0,
            },
            value: PLACEHOLDER_VALUE,
            script_pubkey: template.commit_script_pubkey.clone(),
        })
    }
}
