use std::collections::BTreeMap;

use bitcoin::{
    absolute::LockTime,
    key::UntweakedPublicKey,
    psbt::{self, Psbt},
    script::Instruction,
    taproot::{ControlBlock, LeafVersion},
    transaction::Version,
    Amount, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness,
};
use ordinals::Runestone;
use tracing::{debug, instrument};

use crate::{
    inscriber::types::PriorOutput,
    types::{EtcherError, Result},
};

/// Assembles a reveal draft from explicitly ordered inputs and outputs.
///
/// No coin selection and no fee handling happen here, output values are taken as given.
#[derive(Debug, Default)]
pub struct RevealTxBuilder {
    inputs: Vec<(TxIn, psbt::Input)>,
    outputs: Vec<TxOut>,
}

impl RevealTxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a script path spend of `prior` through `script`.
    pub fn add_input(
        &mut self,
        prior: &PriorOutput,
        script: &ScriptBuf,
        leaf_version: LeafVersion,
        control_block: &ControlBlock,
        internal_key: UntweakedPublicKey,
    ) -> &mut Self {
        let txin = TxIn {
            previous_output: prior.outpoint,
            script_sig: ScriptBuf::default(),
            sequence: Sequence::MAX,
            witness: Witness::default(), // Filled in by the finalizer.
        };

        let mut tap_scripts = BTreeMap::new();
        tap_scripts.insert(control_block.clone(), (script.clone(), leaf_version));

        let input = psbt::Input {
            witness_utxo: Some(prior.tx_out()),
            tap_internal_key: Some(internal_key),
            tap_scripts,
            ..Default::default()
        };

        self.inputs.push((txin, input));
        self
    }

    pub fn add_output(&mut self, script_pubkey: ScriptBuf, value: Amount) -> &mut Self {
        self.outputs.push(TxOut {
            value,
            script_pubkey,
        });
        self
    }

    /// Builds the zero value `OP_RETURN OP_13 <payload>` output carrying `runestone`.
    ///
    /// The payload has to fit a single push.
    #[instrument(skip(runestone), target = "via_rune_etcher::tx_builder")]
    pub fn build_data_output(runestone: &Runestone) -> Result<TxOut> {
        let script_pubkey = runestone.encipher();

        let pushes = script_pubkey
            .instructions()
            .filter(|instruction| matches!(instruction, Ok(Instruction::PushBytes(_))))
            .count();
        if pushes > 1 {
            return Err(EtcherError::TransactionBuildingError(format!(
                "Runestone payload needs {pushes} pushes, only one is allowed"
            )));
        }

        debug!("Data output script size: {}", script_pubkey.len());
        Ok(TxOut {
            value: Amount::ZERO,
            script_pubkey,
        })
    }

    #[instrument(skip(self), target = "via_rune_etcher::tx_builder")]
    pub fn build(&self) -> Result<Psbt> {
        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(EtcherError::TransactionBuildingError(format!(
                "Draft needs inputs and outputs, got {} and {}",
                self.inputs.len(),
                self.outputs.len()
            )));
        }

        let unsigned_tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: self.inputs.iter().map(|(txin, _)| txin.clone()).collect(),
            output: self.outputs.clone(),
        };

        let mut psbt = Psbt::from_unsigned_tx(unsigned_tx)?;
        for (slot, (_, input)) in psbt.inputs.iter_mut().zip(&self.inputs) {
            *slot = input.clone();
        }

        debug!(
            "Built draft with {} inputs and {} outputs",
            psbt.inputs.len(),
            psbt.outputs.len()
        );
        Ok(psbt)
    }
}

/// Everything fixed across reveal drafts: one taproot leaf spend plus the two outputs.
///
/// The estimate draft and the real draft are both built from one template.
#[derive(Debug, Clone)]
pub struct RevealTemplate {
    pub commit_script_pubkey: ScriptBuf,
    pub script: ScriptBuf,
    pub leaf_version: LeafVersion,
    pub control_block: ControlBlock,
    pub internal_key: UntweakedPublicKey,
    pub receiver: TxOut,
    pub data_output: TxOut,
}

impl RevealTemplate {
    /// Fresh draft spending `prior`: receiver at index 0, data output at index 1.
    pub fn draft(&self, prior: &PriorOutput) -> Result<Psbt> {
        if prior.script_pubkey != self.commit_script_pubkey {
            return Err(EtcherError::TransactionBuildingError(
                "Prior output is not locked to the commit address".into(),
            ));
        }

        let mut builder = RevealTxBuilder::new();
        builder
            .add_input(
                prior,
                &self.script,
                self.leaf_version,
                &self.control_block,
                self.internal_key,
            )
            .add_output(self.receiver.script_pubkey.clone(), self.receiver.value)
            .add_output(
                self.data_output.script_pubkey.clone(),
                self.data_output.value,
            );

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use assert_matches::assert_matches;
    use bitcoin::{OutPoint, Txid};
    use ordinals::{Edict, RuneId};

    use super::*;
    use crate::inscriber::test_utils::{test_etcher, test_request};

    fn prior_output() -> PriorOutput {
        PriorOutput {
            outpoint: OutPoint {
                txid: Txid::from_str(
                    "e2aa2f0e1b49567e3c5e2f5985898657930e9f3ec1580b38429499e318c62b64",
                )
                .unwrap(),
                vout: 0,
            },
            value: Amount::from_sat(10_000),
            script_pubkey: ScriptBuf::from_bytes(vec![0x51]),
        }
    }

    #[test]
    fn test_data_output_layout() {
        let runestone = Runestone {
            pointer: Some(0),
            ..Default::default()
        };
        let txout = RevealTxBuilder::build_data_output(&runestone).unwrap();

        assert_eq!(txout.value, Amount::ZERO);
        assert_eq!(hex::encode(txout.script_pubkey.as_bytes()), "6a5d021600");
    }

    #[test]
    fn test_data_output_rejects_oversized_payload() {
        let edict = Edict {
            id: RuneId { block: 1, tx: 0 },
            amount: u128::MAX,
            output: 0,
        };
        let runestone = Runestone {
            edicts: vec![edict; 40],
            ..Default::default()
        };

        assert_matches!(
            RevealTxBuilder::build_data_output(&runestone),
            Err(EtcherError::TransactionBuildingError(_))
        );
    }

    #[test]
    fn test_build_requires_inputs_and_outputs() {
        assert_matches!(
            RevealTxBuilder::new().build(),
            Err(EtcherError::TransactionBuildingError(_))
        );
    }

    #[test]
    fn test_outputs_keep_insertion_order() {
        let mut builder = RevealTxBuilder::new();
        let key = UntweakedPublicKey::from_str(
            "a60869f0dbcf1dc659c9cecbaf8050135ea9e8cdc487053f1dc6880949dc684c",
        )
        .unwrap();
        let control_block = ControlBlock::decode(
            &hex::decode("c0a60869f0dbcf1dc659c9cecbaf8050135ea9e8cdc487053f1dc6880949dc684c")
                .unwrap(),
        )
        .unwrap();
        let script = ScriptBuf::from_bytes(vec![0x51]);

        builder
            .add_input(
                &prior_output(),
                &script,
                LeafVersion::TapScript,
                &control_block,
                key,
            )
            .add_output(ScriptBuf::from_bytes(vec![0x51]), Amount::from_sat(600))
            .add_output(ScriptBuf::from_bytes(vec![0x6a, 0x02, 0x02, 0x02]), Amount::ZERO);

        let psbt = builder.build().unwrap();
        let tx = &psbt.unsigned_tx;

        assert_eq!(tx.version, Version::TWO);
        assert_eq!(tx.lock_time, LockTime::ZERO);
        assert_eq!(tx.input.len(), 1);
        assert_eq!(tx.input[0].sequence, Sequence::MAX);
        assert_eq!(tx.input[0].previous_output, prior_output().outpoint);
        assert_eq!(tx.output[0].value, Amount::from_sat(600));
        assert_eq!(tx.output[1].value, Amount::ZERO);

        let input = &psbt.inputs[0];
        assert_eq!(input.witness_utxo, Some(prior_output().tx_out()));
        assert_eq!(input.tap_internal_key, Some(key));
        assert_eq!(
            input.tap_scripts.get(&control_block),
            Some(&(script, LeafVersion::TapScript))
        );

        // A second build shares nothing with the first.
        let again = builder.build().unwrap();
        assert_eq!(again, psbt);
    }

    #[test]
    fn test_draft_rejects_foreign_prior_output() {
        let etcher = test_etcher(test_request());

        assert_matches!(
            etcher.template().draft(&prior_output()),
            Err(EtcherError::TransactionBuildingError(msg)) if msg.contains("commit address")
        );

        let prior = PriorOutput {
            script_pubkey: etcher.template().commit_script_pubkey.clone(),
            ..prior_output()
        };
        assert!(etcher.template().draft(&prior).is_ok());
    }
}
