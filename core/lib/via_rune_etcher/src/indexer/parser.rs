use bitcoin::{
    key::UntweakedPublicKey,
    opcodes::all,
    script::Instruction,
    secp256k1::{Secp256k1, VerifyOnly},
    taproot::{ControlBlock, LeafVersion, Signature as TaprootSignature, TaprootBuilder},
    Address, Network, ScriptBuf, Transaction, TxIn,
};
use ordinals::{Artifact, Rune, Runestone};
use tracing::{debug, instrument, warn};

use crate::{
    types::{
        EtcherError, Result, CONTENT_TYPE_TAG, ORD_PROTOCOL_ID, POINTER_TAG, RUNE_COMMITMENT_TAG,
    },
};

const MIN_WITNESS_LENGTH: usize = 3;

/// Envelope and runestone data recovered from a reveal transaction.
#[derive(Debug, PartialEq, Eq)]
pub struct ParsedEtching {
    pub signature: TaprootSignature,
    pub internal_key: UntweakedPublicKey,
    pub control_block: ControlBlock,
    /// Commit address the reveal input spends, rebuilt from the script and control block.
    pub commit_address: Address,
    pub content_type: Option<String>,
    pub pointer: Option<u32>,
    pub commitment: Vec<u8>,
    pub body: Vec<u8>,
    pub runestone: Runestone,
}

impl ParsedEtching {
    pub fn rune(&self) -> Option<Rune> {
        self.runestone.etching.and_then(|etching| etching.rune)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Envelope {
    content_type: Option<String>,
    pointer: Option<u32>,
    commitment: Option<Vec<u8>>,
    body: Vec<u8>,
}

#[derive(Debug)]
pub struct EtchingParser {
    network: Network,
    secp: Secp256k1<VerifyOnly>,
}

impl EtchingParser {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            secp: Secp256k1::verification_only(),
        }
    }

    /// Reads the envelope of the first input and checks it against the runestone output.
    #[instrument(skip(self, tx), target = "via_rune_etcher::parser")]
    pub fn parse_reveal_transaction(&self, tx: &Transaction) -> Result<ParsedEtching> {
        debug!("Parsing reveal transaction on {}", self.network);
        let input = tx
            .input
            .first()
            .ok_or_else(|| EtcherError::ParsingError("Transaction has no inputs".into()))?;

        let (signature, script, control_block) = Self::parse_witness(input)?;
        let commit_address = self.commit_address(&script, &control_block)?;
        let envelope = Self::parse_envelope(&script, &control_block)?;

        let runestone = match Runestone::decipher(tx) {
            Some(Artifact::Runestone(runestone)) => runestone,
            Some(Artifact::Cenotaph(cenotaph)) => {
                return Err(EtcherError::ParsingError(format!(
                    "Cenotaph found: {cenotaph:?}"
                )))
            }
            None => {
                return Err(EtcherError::ParsingError(
                    "Transaction has no runestone".into(),
                ))
            }
        };

        let commitment = envelope
            .commitment
            .ok_or_else(|| EtcherError::ParsingError("Envelope has no rune commitment".into()))?;

        let expected = runestone
            .etching
            .and_then(|etching| etching.rune)
            .map(Rune::commitment)
            .ok_or_else(|| EtcherError::ParsingError("Runestone etches no rune".into()))?;

        if commitment != expected {
            warn!(
                "Commitment {} does not match the etched rune {}",
                hex::encode(&commitment),
                hex::encode(&expected)
            );
            return Err(EtcherError::ParsingError(
                "Envelope commitment does not match the etched rune".into(),
            ));
        }

        Ok(ParsedEtching {
            signature,
            internal_key: control_block.internal_key,
            control_block,
            commit_address,
            content_type: envelope.content_type,
            pointer: envelope.pointer,
            commitment,
            body: envelope.body,
            runestone,
        })
    }

    fn parse_witness(input: &TxIn) -> Result<(TaprootSignature, ScriptBuf, ControlBlock)> {
        let witness = &input.witness;
        if witness.len() < MIN_WITNESS_LENGTH {
            return Err(EtcherError::ParsingError(format!(
                "Witness has {} elements, expected {MIN_WITNESS_LENGTH}",
                witness.len()
            )));
        }

        let signature = TaprootSignature::from_slice(&witness[0])
            .map_err(|e| EtcherError::ParsingError(format!("Invalid signature: {e}")))?;
        let script = ScriptBuf::from_bytes(witness[1].to_vec());
        let control_block = ControlBlock::decode(&witness[2])
            .map_err(|e| EtcherError::ParsingError(format!("Invalid control block: {e}")))?;

        if control_block.leaf_version != LeafVersion::TapScript {
            return Err(EtcherError::ParsingError(format!(
                "Unexpected leaf version {:?}",
                control_block.leaf_version
            )));
        }

        Ok((signature, script, control_block))
    }

    /// Rebuilds the single leaf tap tree of the reveal script and derives its address.
    fn commit_address(&self, script: &ScriptBuf, control_block: &ControlBlock) -> Result<Address> {
        let spend_info = TaprootBuilder::new()
            .add_leaf_with_ver(0, script.clone(), control_block.leaf_version)
            .map_err(|e| EtcherError::ParsingError(format!("Invalid tap leaf: {e}")))?
            .finalize(&self.secp, control_block.internal_key)
            .map_err(|_| EtcherError::ParsingError("Failed to rebuild the tap tree".into()))?;

        let output_key = spend_info.output_key();
        if !control_block.verify_taproot_commitment(&self.secp, output_key.to_inner(), script) {
            return Err(EtcherError::ParsingError(
                "Control block does not commit to the reveal script".into(),
            ));
        }

        let address = Address::p2tr_tweaked(output_key, self.network);
        debug!("Reveal spends commit address {}", address);
        Ok(address)
    }

    #[instrument(skip(script, control_block), target = "via_rune_etcher::parser")]
    fn parse_envelope(script: &ScriptBuf, control_block: &ControlBlock) -> Result<Envelope> {
        let instructions = script
            .instructions()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| EtcherError::ParsingError(format!("Malformed script: {e}")))?;
        let mut iter = instructions.into_iter();

        match iter.next() {
            Some(Instruction::PushBytes(key))
                if key.as_bytes() == control_block.internal_key.serialize().as_slice() => {}
            _ => {
                return Err(EtcherError::ParsingError(
                    "Script does not start with the internal key".into(),
                ))
            }
        }

        let header_ok = matches!(iter.next(), Some(Instruction::Op(all::OP_CHECKSIG)))
            && matches!(iter.next(), Some(Instruction::PushBytes(push)) if push.as_bytes().is_empty())
            && matches!(iter.next(), Some(Instruction::Op(all::OP_IF)))
            && matches!(iter.next(), Some(Instruction::PushBytes(push)) if push.as_bytes() == ORD_PROTOCOL_ID.as_slice());
        if !header_ok {
            return Err(EtcherError::ParsingError("Envelope header not found".into()));
        }

        let mut envelope = Envelope::default();
        let mut in_body = false;

        loop {
            let push = match iter.next() {
                Some(Instruction::Op(all::OP_ENDIF)) => break,
                Some(Instruction::PushBytes(push)) => push.as_bytes(),
                Some(Instruction::Op(op)) => {
                    return Err(EtcherError::ParsingError(format!(
                        "Unexpected opcode {op} in envelope"
                    )))
                }
                None => return Err(EtcherError::ParsingError("Envelope is not closed".into())),
            };

            if in_body {
                envelope.body.extend_from_slice(push);
                continue;
            }

            if push.is_empty() {
                in_body = true;
                continue;
            }

            let value = match iter.next() {
                Some(Instruction::PushBytes(value)) => value.as_bytes(),
                _ => {
                    return Err(EtcherError::ParsingError(format!(
                        "Envelope field {} has no value",
                        hex::encode(push)
                    )))
                }
            };

            match push {
                tag if tag == CONTENT_TYPE_TAG.as_slice() => {
                    let content_type = String::from_utf8(value.to_vec()).map_err(|_| {
                        EtcherError::ParsingError("Content type is not UTF-8".into())
                    })?;
                    envelope.content_type = Some(content_type);
                }
                tag if tag == POINTER_TAG.as_slice() => {
                    envelope.pointer = Some(Self::decode_pointer(value)?);
                }
                tag if tag == RUNE_COMMITMENT_TAG.as_slice() => {
                    envelope.commitment = Some(value.to_vec());
                }
                [tag] if tag % 2 == 1 => debug!("Ignoring odd envelope field {}", tag),
                tag => {
                    return Err(EtcherError::ParsingError(format!(
                        "Unrecognized envelope field {}",
                        hex::encode(tag)
                    )))
                }
            }
        }

        if iter.next().is_some() {
            return Err(EtcherError::ParsingError(
                "Trailing instructions after envelope".into(),
            ));
        }

        Ok(envelope)
    }

    /// Little endian output index, an empty value means output 0.
    fn decode_pointer(value: &[u8]) -> Result<u32> {
        if value.len() > 4 {
            return Err(EtcherError::ParsingError(format!(
                "Pointer of {} bytes is out of range",
                value.len()
            )));
        }

        let mut bytes = [0u8; 4];
        bytes[..value.len()].copy_from_slice(value);
        Ok(u32::from_le_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use bitcoin::{
        opcodes::all::{OP_PUSHNUM_13, OP_RETURN},
        secp256k1::Parity,
        OutPoint, Witness,
    };
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::inscriber::{
        test_utils::{test_etcher, test_request},
        RevealTxBuilder,
    };

    fn reveal_tx() -> Transaction {
        test_etcher(test_request())
            .reveal(OutPoint::null(), None)
            .unwrap()
            .tx
    }

    fn witness_elements(tx: &Transaction) -> Vec<Vec<u8>> {
        tx.input[0].witness.iter().map(<[u8]>::to_vec).collect()
    }

    #[test]
    fn test_parse_reveal_transaction() {
        let request = test_request();
        let etcher = test_etcher(test_request());
        let parsed = EtchingParser::new(Network::Regtest)
            .parse_reveal_transaction(&reveal_tx())
            .unwrap();

        assert_eq!(parsed.content_type.as_deref(), Some("text/plain;charset=utf-8"));
        assert_eq!(parsed.pointer, Some(0));
        assert_eq!(parsed.body, b"I LOVE MY MOM".to_vec());
        assert_eq!(parsed.commitment, request.commitment());
        assert_eq!(parsed.runestone, request.runestone());
        assert_eq!(parsed.rune(), request.etching().rune);
        assert_eq!(parsed.commit_address, etcher.inscription().address);
    }

    #[test]
    fn test_commit_address_follows_parser_network() {
        let parsed = EtchingParser::new(Network::Signet)
            .parse_reveal_transaction(&reveal_tx())
            .unwrap();
        let etcher = test_etcher(test_request());

        assert_eq!(
            parsed.commit_address.script_pubkey(),
            etcher.inscription().script_pubkey
        );
        assert!(parsed.commit_address.to_string().starts_with("tb1p"));
    }

    #[test]
    fn test_rejects_missing_signature() {
        let mut tx = reveal_tx();
        let elements = witness_elements(&tx);
        tx.input[0].witness = Witness::from_slice(&elements[1..]);

        assert_matches!(
            EtchingParser::new(Network::Regtest).parse_reveal_transaction(&tx),
            Err(EtcherError::ParsingError(_))
        );
    }

    #[test]
    fn test_rejects_control_block_for_other_output_key() {
        let mut tx = reveal_tx();
        let mut elements = witness_elements(&tx);

        let mut control_block = ControlBlock::decode(&elements[2]).unwrap();
        control_block.output_key_parity = match control_block.output_key_parity {
            Parity::Even => Parity::Odd,
            Parity::Odd => Parity::Even,
        };
        elements[2] = control_block.serialize();
        tx.input[0].witness = Witness::from_slice(&elements);

        assert_matches!(
            EtchingParser::new(Network::Regtest).parse_reveal_transaction(&tx),
            Err(EtcherError::ParsingError(msg)) if msg.contains("does not commit")
        );
    }

    #[test]
    fn test_rejects_commitment_mismatch() {
        let mut tx = reveal_tx();

        let request = test_request();
        let mut etching = *request.etching();
        etching.rune = Some(Rune(42));
        etching.spacers = None;
        let other = request.with_etching(etching).unwrap();
        tx.output[1] = RevealTxBuilder::build_data_output(&other.runestone()).unwrap();

        assert_matches!(
            EtchingParser::new(Network::Regtest).parse_reveal_transaction(&tx),
            Err(EtcherError::ParsingError(msg)) if msg.contains("commitment")
        );
    }

    #[test]
    fn test_rejects_cenotaph() {
        let mut tx = reveal_tx();

        // Flags with an unknown bit set.
        tx.output[1].script_pubkey = ScriptBuf::builder()
            .push_opcode(OP_RETURN)
            .push_opcode(OP_PUSHNUM_13)
            .push_slice([2u8, 0b1001])
            .into_script();

        assert_matches!(
            EtchingParser::new(Network::Regtest).parse_reveal_transaction(&tx),
            Err(EtcherError::ParsingError(msg)) if msg.contains("Cenotaph")
        );
    }

    #[test]
    fn test_decode_pointer() {
        assert_eq!(EtchingParser::decode_pointer(&[]).unwrap(), 0);
        assert_eq!(EtchingParser::decode_pointer(&[1]).unwrap(), 1);
        assert_eq!(EtchingParser::decode_pointer(&[0, 1]).unwrap(), 256);
        assert!(EtchingParser::decode_pointer(&[0; 5]).is_err());
    }
}
