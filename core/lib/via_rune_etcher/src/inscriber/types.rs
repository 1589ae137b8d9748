use std::str::FromStr;

use bitcoin::{Address, Amount, Network, OutPoint, ScriptBuf, Transaction, TxOut, Txid};
use ordinals::{Etching, Rune, Runestone, SpacedRune, Terms};
use via_config::ViaRuneEtcherConfig;

use crate::types::{EtcherError, Result, DEFAULT_CONTENT_TYPE, DEFAULT_RECEIVER_VALUE};

/// Content revealed in the envelope body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InscriptionContent {
    pub content_type: String,
    pub body: Vec<u8>,
}

impl InscriptionContent {
    pub fn new(content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            body: body.into(),
        }
    }
}

/// Everything one etching run needs, validated up front.
///
/// Fields are only reachable through accessors, every `with_*` change is validated again.
#[derive(Debug, Clone)]
pub struct EtchingRequest {
    network: Network,
    receiver: Address,
    receiver_value: Amount,
    etching: Etching,
    content: InscriptionContent,
}

impl EtchingRequest {
    pub fn new(
        network: Network,
        receiver: Address,
        receiver_value: Amount,
        etching: Etching,
        content: InscriptionContent,
    ) -> Result<Self> {
        let request = Self {
            network,
            receiver,
            receiver_value,
            etching,
            content,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn from_config(config: &ViaRuneEtcherConfig) -> Result<Self> {
        let network = config
            .network()
            .map_err(|e| EtcherError::InvalidNetwork(e.to_string()))?;

        let receiver = Address::from_str(&config.receiver_address)?.require_network(network)?;

        let spaced_rune = SpacedRune::from_str(&config.rune_name)
            .map_err(|e| EtcherError::InvalidRune(e.to_string()))?;

        let symbol = config
            .symbol
            .as_deref()
            .map(|symbol| {
                let mut chars = symbol.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(EtcherError::InvalidEtching(format!(
                        "Symbol must be a single character, got {symbol:?}"
                    ))),
                }
            })
            .transpose()?;

        let has_terms = config.mint_amount.is_some()
            || config.mint_cap.is_some()
            || config.mint_height_start.is_some()
            || config.mint_height_end.is_some()
            || config.mint_offset_start.is_some()
            || config.mint_offset_end.is_some();

        let terms = has_terms.then(|| Terms {
            amount: config.mint_amount.map(u128::from),
            cap: config.mint_cap.map(u128::from),
            height: (config.mint_height_start, config.mint_height_end),
            offset: (config.mint_offset_start, config.mint_offset_end),
        });

        let etching = Etching {
            divisibility: config.divisibility,
            premine: config.premine.map(u128::from),
            rune: Some(spaced_rune.rune),
            spacers: Some(spaced_rune.spacers).filter(|spacers| *spacers != 0),
            symbol,
            terms,
            turbo: config.turbo.unwrap_or_default(),
        };

        let content = InscriptionContent::new(
            config
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            config.content.as_bytes(),
        );

        Self::new(
            network,
            receiver,
            config
                .receiver_value
                .map(Amount::from_sat)
                .unwrap_or(DEFAULT_RECEIVER_VALUE),
            etching,
            content,
        )
    }

    fn validate(&self) -> Result<()> {
        if self.network == Network::Bitcoin {
            return Err(EtcherError::InvalidNetwork(
                "etching on mainnet is not supported".into(),
            ));
        }

        let min_value = self.receiver.script_pubkey().minimal_non_dust();
        if self.receiver_value < min_value {
            return Err(EtcherError::InvalidEtching(format!(
                "Receiver value {} is below the dust limit {}",
                self.receiver_value, min_value
            )));
        }

        let rune = self
            .etching
            .rune
            .ok_or_else(|| EtcherError::InvalidRune("etching has no rune name".into()))?;

        if let Some(divisibility) = self.etching.divisibility {
            if divisibility > Etching::MAX_DIVISIBILITY {
                return Err(EtcherError::InvalidEtching(format!(
                    "Divisibility {divisibility} exceeds {}",
                    Etching::MAX_DIVISIBILITY
                )));
            }
        }

        if let Some(spacers) = self.etching.spacers {
            let name_len = rune.to_string().len() as u32;
            if spacers != 0 && (name_len < 2 || spacers >> (name_len - 1) != 0) {
                return Err(EtcherError::InvalidRune(format!(
                    "Spacers {spacers:#b} do not fit rune {rune}"
                )));
            }
        }

        if self.etching.supply().is_none() {
            return Err(EtcherError::InvalidEtching(
                "Premine plus cap times amount overflows".into(),
            ));
        }

        Ok(())
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn receiver(&self) -> &Address {
        &self.receiver
    }

    pub fn receiver_value(&self) -> Amount {
        self.receiver_value
    }

    pub fn etching(&self) -> &Etching {
        &self.etching
    }

    pub fn content(&self) -> &InscriptionContent {
        &self.content
    }

    pub fn with_receiver_value(mut self, receiver_value: Amount) -> Result<Self> {
        self.receiver_value = receiver_value;
        self.validate()?;
        Ok(self)
    }

    pub fn with_etching(mut self, etching: Etching) -> Result<Self> {
        self.etching = etching;
        self.validate()?;
        Ok(self)
    }

    pub fn with_content(mut self, content: InscriptionContent) -> Result<Self> {
        self.content = content;
        self.validate()?;
        Ok(self)
    }

    /// Runestone placed in the data output: the etching with the premine sent to output 0.
    pub fn runestone(&self) -> Runestone {
        Runestone {
            etching: Some(self.etching),
            pointer: Some(0),
            ..Default::default()
        }
    }

    /// Commitment pushed into the envelope under the rune tag.
    pub fn commitment(&self) -> Vec<u8> {
        self.etching
            .rune
            .map(Rune::commitment)
            .unwrap_or_default()
    }

    pub fn spaced_rune(&self) -> Option<SpacedRune> {
        self.etching
            .rune
            .map(|rune| SpacedRune::new(rune, self.etching.spacers.unwrap_or_default()))
    }
}

/// The commit output being spent by the reveal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorOutput {
    pub outpoint: OutPoint,
    pub value: Amount,
    pub script_pubkey: ScriptBuf,
}

impl PriorOutput {
    pub fn tx_out(&self) -> TxOut {
        TxOut {
            value: self.value,
            script_pubkey: self.script_pubkey.clone(),
        }
    }
}

/// Phase one result: where and how much the operator has to fund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub address: Address,
    pub script_pubkey: ScriptBuf,
    pub fee: Amount,
    pub reveal_vsize: usize,
    pub required_funding: Amount,
}

/// Phase two result: the finalized reveal transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealInfo {
    pub tx: Transaction,
    pub txid: Txid,
    pub raw_tx_hex: String,
    pub vsize: usize,
    pub fee: Amount,
}
