// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use anyhow::{Context as _, bail};
use fvm_shared::{
    ActorID,
    address::{Address, Network, Payload},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A storage miner: its on-chain actor address plus the numeric actor ID
/// derived from it. Constructed once per run and never mutated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MinerIdentity {
    address: Address,
    id: ActorID,
}

impl MinerIdentity {
    /// Derives the actor ID from `address`. Only ID addresses (`f0...`)
    /// identify a miner actor directly; anything else is rejected.
    pub fn new(address: Address) -> anyhow::Result<Self> {
        match address.payload() {
            Payload::ID(id) => Ok(MinerIdentity { address, id: *id }),
            _ => bail!("{address} is not an ID address"),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn id(&self) -> ActorID {
        self.id
    }

    /// The miner address in its canonical CBOR encoding, used as entropy
    /// when drawing sealing randomness. Must match the encoding used at
    /// original sealing time byte-for-byte.
    pub fn entropy(&self) -> anyhow::Result<Vec<u8>> {
        fvm_ipld_encoding::to_vec(&self.address).context("encoding miner address")
    }
}

impl FromStr for MinerIdentity {
    type Err = anyhow::Error;

    /// Accepts both mainnet (`f0...`) and testnet (`t0...`) prefixes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = Network::Mainnet
            .parse_address(s)
            .or_else(|_| Network::Testnet.parse_address(s))
            .with_context(|| format!("invalid miner address {s}"))?;
        Self::new(address)
    }
}

impl fmt::Display for MinerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.address.fmt(f)
    }
}

impl TryFrom<String> for MinerIdentity {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MinerIdentity> for String {
    fn from(miner: MinerIdentity) -> Self {
        miner.to_string()
    }
}
