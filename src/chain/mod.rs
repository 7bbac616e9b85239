// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Boundary with the chain-state collaborator: the queries the recovery
//! engine needs, plus the resolver that turns them into deterministic
//! sealing inputs.

mod resolver;
pub mod rpc;

pub use resolver::resolve_ticket;

use async_trait::async_trait;
use cid::Cid;
use fvm_shared::{
    address::Address,
    clock::ChainEpoch,
    randomness::Randomness,
    sector::{RegisteredSealProof, SectorNumber},
};

/// Domain separation tags for chain randomness. Only the sealing tag is
/// needed here; the values are fixed by the protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i64)]
pub enum DomainSeparationTag {
    SealRandomness = 1,
}

/// A tipset key: the CIDs of the blocks in the tipset. The empty key denotes
/// the current chain head, mirroring the lotus `EmptyTSK` convention.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TipsetKey(pub Vec<Cid>);

impl TipsetKey {
    /// The current chain head.
    pub fn head() -> Self {
        Self::default()
    }
}

/// The slice of a tipset the resolver cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tipset {
    pub key: TipsetKey,
    pub height: ChainEpoch,
}

/// On-chain record of a sector with an accepted proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectorOnChainInfo {
    pub sector_number: SectorNumber,
    pub seal_proof: RegisteredSealProof,
    pub sealed_cid: Cid,
    pub activation: ChainEpoch,
}

/// On-chain pre-commitment record of a sector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectorPreCommitInfo {
    pub sector_number: SectorNumber,
    pub seal_proof: RegisteredSealProof,
    pub sealed_cid: Cid,
    /// Epoch the sealing randomness was drawn at.
    pub seal_rand_epoch: ChainEpoch,
    /// Epoch the pre-commit message landed at.
    pub precommit_epoch: ChainEpoch,
}

/// Chain-state queries the recovery engine consumes. Implemented over a
/// full-node RPC endpoint in production ([`rpc::LotusChain`]) and by fakes
/// in tests.
#[async_trait]
pub trait ChainStateReader: Send + Sync {
    /// Proven-sector record, or `None` if the sector has no accepted proof
    /// at `tipset`.
    async fn sector_info(
        &self,
        miner: &Address,
        sector: SectorNumber,
        tipset: &TipsetKey,
    ) -> anyhow::Result<Option<SectorOnChainInfo>>;

    /// Pre-commitment record, or `None` if absent at `tipset`.
    async fn sector_precommit_info(
        &self,
        miner: &Address,
        sector: SectorNumber,
        tipset: &TipsetKey,
    ) -> anyhow::Result<Option<SectorPreCommitInfo>>;

    /// The miner's sector size in bytes.
    async fn miner_sector_size(&self, miner: &Address, tipset: &TipsetKey)
    -> anyhow::Result<u64>;

    /// Canonical tipset at `height`, walking back from `tipset`.
    async fn tipset_by_height(
        &self,
        height: ChainEpoch,
        tipset: &TipsetKey,
    ) -> anyhow::Result<Option<Tipset>>;

    /// Domain-separated randomness drawn from the ticket chain at `epoch`,
    /// evaluated at `tipset`.
    async fn randomness_from_tickets(
        &self,
        tag: DomainSeparationTag,
        epoch: ChainEpoch,
        entropy: &[u8],
        tipset: &TipsetKey,
    ) -> anyhow::Result<Randomness>;
}
