// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{ChainStateReader, DomainSeparationTag, Tipset, TipsetKey};
use crate::error::RecoveryError;
use crate::miner::MinerIdentity;
use cid::Cid;
use fvm_shared::{
    clock::ChainEpoch,
    randomness::Randomness,
    sector::{RegisteredSealProof, SectorNumber},
};

/// Everything the pipeline needs to reproduce one sector, resolved from
/// chain state. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectorDescriptor {
    pub sector_number: SectorNumber,
    pub seal_proof: RegisteredSealProof,
    pub sealed_cid: Cid,
    /// Epoch the sealing randomness was drawn at.
    pub seal_rand_epoch: ChainEpoch,
    /// Epoch whose tipset the randomness was evaluated at: the activation
    /// epoch for proven sectors, the pre-commit epoch otherwise.
    pub reference_epoch: ChainEpoch,
}

/// Resolves the deterministic sealing inputs for one sector.
///
/// For a proven sector the reference tipset is the one at its activation
/// epoch; for a sector that only has a pre-commitment on chain it is the one
/// at the pre-commit epoch. Picking the wrong tipset yields a randomness
/// value that deterministically fails commitment verification in phase 2,
/// so this branch is the correctness-critical part of the whole tool.
pub async fn resolve_ticket(
    chain: &dyn ChainStateReader,
    miner: &MinerIdentity,
    sector: SectorNumber,
) -> Result<(Randomness, SectorDescriptor), RecoveryError> {
    let head = TipsetKey::head();

    let (tipset, precommit) = match chain
        .sector_info(miner.address(), sector, &head)
        .await
        .map_err(RecoveryError::chain)?
    {
        Some(info) => {
            let tipset = tipset_at(chain, info.activation, &head).await?;
            let precommit = chain
                .sector_precommit_info(miner.address(), sector, &tipset.key)
                .await
                .map_err(RecoveryError::chain)?
                .ok_or_else(|| {
                    RecoveryError::NotFound(format!(
                        "pre-commit record for sector {sector} at epoch {}",
                        info.activation
                    ))
                })?;
            (tipset, precommit)
        }
        // No accepted proof yet: fall back to the pre-commitment record at
        // the chain head and its pre-commit epoch.
        None => {
            let precommit = chain
                .sector_precommit_info(miner.address(), sector, &head)
                .await
                .map_err(RecoveryError::chain)?
                .ok_or_else(|| RecoveryError::NotFound(format!("sector {sector}")))?;
            let tipset = tipset_at(chain, precommit.precommit_epoch, &head).await?;
            (tipset, precommit)
        }
    };

    let entropy = miner.entropy().map_err(RecoveryError::chain)?;
    let ticket = chain
        .randomness_from_tickets(
            DomainSeparationTag::SealRandomness,
            precommit.seal_rand_epoch,
            &entropy,
            &tipset.key,
        )
        .await
        .map_err(RecoveryError::chain)?;

    let descriptor = SectorDescriptor {
        sector_number: sector,
        seal_proof: precommit.seal_proof,
        sealed_cid: precommit.sealed_cid,
        seal_rand_epoch: precommit.seal_rand_epoch,
        reference_epoch: tipset.height,
    };
    Ok((ticket, descriptor))
}

async fn tipset_at(
    chain: &dyn ChainStateReader,
    height: ChainEpoch,
    from: &TipsetKey,
) -> Result<Tipset, RecoveryError> {
    chain
        .tipset_by_height(height, from)
        .await
        .map_err(RecoveryError::chain)?
        .ok_or_else(|| RecoveryError::NotFound(format!("tipset at height {height}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{SectorOnChainInfo, SectorPreCommitInfo};
    use async_trait::async_trait;
    use fvm_shared::address::Address;
    use std::sync::Mutex;

    const PROOF: RegisteredSealProof = RegisteredSealProof::StackedDRG32GiBV1P1;

    /// Fake chain with one sector, optionally proven, recording which
    /// heights and randomness epochs were requested.
    struct FakeChain {
        sector: SectorNumber,
        proven: Option<SectorOnChainInfo>,
        precommit: SectorPreCommitInfo,
        requested_heights: Mutex<Vec<ChainEpoch>>,
        randomness_calls: Mutex<Vec<(ChainEpoch, Vec<u8>, TipsetKey)>>,
    }

    impl FakeChain {
        fn new(proven: bool) -> Self {
            let sector = 7;
            FakeChain {
                sector,
                proven: proven.then(|| SectorOnChainInfo {
                    sector_number: sector,
                    seal_proof: PROOF,
                    sealed_cid: Cid::default(),
                    activation: 1000,
                }),
                precommit: SectorPreCommitInfo {
                    sector_number: sector,
                    seal_proof: PROOF,
                    sealed_cid: Cid::default(),
                    seal_rand_epoch: 900,
                    precommit_epoch: 950,
                },
                requested_heights: Mutex::new(vec![]),
                randomness_calls: Mutex::new(vec![]),
            }
        }

        fn key_for(height: ChainEpoch) -> TipsetKey {
            // A distinct, deterministic key per height.
            let mh = multihash_codetable::MultihashDigest::digest(
                &multihash_codetable::Code::Sha2_256,
                &height.to_be_bytes(),
            );
            TipsetKey(vec![Cid::new_v1(fvm_ipld_encoding::DAG_CBOR, mh)])
        }
    }

    #[async_trait]
    impl ChainStateReader for FakeChain {
        async fn sector_info(
            &self,
            _miner: &Address,
            sector: SectorNumber,
            _tipset: &TipsetKey,
        ) -> anyhow::Result<Option<SectorOnChainInfo>> {
            Ok(self.proven.clone().filter(|_| sector == self.sector))
        }

        async fn sector_precommit_info(
            &self,
            _miner: &Address,
            sector: SectorNumber,
            _tipset: &TipsetKey,
        ) -> anyhow::Result<Option<SectorPreCommitInfo>> {
            Ok((sector == self.sector).then(|| self.precommit.clone()))
        }

        async fn miner_sector_size(
            &self,
            _miner: &Address,
            _tipset: &TipsetKey,
        ) -> anyhow::Result<u64> {
            Ok(32 << 30)
        }

        async fn tipset_by_height(
            &self,
            height: ChainEpoch,
            _tipset: &TipsetKey,
        ) -> anyhow::Result<Option<Tipset>> {
            self.requested_heights.lock().unwrap().push(height);
            Ok(Some(Tipset {
                key: Self::key_for(height),
                height,
            }))
        }

        async fn randomness_from_tickets(
            &self,
            tag: DomainSeparationTag,
            epoch: ChainEpoch,
            entropy: &[u8],
            tipset: &TipsetKey,
        ) -> anyhow::Result<Randomness> {
            assert_eq!(tag, DomainSeparationTag::SealRandomness);
            self.randomness_calls
                .lock()
                .unwrap()
                .push((epoch, entropy.to_vec(), tipset.clone()));
            // Deterministic function of all inputs.
            let mut bytes = epoch.to_be_bytes().to_vec();
            bytes.extend_from_slice(entropy);
            for cid in &tipset.0 {
                bytes.extend_from_slice(&cid.to_bytes());
            }
            Ok(Randomness(bytes))
        }
    }

    fn miner() -> MinerIdentity {
        "f01000".parse().unwrap()
    }

    #[tokio::test]
    async fn proven_sector_uses_activation_epoch_tipset() {
        let chain = FakeChain::new(true);
        let (_, descriptor) = resolve_ticket(&chain, &miner(), 7).await.unwrap();

        assert_eq!(*chain.requested_heights.lock().unwrap(), vec![1000]);
        assert_eq!(descriptor.reference_epoch, 1000);
        // Randomness is still drawn at the pre-commitment's randomness
        // epoch, evaluated at the activation tipset.
        let calls = chain.randomness_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, 900);
        assert_eq!(calls[0].2, FakeChain::key_for(1000));
    }

    #[tokio::test]
    async fn unproven_sector_falls_back_to_precommit_epoch_tipset() {
        let chain = FakeChain::new(false);
        let (_, descriptor) = resolve_ticket(&chain, &miner(), 7).await.unwrap();

        assert_eq!(*chain.requested_heights.lock().unwrap(), vec![950]);
        assert_eq!(descriptor.reference_epoch, 950);
        let calls = chain.randomness_calls.lock().unwrap();
        assert_eq!(calls[0].0, 900);
        assert_eq!(calls[0].2, FakeChain::key_for(950));
    }

    #[tokio::test]
    async fn entropy_is_the_cbor_miner_address() {
        let chain = FakeChain::new(true);
        resolve_ticket(&chain, &miner(), 7).await.unwrap();
        let calls = chain.randomness_calls.lock().unwrap();
        assert_eq!(calls[0].1, miner().entropy().unwrap());
    }

    #[tokio::test]
    async fn resolution_is_deterministic() {
        let chain = FakeChain::new(true);
        let first = resolve_ticket(&chain, &miner(), 7).await.unwrap();
        let second = resolve_ticket(&chain, &miner(), 7).await.unwrap();
        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }

    #[tokio::test]
    async fn unknown_sector_is_not_found() {
        let chain = FakeChain::new(false);
        let err = resolve_ticket(&chain, &miner(), 99).await.unwrap_err();
        assert!(matches!(err, RecoveryError::NotFound(_)), "{err}");
    }

    /// Chain transport failures must surface as lookup errors, not as a
    /// missing record.
    struct BrokenChain;

    #[async_trait]
    impl ChainStateReader for BrokenChain {
        async fn sector_info(
            &self,
            _miner: &Address,
            _sector: SectorNumber,
            _tipset: &TipsetKey,
        ) -> anyhow::Result<Option<SectorOnChainInfo>> {
            anyhow::bail!("connection refused")
        }

        async fn sector_precommit_info(
            &self,
            _miner: &Address,
            _sector: SectorNumber,
            _tipset: &TipsetKey,
        ) -> anyhow::Result<Option<SectorPreCommitInfo>> {
            anyhow::bail!("connection refused")
        }

        async fn miner_sector_size(
            &self,
            _miner: &Address,
            _tipset: &TipsetKey,
        ) -> anyhow::Result<u64> {
            anyhow::bail!("connection refused")
        }

        async fn tipset_by_height(
            &self,
            _height: ChainEpoch,
            _tipset: &TipsetKey,
        ) -> anyhow::Result<Option<Tipset>> {
            anyhow::bail!("connection refused")
        }

        async fn randomness_from_tickets(
            &self,
            _tag: DomainSeparationTag,
            _epoch: ChainEpoch,
            _entropy: &[u8],
            _tipset: &TipsetKey,
        ) -> anyhow::Result<Randomness> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn chain_failure_is_a_lookup_error() {
        let err = resolve_ticket(&BrokenChain, &miner(), 7).await.unwrap_err();
        assert!(matches!(err, RecoveryError::ChainLookup(_)), "{err}");
    }
}
