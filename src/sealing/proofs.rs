// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The real sealing computation, over `filecoin-proofs-api`. Compiled only
//! with the `proofs` feature: the proofs stack is a heavy native build that
//! is only needed on the machine performing the recovery.

use super::{NullReader, Phase1Output, SealCommitments, SectorPaths, SectorRef, Sealer, commcid};
use anyhow::{Context as _, anyhow, bail, ensure};
use async_trait::async_trait;
use filecoin_proofs_api::{
    ProverId, RegisteredSealProof as ApiSealProof, SectorId, Ticket, UnpaddedBytesAmount, seal,
};
use fvm_shared::{
    address::Address,
    piece::{PieceInfo, UnpaddedPieceSize},
    randomness::Randomness,
    sector::RegisteredSealProof,
};
use std::fs::OpenOptions;
use tokio::task;

/// [`Sealer`] backed by the proofs stack. Stateless; all sector state lives
/// in the working directory.
pub struct ProofsSealer;

impl ProofsSealer {
    pub fn new() -> Self {
        ProofsSealer
    }
}

impl Default for ProofsSealer {
    fn default() -> Self {
        Self::new()
    }
}

fn api_seal_proof(proof: RegisteredSealProof) -> anyhow::Result<ApiSealProof> {
    use RegisteredSealProof::*;
    Ok(match proof {
        StackedDRG2KiBV1 => ApiSealProof::StackedDrg2KiBV1,
        StackedDRG8MiBV1 => ApiSealProof::StackedDrg8MiBV1,
        StackedDRG512MiBV1 => ApiSealProof::StackedDrg512MiBV1,
        StackedDRG32GiBV1 => ApiSealProof::StackedDrg32GiBV1,
        StackedDRG64GiBV1 => ApiSealProof::StackedDrg64GiBV1,
        StackedDRG2KiBV1P1 => ApiSealProof::StackedDrg2KiBV1_1,
        StackedDRG8MiBV1P1 => ApiSealProof::StackedDrg8MiBV1_1,
        StackedDRG512MiBV1P1 => ApiSealProof::StackedDrg512MiBV1_1,
        StackedDRG32GiBV1P1 => ApiSealProof::StackedDrg32GiBV1_1,
        StackedDRG64GiBV1P1 => ApiSealProof::StackedDrg64GiBV1_1,
        other => bail!("unsupported seal proof type {other:?}"),
    })
}

/// Prover ID as lotus derives it: the payload bytes of the miner's ID
/// address, zero-padded to 32 bytes.
fn prover_id(sector: &SectorRef) -> ProverId {
    let payload = Address::new_id(sector.miner).payload_bytes();
    let mut id: ProverId = [0; 32];
    id[..payload.len()].copy_from_slice(&payload);
    id
}

fn ticket_bytes(ticket: &Randomness) -> anyhow::Result<Ticket> {
    ensure!(
        ticket.0.len() == 32,
        "sealing ticket must be 32 bytes, got {}",
        ticket.0.len()
    );
    let mut bytes: Ticket = [0; 32];
    bytes.copy_from_slice(&ticket.0);
    Ok(bytes)
}

fn api_piece(piece: &PieceInfo) -> anyhow::Result<filecoin_proofs_api::PieceInfo> {
    Ok(filecoin_proofs_api::PieceInfo {
        commitment: commcid::cid_to_data_commitment(&piece.cid)?,
        size: UnpaddedBytesAmount(piece.size.unpadded().0),
    })
}

#[async_trait]
impl Sealer for ProofsSealer {
    async fn add_piece(
        &self,
        sector: &SectorRef,
        paths: &SectorPaths,
        piece_size: UnpaddedPieceSize,
    ) -> anyhow::Result<PieceInfo> {
        let proof = api_seal_proof(sector.proof)?;
        let unsealed = paths.unsealed.clone();
        task::spawn_blocking(move || {
            let staged = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&unsealed)
                .with_context(|| format!("creating {}", unsealed.display()))?;
            let (piece, _) = seal::add_piece(
                proof,
                NullReader::new(piece_size),
                staged,
                UnpaddedBytesAmount(piece_size.0),
                &[],
            )?;
            Ok(PieceInfo {
                size: UnpaddedPieceSize(piece.size.0).padded(),
                cid: commcid::data_commitment_to_cid(&piece.commitment),
            })
        })
        .await
        .map_err(|e| anyhow!("add piece task failed: {e}"))?
    }

    async fn seal_pre_commit1(
        &self,
        sector: &SectorRef,
        paths: &SectorPaths,
        ticket: &Randomness,
        pieces: &[PieceInfo],
    ) -> anyhow::Result<Phase1Output> {
        let proof = api_seal_proof(sector.proof)?;
        let prover = prover_id(sector);
        let ticket = ticket_bytes(ticket)?;
        let pieces = pieces.iter().map(api_piece).collect::<anyhow::Result<Vec<_>>>()?;
        let sector_id = SectorId::from(sector.number);
        let paths = paths.clone();
        task::spawn_blocking(move || {
            let out = seal::seal_pre_commit_phase1(
                proof,
                &paths.cache,
                &paths.unsealed,
                &paths.sealed,
                prover,
                sector_id,
                ticket,
                &pieces,
            )?;
            Ok(Phase1Output(serde_json::to_vec(&out)?))
        })
        .await
        .map_err(|e| anyhow!("phase 1 task failed: {e}"))?
    }

    async fn seal_pre_commit2(
        &self,
        _sector: &SectorRef,
        paths: &SectorPaths,
        phase1: Phase1Output,
    ) -> anyhow::Result<SealCommitments> {
        let out = serde_json::from_slice(&phase1.0).context("decoding phase 1 output")?;
        let paths = paths.clone();
        task::spawn_blocking(move || {
            let out = seal::seal_pre_commit_phase2(out, &paths.cache, &paths.sealed)?;
            Ok(SealCommitments {
                sealed_cid: commcid::replica_commitment_to_cid(&out.comm_r),
                unsealed_cid: commcid::data_commitment_to_cid(&out.comm_d),
            })
        })
        .await
        .map_err(|e| anyhow!("phase 2 task failed: {e}"))?
    }
}
