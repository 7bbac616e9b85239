// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Drives one sector through the sealing phases: null piece, phase 1,
//! phase 2 under the exclusive lock, commitment verification, relocation.
//! Every failure is captured here and terminates this sector only.

use super::gate::{AdmissionGate, ExclusivePhase};
use super::storage::{self, RelocationPolicy};
use crate::error::RecoveryError;
use crate::sealing::{SectorPaths, SectorRef, Sealer};
use anyhow::Context as _;
use fvm_shared::{piece::UnpaddedPieceSize, randomness::Randomness};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One sector's execution context. Owned exclusively by the worker
/// processing the sector; nothing here is shared.
pub struct PipelineJob {
    pub sector: SectorRef,
    pub ticket: Randomness,
    pub expected_sealed_cid: cid::Cid,
    pub piece_size: UnpaddedPieceSize,
}

pub struct PipelineExecutor {
    sealer: Arc<dyn Sealer>,
    gate: Arc<AdmissionGate>,
    exclusive: Arc<ExclusivePhase>,
    scratch_root: PathBuf,
    result_root: PathBuf,
    relocation: RelocationPolicy,
}

impl PipelineExecutor {
    pub fn new(
        sealer: Arc<dyn Sealer>,
        gate: Arc<AdmissionGate>,
        exclusive: Arc<ExclusivePhase>,
        scratch_root: PathBuf,
        result_root: PathBuf,
        relocation: RelocationPolicy,
    ) -> Self {
        PipelineExecutor {
            sealer,
            gate,
            exclusive,
            scratch_root,
            result_root,
            relocation,
        }
    }

    /// Runs the whole pipeline for one sector. The scratch directory is
    /// removed when this returns, whatever the outcome; on success the
    /// artifacts have been moved out of it first.
    pub async fn run(&self, job: &PipelineJob, cancel: &CancellationToken) -> Result<(), RecoveryError> {
        let sector = job.sector;
        info!(
            sector = %sector,
            proof = ?sector.proof,
            ticket = %hex::encode(&job.ticket.0),
            "starting sector recovery",
        );

        std::fs::create_dir_all(&self.scratch_root)
            .with_context(|| format!("creating {}", self.scratch_root.display()))
            .map_err(RecoveryError::filesystem)?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("recover-{}-", sector.number))
            .tempdir_in(&self.scratch_root)
            .context("creating sector scratch directory")
            .map_err(RecoveryError::filesystem)?;
        let paths = SectorPaths::create(scratch.path(), &sector)
            .context("creating sector working directories")
            .map_err(RecoveryError::filesystem)?;

        if cancel.is_cancelled() {
            return Err(RecoveryError::Cancelled);
        }
        debug!(sector = %sector, "adding null piece");
        let piece = self
            .sealer
            .add_piece(&sector, &paths, job.piece_size)
            .await
            .map_err(RecoveryError::sealing)?;

        if cancel.is_cancelled() {
            return Err(RecoveryError::Cancelled);
        }
        self.gate.pace_phase1().await;
        info!(sector = %sector, "starting phase 1");
        let phase1 = self
            .sealer
            .seal_pre_commit1(&sector, &paths, &job.ticket, &[piece])
            .await
            .map_err(RecoveryError::sealing)?;
        info!(sector = %sector, "phase 1 complete");

        if cancel.is_cancelled() {
            return Err(RecoveryError::Cancelled);
        }
        let commitments = {
            let _exclusive = self.exclusive.acquire().await;
            info!(sector = %sector, "starting phase 2");
            self.sealer
                .seal_pre_commit2(&sector, &paths, phase1)
                .await
                .map_err(RecoveryError::sealing)?
            // The lock drops here, before verification and relocation.
        };
        info!(sector = %sector, "phase 2 complete");

        if commitments.sealed_cid != job.expected_sealed_cid {
            return Err(RecoveryError::CommitmentMismatch {
                on_chain: job.expected_sealed_cid,
                computed: commitments.sealed_cid,
            });
        }

        if cancel.is_cancelled() {
            return Err(RecoveryError::Cancelled);
        }
        let result_root = self.result_root.clone();
        let relocation = self.relocation;
        let scratch_path = scratch.path().to_path_buf();
        task::spawn_blocking(move || storage::relocate(&sector, &scratch_path, &result_root, relocation))
            .await
            .map_err(|e| RecoveryError::filesystem(anyhow::anyhow!("relocation task failed: {e}")))??;

        info!(sector = %sector, "sector recovered");
        Ok(())
    }
}
