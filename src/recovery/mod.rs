// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The recovery coordinator: fans sectors out to pipeline workers through
//! the admission gate, collects per-sector outcomes and reports a summary.
//! One sector's failure never aborts its siblings.

mod gate;
mod pipeline;
mod storage;

pub use gate::{AdmissionGate, ExclusivePhase};
pub use pipeline::{PipelineExecutor, PipelineJob};
pub use storage::{RelocationPolicy, relocate};

use crate::chain::{ChainStateReader, TipsetKey, resolve_ticket};
use crate::error::RecoveryError;
use crate::metadata::RecoveryMetadata;
use crate::miner::MinerIdentity;
use crate::sealing::{Sealer, SectorRef};
use anyhow::Context as _;
use futures::future::join_all;
use fvm_shared::{piece::PaddedPieceSize, sector::SectorNumber};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Terminal state of one sector within a run. Recorded once, never mutated.
#[derive(Debug)]
pub enum SectorOutcome {
    Succeeded,
    Failed(RecoveryError),
    Skipped(String),
}

/// Outcome of a whole recovery run, in dispatch order.
#[derive(Debug)]
pub struct RecoveryReport {
    pub outcomes: Vec<(SectorNumber, SectorOutcome)>,
    pub elapsed: Duration,
}

impl RecoveryReport {
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, SectorOutcome::Succeeded))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SectorOutcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SectorOutcome::Skipped(_)))
    }

    fn count(&self, pred: impl Fn(&SectorOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }

    /// Logs the per-sector outcomes and the summary line every run ends
    /// with, even when every sector failed.
    pub fn log_summary(&self) {
        for (sector, outcome) in &self.outcomes {
            match outcome {
                SectorOutcome::Succeeded => info!("sector {sector}: recovered"),
                SectorOutcome::Failed(err) => error!("sector {sector}: {err}"),
                SectorOutcome::Skipped(reason) => warn!("sector {sector}: skipped, {reason}"),
            }
        }
        info!(
            "recovery finished: {} succeeded, {} failed, {} skipped, elapsed {}",
            self.succeeded(),
            self.failed(),
            self.skipped(),
            humantime::format_duration(Duration::from_secs(self.elapsed.as_secs())),
        );
    }
}

/// Run-wide configuration, owned by the caller.
#[derive(Clone, Debug)]
pub struct RecoverySettings {
    pub parallel: NonZeroUsize,
    /// Minimum spacing between phase-1 starts across all pipelines.
    pub phase1_spacing: Duration,
    pub scratch_root: PathBuf,
    pub result_root: PathBuf,
    pub relocation: RelocationPolicy,
}

struct Batch {
    executor: Arc<PipelineExecutor>,
    gate: Arc<AdmissionGate>,
}

impl Batch {
    fn new(sealer: Arc<dyn Sealer>, settings: &RecoverySettings) -> Self {
        let gate = Arc::new(AdmissionGate::new(
            settings.parallel.get(),
            settings.phase1_spacing,
        ));
        let executor = Arc::new(PipelineExecutor::new(
            sealer,
            Arc::clone(&gate),
            Arc::new(ExclusivePhase::new()),
            settings.scratch_root.clone(),
            settings.result_root.clone(),
            settings.relocation,
        ));
        Batch { executor, gate }
    }
}

/// Recovers sectors whose sealing inputs were previously exported into a
/// metadata document. Sectors requested but absent from the metadata are
/// reported as skipped.
pub async fn recover_from_metadata(
    sealer: Arc<dyn Sealer>,
    metadata: &RecoveryMetadata,
    requested: &[SectorNumber],
    settings: &RecoverySettings,
    cancel: CancellationToken,
) -> RecoveryReport {
    let started = Instant::now();
    let batch = Batch::new(sealer, settings);
    let piece_size = PaddedPieceSize(metadata.sector_size).unpadded();
    let miner = metadata.miner;

    let mut dispatch_order = vec![];
    let mut handles = vec![];
    for &number in requested {
        let Some(record) = metadata.sector(number) else {
            dispatch_order.push((number, None));
            continue;
        };
        let job = PipelineJob {
            sector: SectorRef {
                miner: miner.id(),
                number,
                proof: record.seal_proof,
            },
            ticket: record.ticket.clone(),
            expected_sealed_cid: record.sealed_cid,
            piece_size,
        };
        let executor = Arc::clone(&batch.executor);
        let gate = Arc::clone(&batch.gate);
        let cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let _slot = gate.acquire_slot().await;
            executor.run(&job, &cancel).await
        });
        dispatch_order.push((number, Some(handles.len())));
        handles.push(handle);
    }

    let mut results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(join_outcome)
        .collect();

    let outcomes = dispatch_order
        .into_iter()
        .map(|(number, slot)| match slot {
            Some(index) => (
                number,
                std::mem::replace(
                    &mut results[index],
                    SectorOutcome::Skipped(String::new()),
                ),
            ),
            None => (
                number,
                SectorOutcome::Skipped("not present in the recovery metadata".into()),
            ),
        })
        .collect();

    RecoveryReport {
        outcomes,
        elapsed: started.elapsed(),
    }
}

/// Recovers sectors by resolving their sealing inputs live from chain
/// state. Batch-wide setup (the miner's sector size) is fatal; everything
/// after that is per-sector.
pub async fn recover_from_chain(
    chain: Arc<dyn ChainStateReader>,
    sealer: Arc<dyn Sealer>,
    miner: MinerIdentity,
    requested: &[SectorNumber],
    settings: &RecoverySettings,
    cancel: CancellationToken,
) -> anyhow::Result<RecoveryReport> {
    let started = Instant::now();
    let sector_size = chain
        .miner_sector_size(miner.address(), &TipsetKey::head())
        .await
        .context("looking up miner sector size")?;
    let piece_size = PaddedPieceSize(sector_size).unpadded();
    let batch = Batch::new(sealer, settings);

    let mut handles = vec![];
    for &number in requested {
        let executor = Arc::clone(&batch.executor);
        let gate = Arc::clone(&batch.gate);
        let chain = Arc::clone(&chain);
        let cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let _slot = gate.acquire_slot().await;
            let (ticket, descriptor) = resolve_ticket(chain.as_ref(), &miner, number).await?;
            let job = PipelineJob {
                sector: SectorRef {
                    miner: miner.id(),
                    number,
                    proof: descriptor.seal_proof,
                },
                ticket,
                expected_sealed_cid: descriptor.sealed_cid,
                piece_size,
            };
            executor.run(&job, &cancel).await
        });
        handles.push((number, handle));
    }

    let (numbers, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
    let outcomes = numbers
        .into_iter()
        .zip(join_all(handles).await.into_iter().map(join_outcome))
        .collect();

    Ok(RecoveryReport {
        outcomes,
        elapsed: started.elapsed(),
    })
}

fn join_outcome(
    joined: Result<Result<(), RecoveryError>, tokio::task::JoinError>,
) -> SectorOutcome {
    match joined {
        Ok(Ok(())) => SectorOutcome::Succeeded,
        Ok(Err(err)) => SectorOutcome::Failed(err),
        Err(join) => SectorOutcome::Failed(RecoveryError::Sealing(anyhow::anyhow!(
            "pipeline worker panicked: {join}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::SectorMetadata;
    use crate::sealing::{Phase1Output, SealCommitments, SectorPaths, commcid};
    use async_trait::async_trait;
    use cid::Cid;
    use fvm_shared::piece::{PieceInfo, UnpaddedPieceSize};
    use fvm_shared::randomness::Randomness;
    use fvm_shared::sector::RegisteredSealProof;

    fn sealed_cid_for(number: u64) -> Cid {
        let mut comm = [0u8; 32];
        comm[..8].copy_from_slice(&number.to_be_bytes());
        commcid::replica_commitment_to_cid(&comm)
    }

    /// Succeeds for every sector except the ones it is told to break.
    struct FakeSealer {
        broken: Vec<SectorNumber>,
    }

    #[async_trait]
    impl Sealer for FakeSealer {
        async fn add_piece(
            &self,
            _sector: &SectorRef,
            _paths: &SectorPaths,
            piece_size: UnpaddedPieceSize,
        ) -> anyhow::Result<PieceInfo> {
            Ok(PieceInfo {
                size: piece_size.padded(),
                cid: commcid::data_commitment_to_cid(&[0xd; 32]),
            })
        }

        async fn seal_pre_commit1(
            &self,
            sector: &SectorRef,
            _paths: &SectorPaths,
            _ticket: &Randomness,
            _pieces: &[PieceInfo],
        ) -> anyhow::Result<Phase1Output> {
            if self.broken.contains(&sector.number) {
                anyhow::bail!("injected failure");
            }
            Ok(Phase1Output(vec![]))
        }

        async fn seal_pre_commit2(
            &self,
            sector: &SectorRef,
            paths: &SectorPaths,
            _phase1: Phase1Output,
        ) -> anyhow::Result<SealCommitments> {
            std::fs::write(&paths.sealed, b"replica")?;
            Ok(SealCommitments {
                sealed_cid: sealed_cid_for(sector.number),
                unsealed_cid: commcid::data_commitment_to_cid(&[0xd; 32]),
            })
        }
    }

    fn metadata(sectors: &[SectorNumber]) -> RecoveryMetadata {
        RecoveryMetadata {
            miner: "f01000".parse().unwrap(),
            sector_size: 2048,
            sectors: sectors
                .iter()
                .map(|&number| SectorMetadata {
                    sector_number: number,
                    reference_epoch: 1000,
                    ticket: Randomness(vec![1u8; 32]),
                    seal_proof: RegisteredSealProof::StackedDRG2KiBV1P1,
                    sealed_cid: sealed_cid_for(number),
                })
                .collect(),
        }
    }

    fn settings(scratch: &tempfile::TempDir, result: &tempfile::TempDir) -> RecoverySettings {
        RecoverySettings {
            parallel: NonZeroUsize::new(2).unwrap(),
            phase1_spacing: Duration::ZERO,
            scratch_root: scratch.path().to_path_buf(),
            result_root: result.path().to_path_buf(),
            relocation: RelocationPolicy::default(),
        }
    }

    #[tokio::test]
    async fn requested_sectors_missing_from_metadata_are_skipped() {
        let scratch = tempfile::tempdir().unwrap();
        let result = tempfile::tempdir().unwrap();
        let report = recover_from_metadata(
            Arc::new(FakeSealer { broken: vec![] }),
            &metadata(&[1, 3]),
            &[1, 2, 3, 4],
            &settings(&scratch, &result),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.outcomes.len(), 4);
        // Dispatch order is preserved in the report.
        let numbers: Vec<_> = report.outcomes.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert!(matches!(report.outcomes[1].1, SectorOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let scratch = tempfile::tempdir().unwrap();
        let result = tempfile::tempdir().unwrap();
        let report = recover_from_metadata(
            Arc::new(FakeSealer { broken: vec![2] }),
            &metadata(&[1, 2, 3]),
            &[1, 2, 3],
            &settings(&scratch, &result),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        let (number, outcome) = &report.outcomes[1];
        assert_eq!(*number, 2);
        assert!(matches!(outcome, SectorOutcome::Failed(RecoveryError::Sealing(_))));
    }

    #[tokio::test]
    async fn every_sector_failing_still_produces_a_report() {
        let scratch = tempfile::tempdir().unwrap();
        let result = tempfile::tempdir().unwrap();
        let report = recover_from_metadata(
            Arc::new(FakeSealer { broken: vec![1, 2] }),
            &metadata(&[1, 2]),
            &[1, 2],
            &settings(&scratch, &result),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(report.failed(), 2);
        assert_eq!(report.succeeded(), 0);
        report.log_summary();
    }
}
