// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::chain::ChainStateReader;
use crate::metadata::{RecoveryMetadata, expand_tilde};
use crate::miner::MinerIdentity;
use crate::recovery::{RecoveryReport, RecoverySettings, RelocationPolicy, recover_from_metadata};
use anyhow::bail;
use fvm_shared::sector::SectorNumber;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, clap::Args)]
pub struct RecoverCommand {
    /// Metadata file with previously exported sealing inputs. Without it,
    /// inputs are resolved live from the chain, which requires `--miner`
    /// and an API endpoint.
    #[arg(long, alias = "sectors-recovery-metadata")]
    metadata: Option<PathBuf>,

    /// Miner address, e.g. f01000. Only needed without `--metadata`.
    #[arg(long)]
    miner: Option<MinerIdentity>,

    /// Full-node API endpoint as `token:multiaddr`. Defaults to the
    /// `FULLNODE_API_INFO` environment variable.
    #[arg(long)]
    api: Option<String>,

    /// Number of sectors sealing concurrently
    #[arg(long, default_value = "1")]
    parallel: NonZeroUsize,

    /// Minimum delay between two phase-1 starts
    #[arg(long, default_value = "10m", value_parser = humantime::parse_duration)]
    phase1_spacing: Duration,

    /// Where recovered sector files end up
    #[arg(long, default_value = "~/sector")]
    sealing_result: PathBuf,

    /// Scratch space for in-flight sealing artifacts
    #[arg(long, default_value = "~/temp")]
    sealing_temp: PathBuf,

    /// Treat a failed cache-directory move as a sector failure instead of
    /// a warning
    #[arg(long)]
    strict_cache_move: bool,

    /// Sector numbers to recover
    #[arg(required = true)]
    sectors: Vec<SectorNumber>,
}

impl RecoverCommand {
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        info!("starting sealer recovery");
        let sealer = super::build_sealer()?;
        let settings = RecoverySettings {
            parallel: self.parallel,
            phase1_spacing: self.phase1_spacing,
            scratch_root: expand_tilde(&self.sealing_temp),
            result_root: expand_tilde(&self.sealing_result),
            relocation: RelocationPolicy {
                cache_move_fatal: self.strict_cache_move,
            },
        };

        let report = match &self.metadata {
            Some(path) => {
                let metadata = RecoveryMetadata::load(path)?;
                let (run, skipped) = metadata.select_sectors(&self.sectors);
                if !run.is_empty() {
                    info!("recovering sectors {run:?}, {} in total", run.len());
                }
                if !skipped.is_empty() {
                    warn!(
                        "skipping sectors {skipped:?}, {} in total, not present in the metadata file",
                        skipped.len()
                    );
                }
                recover_from_metadata(sealer, &metadata, &self.sectors, &settings, cancel).await
            }
            None => {
                let Some(miner) = self.miner else {
                    bail!("either --metadata or --miner must be given");
                };
                let chain: Arc<dyn ChainStateReader> = Arc::new(super::connect(&self.api)?);
                crate::recovery::recover_from_chain(
                    chain,
                    sealer,
                    miner,
                    &self.sectors,
                    &settings,
                    cancel,
                )
                .await?
            }
        };

        report.log_summary();
        finish(&report)
    }
}

fn finish(report: &RecoveryReport) -> anyhow::Result<()> {
    match report.failed() {
        0 => Ok(()),
        failed => bail!("{failed} sectors failed to recover"),
    }
}
