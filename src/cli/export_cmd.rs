// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::metadata::{RecoveryMetadata, expand_tilde, export_from_chain};
use crate::miner::MinerIdentity;
use anyhow::{Context as _, bail};
use fvm_shared::sector::SectorNumber;
use std::path::{Path, PathBuf};

#[derive(Debug, clap::Args)]
pub struct ExportCommand {
    /// Miner address, e.g. f01000
    #[arg(long)]
    miner: MinerIdentity,

    /// JSON file holding an array of sector numbers to export. Overrides
    /// the positional sector list.
    #[arg(long)]
    sectors_metadata: Option<PathBuf>,

    /// Full-node API endpoint as `token:multiaddr`. Defaults to the
    /// `FULLNODE_API_INFO` environment variable.
    #[arg(long)]
    api: Option<String>,

    /// Output path. Defaults to `sectors-recovery-<miner>.json` in the
    /// current directory.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Sector numbers to export
    sectors: Vec<SectorNumber>,
}

impl ExportCommand {
    pub async fn run(self) -> anyhow::Result<()> {
        let sectors = match &self.sectors_metadata {
            Some(path) => read_sector_list(path)?,
            None => self.sectors.clone(),
        };
        if sectors.is_empty() {
            bail!("at least one sector must be specified");
        }

        let chain = super::connect(&self.api)?;
        let metadata = export_from_chain(&chain, self.miner, &sectors).await?;

        let output = self
            .output
            .unwrap_or_else(|| RecoveryMetadata::default_path(&self.miner));
        metadata.save(&output)?;
        Ok(())
    }
}

fn read_sector_list(path: &Path) -> anyhow::Result<Vec<SectorNumber>> {
    let path = expand_tilde(path);
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading sector list {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing sector list {}", path.display()))
}
