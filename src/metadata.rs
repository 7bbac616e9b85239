// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The persisted recovery document: everything needed to re-seal a miner's
//! sectors without a chain connection. The JSON layout is shared with the
//! Go exporter, so field names and encodings must not drift.

use crate::chain::{ChainStateReader, TipsetKey, resolve_ticket};
use crate::json::{cid_lotus, randomness_b64};
use crate::miner::MinerIdentity;
use anyhow::{Context as _, bail};
use cid::Cid;
use fvm_shared::{
    clock::ChainEpoch,
    randomness::Randomness,
    sector::{RegisteredSealProof, SectorNumber},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Sealing inputs for one sector, as exported to JSON. `reference_epoch` is
/// the activation epoch for proven sectors and the pre-commit epoch for
/// unproven ones; it orders the document and anchors tipset walks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorMetadata {
    #[serde(rename = "SectorNumber")]
    pub sector_number: SectorNumber,
    #[serde(rename = "Activation")]
    pub reference_epoch: ChainEpoch,
    #[serde(rename = "Ticket", with = "randomness_b64")]
    pub ticket: Randomness,
    #[serde(rename = "SealProof", with = "seal_proof_i64")]
    pub seal_proof: RegisteredSealProof,
    #[serde(rename = "SealedCID", with = "cid_lotus")]
    pub sealed_cid: Cid,
}

/// The whole document: one miner, its sector size, and the sectors whose
/// tickets were resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryMetadata {
    #[serde(rename = "Miner")]
    pub miner: MinerIdentity,
    #[serde(rename = "SectorSize")]
    pub sector_size: u64,
    #[serde(rename = "SectorInfos")]
    pub sectors: Vec<SectorMetadata>,
}

mod seal_proof_i64 {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        proof: &RegisteredSealProof,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(i64::from(*proof))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<RegisteredSealProof, D::Error> {
        Ok(RegisteredSealProof::from(i64::deserialize(deserializer)?))
    }
}

impl RecoveryMetadata {
    /// Loads and validates a document. The path may start with `~`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let path = expand_tilde(path);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading recovery metadata {}", path.display()))?;
        let metadata: RecoveryMetadata = serde_json::from_str(&raw)
            .with_context(|| format!("parsing recovery metadata {}", path.display()))?;
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let path = expand_tilde(path);
        let raw = serde_json::to_string_pretty(self).context("encoding recovery metadata")?;
        std::fs::write(&path, raw)
            .with_context(|| format!("writing recovery metadata {}", path.display()))?;
        Ok(())
    }

    /// The default export location for a miner, in the current directory.
    pub fn default_path(miner: &MinerIdentity) -> PathBuf {
        PathBuf::from(format!("sectors-recovery-{miner}.json"))
    }

    /// A sector without a ticket cannot be re-sealed, and its presence means
    /// the export it came from was truncated or hand-edited. Reject the
    /// whole document rather than recovering a subset silently.
    pub fn validate(&self) -> anyhow::Result<()> {
        for sector in &self.sectors {
            if sector.ticket.0.is_empty() {
                bail!(
                    "sector {} carries no sealing ticket; re-export the metadata",
                    sector.sector_number
                );
            }
        }
        Ok(())
    }

    pub fn sector(&self, number: SectorNumber) -> Option<&SectorMetadata> {
        self.sectors.iter().find(|s| s.sector_number == number)
    }

    /// Splits `requested` into the sectors present in this document and the
    /// ones that are not.
    pub fn select_sectors(
        &self,
        requested: &[SectorNumber],
    ) -> (Vec<SectorNumber>, Vec<SectorNumber>) {
        requested
            .iter()
            .copied()
            .partition(|&number| self.sector(number).is_some())
    }

    /// Newest activation first, then sector number, matching the exporter's
    /// ordering so walking tipsets backwards stays cheap.
    pub fn sort(&mut self) {
        self.sectors.sort_by(|a, b| {
            b.reference_epoch
                .cmp(&a.reference_epoch)
                .then(a.sector_number.cmp(&b.sector_number))
        });
    }
}

/// Resolves the sealing inputs of `sectors` from chain state and assembles
/// a document. Sectors whose inputs cannot be resolved are logged and left
/// out rather than failing the export.
pub async fn export_from_chain(
    chain: &dyn ChainStateReader,
    miner: MinerIdentity,
    sectors: &[SectorNumber],
) -> anyhow::Result<RecoveryMetadata> {
    let sector_size = chain
        .miner_sector_size(miner.address(), &TipsetKey::head())
        .await
        .context("looking up miner sector size")?;

    let mut metadata = RecoveryMetadata {
        miner,
        sector_size,
        sectors: vec![],
    };
    let mut failed = vec![];
    for &number in sectors {
        match resolve_ticket(chain, &miner, number).await {
            Ok((ticket, descriptor)) => metadata.sectors.push(SectorMetadata {
                sector_number: number,
                reference_epoch: descriptor.reference_epoch,
                ticket,
                seal_proof: descriptor.seal_proof,
                sealed_cid: descriptor.sealed_cid,
            }),
            Err(err) => {
                error!("sector {number}: {err}");
                failed.push(number);
            }
        }
    }
    metadata.sort();
    info!(
        "exported {} sectors, failed sectors: {:?}",
        metadata.sectors.len(),
        failed
    );
    Ok(metadata)
}

/// `~` and `~/...` expansion, as the Go tooling accepts for every path flag.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Some(rest) = path.to_str().and_then(|s| s.strip_prefix('~')) else {
        return path.to_path_buf();
    };
    let Some(dirs) = directories::BaseDirs::new() else {
        return path.to_path_buf();
    };
    let home = dirs.home_dir();
    match rest.strip_prefix('/') {
        Some(tail) => home.join(tail),
        None if rest.is_empty() => home.to_path_buf(),
        None => path.to_path_buf(),
    }
}
