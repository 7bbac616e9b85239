// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod export_cmd;
pub mod recover_cmd;

use crate::chain::rpc::{ApiInfo, LotusChain};
use crate::sealing::Sealer;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Command-line options for the `sealer-recovery` binary
#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"), version = env!("CARGO_PKG_VERSION"), about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Subcommand,
}

/// sealer-recovery sub-commands
#[derive(clap::Subcommand)]
pub enum Subcommand {
    /// Re-seal lost sectors and verify them against their on-chain commitments
    Recover(recover_cmd::RecoverCommand),

    /// Export per-sector sealing inputs to a metadata file for later recovery
    Export(export_cmd::ExportCommand),
}

impl Subcommand {
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        match self {
            Subcommand::Recover(cmd) => cmd.run(cancel).await,
            Subcommand::Export(cmd) => cmd.run().await,
        }
    }
}

/// Resolves the full-node endpoint from `--api` or `FULLNODE_API_INFO`.
fn connect(api: &Option<String>) -> anyhow::Result<LotusChain> {
    let info = match api {
        Some(raw) => raw.parse::<ApiInfo>()?,
        None => ApiInfo::from_env()?,
    };
    LotusChain::connect(&info)
}

#[cfg(feature = "proofs")]
fn build_sealer() -> anyhow::Result<Arc<dyn Sealer>> {
    Ok(Arc::new(crate::sealing::proofs::ProofsSealer::new()))
}

#[cfg(not(feature = "proofs"))]
fn build_sealer() -> anyhow::Result<Arc<dyn Sealer>> {
    anyhow::bail!(
        "this binary was built without the sealing backend; recompile with `--features proofs`"
    )
}
