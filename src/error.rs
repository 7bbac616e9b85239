// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use thiserror::Error;

/// Errors raised while recovering a single sector.
///
/// Every variant is terminal for the sector it occurred in: the pipeline is
/// deterministic, so a retry within the same run would fail the same way.
/// None of these abort the batch; they are captured at the pipeline boundary
/// and recorded in the sector's outcome.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// The chain-state collaborator errored while answering a query.
    #[error("chain lookup failed: {0:#}")]
    ChainLookup(anyhow::Error),
    /// A chain record that must exist for this sector is absent.
    #[error("{0} not found on chain")]
    NotFound(String),
    /// Opaque failure reported by the sealing computation.
    #[error("sealing computation failed: {0:#}")]
    Sealing(anyhow::Error),
    /// The recomputed sealed commitment disagrees with the on-chain record.
    /// This means the resolved randomness or proof type was wrong upstream,
    /// never a transient fault.
    #[error("sealed commitment mismatch (on-chain: {on_chain}, recomputed: {computed})")]
    CommitmentMismatch { on_chain: Cid, computed: Cid },
    /// Scratch or result path operation failed.
    #[error("filesystem operation failed: {0:#}")]
    Filesystem(anyhow::Error),
    /// The run was cancelled before this sector finished.
    #[error("recovery cancelled")]
    Cancelled,
}

impl RecoveryError {
    pub fn chain(err: impl Into<anyhow::Error>) -> Self {
        Self::ChainLookup(err.into())
    }

    pub fn sealing(err: impl Into<anyhow::Error>) -> Self {
        Self::Sealing(err.into())
    }

    pub fn filesystem(err: impl Into<anyhow::Error>) -> Self {
        Self::Filesystem(err.into())
    }
}
