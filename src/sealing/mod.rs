// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Boundary with the sealing computation: the three pipeline operations the
//! recovery engine drives, the lotus on-disk sector layout they work in,
//! and the null-piece reader recovery feeds them.

pub mod commcid;
#[cfg(feature = "proofs")]
pub mod proofs;

use async_trait::async_trait;
use cid::Cid;
use fvm_shared::{
    ActorID,
    piece::{PieceInfo, UnpaddedPieceSize},
    randomness::Randomness,
    sector::{RegisteredSealProof, SectorNumber},
};
use std::{
    fmt, io,
    path::{Path, PathBuf},
};

/// A sector reference: everything the sealing computation needs to identify
/// the sector it is working on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectorRef {
    pub miner: ActorID,
    pub number: SectorNumber,
    pub proof: RegisteredSealProof,
}

impl SectorRef {
    /// The lotus on-disk name of this sector, `s-t0<miner>-<number>`.
    pub fn storage_name(&self) -> String {
        format!("s-t0{}-{}", self.miner, self.number)
    }
}

impl fmt::Display for SectorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_name())
    }
}

/// Per-sector paths in the lotus `basicfs` layout under one root:
/// `unsealed/<name>` and `sealed/<name>` files, `cache/<name>/` directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectorPaths {
    pub unsealed: PathBuf,
    pub cache: PathBuf,
    pub sealed: PathBuf,
}

impl SectorPaths {
    pub fn new(root: &Path, sector: &SectorRef) -> Self {
        let name = sector.storage_name();
        SectorPaths {
            unsealed: root.join("unsealed").join(&name),
            cache: root.join("cache").join(&name),
            sealed: root.join("sealed").join(&name),
        }
    }

    /// Creates the directory structure the sealing computation expects.
    pub fn create(root: &Path, sector: &SectorRef) -> io::Result<Self> {
        let paths = Self::new(root, sector);
        for parent in [&paths.unsealed, &paths.sealed] {
            if let Some(dir) = parent.parent() {
                std::fs::create_dir_all(dir)?;
            }
        }
        std::fs::create_dir_all(&paths.cache)?;
        Ok(paths)
    }
}

/// Opaque output of phase 1, handed unchanged to phase 2.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Phase1Output(pub Vec<u8>);

/// Commitments produced by phase 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SealCommitments {
    pub sealed_cid: Cid,
    pub unsealed_cid: Cid,
}

/// The sealing computation. One implementation wraps the real proofs stack
/// (`proofs` feature); tests substitute instrumented fakes.
///
/// Phase 1 is memory- and CPU-heavy and may run for several sectors at once;
/// phase 2 is exclusive on the GPU and the caller serializes it globally.
#[async_trait]
pub trait Sealer: Send + Sync {
    /// Writes one piece of zero-filled data of `piece_size` into the
    /// sector's unsealed file and returns its piece info.
    async fn add_piece(
        &self,
        sector: &SectorRef,
        paths: &SectorPaths,
        piece_size: UnpaddedPieceSize,
    ) -> anyhow::Result<PieceInfo>;

    async fn seal_pre_commit1(
        &self,
        sector: &SectorRef,
        paths: &SectorPaths,
        ticket: &Randomness,
        pieces: &[PieceInfo],
    ) -> anyhow::Result<Phase1Output>;

    async fn seal_pre_commit2(
        &self,
        sector: &SectorRef,
        paths: &SectorPaths,
        phase1: Phase1Output,
    ) -> anyhow::Result<SealCommitments>;
}

/// An `io::Read` of zero bytes, used to synthesize the null piece: recovery
/// never re-ingests user data, it only reproduces the deterministic padding
/// sector shape.
pub struct NullReader {
    remaining: u64,
}

impl NullReader {
    pub fn new(size: UnpaddedPieceSize) -> Self {
        NullReader { remaining: size.0 }
    }
}

impl io::Read for NullReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        buf[..n].fill(0);
        self.remaining -= n as u64;
        Ok(n)
    }
}
