// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Recovery of lost sealed Filecoin sectors.
//!
//! A sealed sector is a deterministic function of the miner identity, the
//! sector number, the seal proof type and the sealing randomness ("ticket")
//! drawn from the chain at pre-commit time. When the sealed files are lost
//! but the commitment is still recorded on-chain, the sector can be rebuilt
//! bit-for-bit by replaying the sealing pipeline with the historical inputs.
//!
//! This crate resolves those inputs from chain state ([`chain`]), drives the
//! per-sector sealing pipelines under the resource constraints the proofs
//! computation imposes ([`recovery`]), and verifies the regenerated sealed
//! commitment against the one recorded on-chain before moving the artifacts
//! into place.

pub mod chain;
pub mod cli;
pub mod error;
pub mod json;
pub mod metadata;
pub mod miner;
pub mod recovery;
pub mod sealing;
