// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Moves a recovered sector's artifacts from scratch space into the result
//! root, pruning everything the final sealed representation supersedes.

use crate::error::RecoveryError;
use crate::sealing::{SectorPaths, SectorRef};
use anyhow::Context as _;
use std::fs;
use std::path::Path;
use tracing::warn;

/// What to do when the cache subtree cannot be moved. The sealed file is the
/// point of the recovery; the cache is expendable, so the historical default
/// is to log and carry on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelocationPolicy {
    pub cache_move_fatal: bool,
}

/// Cache files superseded by the final sealed representation.
fn is_superseded(name: &str) -> bool {
    name.contains("layer") || name.contains("tree-c") || name.contains("tree-d")
}

/// Prunes intermediate artifacts and moves the sector's cache subtree and
/// sealed file from `scratch` into `result_root`.
///
/// Synchronous by design: a sector is only reported as succeeded once its
/// artifacts are actually in place.
pub fn relocate(
    sector: &SectorRef,
    scratch: &Path,
    result_root: &Path,
    policy: RelocationPolicy,
) -> Result<(), RecoveryError> {
    let from = SectorPaths::new(scratch, sector);
    let to = SectorPaths::new(result_root, sector);

    // The unsealed artifact is only needed up to phase 2.
    if from.unsealed.exists() {
        fs::remove_file(&from.unsealed)
            .with_context(|| format!("removing {}", from.unsealed.display()))
            .map_err(RecoveryError::filesystem)?;
    }

    prune_cache(&from.cache).map_err(RecoveryError::filesystem)?;

    for dir in [&to.cache, &to.sealed] {
        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))
                .map_err(RecoveryError::filesystem)?;
        }
    }

    if let Err(err) = move_dir(&from.cache, &to.cache) {
        if policy.cache_move_fatal {
            return Err(RecoveryError::filesystem(err));
        }
        // Losing the cache copy does not invalidate the recovery.
        warn!(sector = %sector, "could not move sector cache into the result root: {err:#}");
    }

    move_file(&from.sealed, &to.sealed).map_err(RecoveryError::filesystem)?;
    Ok(())
}

fn prune_cache(cache: &Path) -> anyhow::Result<()> {
    for entry in fs::read_dir(cache).with_context(|| format!("reading {}", cache.display()))? {
        let entry = entry?;
        if is_superseded(&entry.file_name().to_string_lossy()) {
            let path = entry.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            }
            .with_context(|| format!("removing {}", path.display()))?;
        }
    }
    Ok(())
}

/// Rename when possible, copy-and-delete across filesystems.
fn move_dir(from: &Path, to: &Path) -> anyhow::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            let options = fs_extra::dir::CopyOptions::new().copy_inside(true);
            fs_extra::dir::move_dir(from, to, &options)
                .map(|_| ())
                .with_context(|| format!("moving {} to {}", from.display(), to.display()))
        }
    }
}

fn move_file(from: &Path, to: &Path) -> anyhow::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            let options = fs_extra::file::CopyOptions::new();
            fs_extra::file::move_file(from, to, &options)
                .map(|_| ())
                .with_context(|| format!("moving {} to {}", from.display(), to.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fvm_shared::sector::RegisteredSealProof;

    fn sector() -> SectorRef {
        SectorRef {
            miner: 1000,
            number: 7,
            proof: RegisteredSealProof::StackedDRG2KiBV1P1,
        }
    }

    /// Builds a scratch layout the way a finished pipeline leaves it.
    fn sealed_scratch(sector: &SectorRef) -> (tempfile::TempDir, SectorPaths) {
        let scratch = tempfile::tempdir().unwrap();
        let paths = SectorPaths::create(scratch.path(), sector).unwrap();
        fs::write(&paths.unsealed, b"unsealed").unwrap();
        fs::write(&paths.sealed, b"sealed replica").unwrap();
        for name in ["sc-02-data-layer-1.dat", "sc-02-data-tree-c-0.dat", "sc-02-data-tree-d.dat", "sc-02-data-tree-r-last.dat", "t_aux", "p_aux"] {
            fs::write(paths.cache.join(name), b"x").unwrap();
        }
        (scratch, paths)
    }

    #[test]
    fn relocation_moves_sealed_file_and_prunes_cache() {
        let sector = sector();
        let (scratch, paths) = sealed_scratch(&sector);
        let result = tempfile::tempdir().unwrap();

        relocate(&sector, scratch.path(), result.path(), RelocationPolicy::default()).unwrap();

        let to = SectorPaths::new(result.path(), &sector);
        assert_eq!(fs::read(&to.sealed).unwrap(), b"sealed replica");
        assert!(to.cache.join("t_aux").exists());
        assert!(to.cache.join("p_aux").exists());
        assert!(to.cache.join("sc-02-data-tree-r-last.dat").exists());
        assert!(!to.cache.join("sc-02-data-layer-1.dat").exists());
        assert!(!to.cache.join("sc-02-data-tree-c-0.dat").exists());
        assert!(!to.cache.join("sc-02-data-tree-d.dat").exists());
        assert!(!paths.unsealed.exists());
        assert!(!paths.sealed.exists());
    }

    #[test]
    fn cache_move_failure_is_a_warning_by_default() {
        let sector = sector();
        let (scratch, _) = sealed_scratch(&sector);
        let result = tempfile::tempdir().unwrap();
        // A plain file where the cache directory should land makes the
        // cache move fail while the sealed move still succeeds.
        fs::create_dir_all(result.path().join("cache")).unwrap();
        fs::write(result.path().join("cache").join(sector.storage_name()), b"in the way").unwrap();

        relocate(&sector, scratch.path(), result.path(), RelocationPolicy::default()).unwrap();

        let to = SectorPaths::new(result.path(), &sector);
        assert_eq!(fs::read(&to.sealed).unwrap(), b"sealed replica");
    }

    #[test]
    fn cache_move_failure_is_fatal_under_strict_policy() {
        let sector = sector();
        let (scratch, _) = sealed_scratch(&sector);
        let result = tempfile::tempdir().unwrap();
        fs::create_dir_all(result.path().join("cache")).unwrap();
        fs::write(result.path().join("cache").join(sector.storage_name()), b"in the way").unwrap();

        let err = relocate(
            &sector,
            scratch.path(),
            result.path(),
            RelocationPolicy { cache_move_fatal: true },
        )
        .unwrap_err();
        assert!(matches!(err, RecoveryError::Filesystem(_)), "{err}");
    }

    #[test]
    fn missing_sealed_file_is_fatal() {
        let sector = sector();
        let (scratch, paths) = sealed_scratch(&sector);
        fs::remove_file(&paths.sealed).unwrap();
        let result = tempfile::tempdir().unwrap();

        let err = relocate(&sector, scratch.path(), result.path(), RelocationPolicy::default())
            .unwrap_err();
        assert!(matches!(err, RecoveryError::Filesystem(_)), "{err}");
    }
}
