// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Conversions between the 32-byte commitments the proofs stack produces
//! and the commitment CIDs recorded on chain, per the Filecoin commitment
//! multicodec/multihash assignments.

use anyhow::{bail, ensure};
use cid::{Cid, multihash::Multihash};

pub const FIL_COMMITMENT_UNSEALED: u64 = 0xf101;
pub const FIL_COMMITMENT_SEALED: u64 = 0xf102;

pub const SHA2_256_TRUNC254_PADDED: u64 = 0x1012;
pub const POSEIDON_BLS12_381_A2_FC1: u64 = 0xb401;

pub type Commitment = [u8; 32];

/// CID of a replica commitment (`comm_r`), as stored in `SealedCID`.
pub fn replica_commitment_to_cid(comm_r: &Commitment) -> Cid {
    commitment_to_cid(FIL_COMMITMENT_SEALED, POSEIDON_BLS12_381_A2_FC1, comm_r)
}

/// CID of a data commitment (`comm_d`), the unsealed CID.
pub fn data_commitment_to_cid(comm_d: &Commitment) -> Cid {
    commitment_to_cid(FIL_COMMITMENT_UNSEALED, SHA2_256_TRUNC254_PADDED, comm_d)
}

fn commitment_to_cid(codec: u64, hash: u64, commitment: &Commitment) -> Cid {
    let mh = Multihash::wrap(hash, commitment).expect("32-byte digest always fits");
    Cid::new_v1(codec, mh)
}

/// Extracts the raw data commitment from an unsealed-CID, validating the
/// codec and multihash assignments.
pub fn cid_to_data_commitment(cid: &Cid) -> anyhow::Result<Commitment> {
    ensure!(
        cid.codec() == FIL_COMMITMENT_UNSEALED,
        "{cid} is not an unsealed commitment (codec {:#x})",
        cid.codec()
    );
    ensure!(
        cid.hash().code() == SHA2_256_TRUNC254_PADDED,
        "{cid} carries an unexpected multihash {:#x}",
        cid.hash().code()
    );
    let Ok(commitment) = Commitment::try_from(cid.hash().digest()) else {
        bail!("{cid} digest is not 32 bytes");
    };
    Ok(commitment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replica_commitment_round_trip() {
        let comm_r: Commitment = [7u8; 32];
        let cid = replica_commitment_to_cid(&comm_r);
        assert_eq!(cid.codec(), FIL_COMMITMENT_SEALED);
        assert_eq!(cid.hash().code(), POSEIDON_BLS12_381_A2_FC1);
        assert_eq!(cid.hash().digest(), &comm_r[..]);
    }

    #[test]
    fn data_commitment_round_trip() {
        let comm_d: Commitment = [9u8; 32];
        let cid = data_commitment_to_cid(&comm_d);
        assert_eq!(cid.codec(), FIL_COMMITMENT_UNSEALED);
        assert_eq!(cid_to_data_commitment(&cid).unwrap(), comm_d);
    }

    #[test]
    fn sealed_cid_is_rejected_as_data_commitment() {
        let cid = replica_commitment_to_cid(&[1u8; 32]);
        assert!(cid_to_data_commitment(&cid).is_err());
    }

    #[test]
    fn distinct_commitments_give_distinct_cids() {
        assert_ne!(
            replica_commitment_to_cid(&[1u8; 32]),
            replica_commitment_to_cid(&[2u8; 32])
        );
    }
}
