// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Serde helpers for the lotus JSON conventions: CIDs as `{"/": "bafy..."}`,
//! byte strings as base64, addresses and other stringly types via their
//! `Display`/`FromStr` forms.

use cid::Cid;
use fvm_shared::randomness::Randomness;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

/// Serialize/deserialize through `Display` and `FromStr`.
pub mod stringify {
    use super::*;
    use std::{fmt::Display, str::FromStr};

    pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(D::Error::custom)
    }
}

/// Lotus JSON form of a [`Cid`]: `{"/": "bafy..."}`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CidJson {
    #[serde(rename = "/", with = "stringify")]
    pub cid: Cid,
}

impl From<Cid> for CidJson {
    fn from(cid: Cid) -> Self {
        CidJson { cid }
    }
}

impl From<CidJson> for Cid {
    fn from(json: CidJson) -> Self {
        json.cid
    }
}

/// Serde adapter for a bare [`Cid`] field in lotus JSON form.
pub mod cid_lotus {
    use super::*;

    pub fn serialize<S: Serializer>(cid: &Cid, serializer: S) -> Result<S::Ok, S::Error> {
        CidJson::from(*cid).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cid, D::Error> {
        Ok(CidJson::deserialize(deserializer)?.into())
    }
}

/// Sealing randomness as a base64 string, the Go `[]byte` JSON form.
pub mod randomness_b64 {
    use super::*;
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    pub fn serialize<S: Serializer>(value: &Randomness, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&STANDARD.encode(&value.0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Randomness, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Ok(Randomness(
            STANDARD.decode(encoded).map_err(D::Error::custom)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn cid_json_is_lotus_shaped() {
        let cid = Cid::default();
        let encoded = serde_json::to_value(CidJson::from(cid)).unwrap();
        assert_eq!(encoded, json!({"/": "baeaaaaa"}));
        let decoded: CidJson = serde_json::from_value(encoded).unwrap();
        assert_eq!(Cid::from(decoded), cid);
    }

    #[test]
    fn randomness_round_trips_as_base64() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper(#[serde(with = "randomness_b64")] Randomness);

        let ticket = Randomness(vec![0xde, 0xad, 0xbe, 0xef]);
        let encoded = serde_json::to_string(&Wrapper(ticket.clone())).unwrap();
        assert_eq!(encoded, "\"3q2+7w==\"");
        let Wrapper(decoded) = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, ticket);
    }
}
