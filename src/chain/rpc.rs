// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! [`ChainStateReader`] over the JSON-RPC API of a Filecoin full node
//! (lotus or forest), using the lotus v0 method names and the
//! `FULLNODE_API_INFO` `token:multiaddr` endpoint convention.

use super::{
    ChainStateReader, DomainSeparationTag, SectorOnChainInfo, SectorPreCommitInfo, Tipset,
    TipsetKey,
};
use crate::json::CidJson;
use anyhow::Context as _;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use fvm_shared::{
    address::Address,
    clock::ChainEpoch,
    randomness::Randomness,
    sector::{RegisteredSealProof, SectorNumber},
};
use jsonrpsee::{
    core::client::ClientT,
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
};
use multiaddr::{Multiaddr, Protocol};
use serde::Deserialize;
use std::{env, fmt, str::FromStr, time::Duration};
use url::Url;

pub const API_INFO_KEY: &str = "FULLNODE_API_INFO";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Full-node endpoint: an optional admin token and a multiaddr, in the
/// `token:multiaddr` form lotus tooling exchanges via `FULLNODE_API_INFO`.
#[derive(Clone, Debug)]
pub struct ApiInfo {
    multiaddr: Multiaddr,
    url: Url,
    pub token: Option<String>,
}

impl ApiInfo {
    pub fn from_env() -> anyhow::Result<Self> {
        let raw = env::var(API_INFO_KEY).with_context(|| format!("{API_INFO_KEY} is not set"))?;
        raw.parse()
    }
}

impl FromStr for ApiInfo {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (token, host) = match s.split_once(':') {
            Some((token, host)) => (Some(token), host),
            None => (None, s),
        };
        let multiaddr: Multiaddr = host.parse().context("invalid API multiaddr")?;
        let url = multiaddr2url(&multiaddr).context("couldn't convert multiaddr to URL")?;
        Ok(ApiInfo {
            multiaddr,
            url,
            token: token.map(String::from),
        })
    }
}

impl Default for ApiInfo {
    fn default() -> Self {
        "/ip4/127.0.0.1/tcp/1234/http".parse().expect("valid multiaddr")
    }
}

impl fmt::Display for ApiInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.multiaddr.fmt(f)
    }
}

fn multiaddr2url(m: &Multiaddr) -> Option<Url> {
    let mut components = m.iter().peekable();
    let host = match components.next()? {
        Protocol::Dns(it) | Protocol::Dns4(it) | Protocol::Dns6(it) | Protocol::Dnsaddr(it) => {
            it.to_string()
        }
        Protocol::Ip4(it) => it.to_string(),
        Protocol::Ip6(it) => it.to_string(),
        _ => return None,
    };
    let port = components
        .next_if(|it| matches!(it, Protocol::Tcp(_)))
        .map(|it| match it {
            Protocol::Tcp(port) => port,
            _ => unreachable!(),
        });
    let scheme = match components.next()? {
        Protocol::Http => "http",
        Protocol::Https => "https",
        _ => return None,
    };
    let None = components.next() else { return None };
    let parse_me = match port {
        Some(port) => format!("{}://{}:{}/rpc/v0", scheme, host, port),
        None => format!("{}://{}/rpc/v0", scheme, host),
    };
    parse_me.parse().ok()
}

/// JSON-RPC implementation of the chain-state boundary.
pub struct LotusChain {
    client: HttpClient,
}

impl LotusChain {
    pub fn connect(api: &ApiInfo) -> anyhow::Result<Self> {
        let mut headers = http::HeaderMap::new();
        if let Some(token) = &api.token {
            headers.insert(
                http::header::AUTHORIZATION,
                format!("Bearer {token}")
                    .parse()
                    .context("invalid API token")?,
            );
        }
        let client = HttpClientBuilder::default()
            .set_headers(headers)
            .request_timeout(DEFAULT_TIMEOUT)
            .build(api.url.as_str())
            .with_context(|| format!("connecting to {}", api.url))?;
        Ok(LotusChain { client })
    }
}

fn key_json(key: &TipsetKey) -> Vec<CidJson> {
    key.0.iter().copied().map(CidJson::from).collect()
}

#[derive(Deserialize)]
struct SectorOnChainInfoJson {
    #[serde(rename = "SectorNumber")]
    sector_number: SectorNumber,
    #[serde(rename = "SealProof")]
    seal_proof: i64,
    #[serde(rename = "SealedCID")]
    sealed_cid: CidJson,
    #[serde(rename = "Activation")]
    activation: ChainEpoch,
}

#[derive(Deserialize)]
struct SectorPreCommitInfoJson {
    #[serde(rename = "SectorNumber")]
    sector_number: SectorNumber,
    #[serde(rename = "SealProof")]
    seal_proof: i64,
    #[serde(rename = "SealedCID")]
    sealed_cid: CidJson,
    #[serde(rename = "SealRandEpoch")]
    seal_rand_epoch: ChainEpoch,
}

#[derive(Deserialize)]
struct SectorPreCommitOnChainInfoJson {
    #[serde(rename = "Info")]
    info: SectorPreCommitInfoJson,
    #[serde(rename = "PreCommitEpoch")]
    precommit_epoch: ChainEpoch,
}

#[derive(Deserialize)]
struct MinerInfoJson {
    #[serde(rename = "SectorSize")]
    sector_size: u64,
}

#[derive(Deserialize)]
struct TipsetJson {
    #[serde(rename = "Cids")]
    cids: Vec<CidJson>,
    #[serde(rename = "Height")]
    height: ChainEpoch,
}

#[async_trait]
impl ChainStateReader for LotusChain {
    async fn sector_info(
        &self,
        miner: &Address,
        sector: SectorNumber,
        tipset: &TipsetKey,
    ) -> anyhow::Result<Option<SectorOnChainInfo>> {
        let info: Option<SectorOnChainInfoJson> = self
            .client
            .request(
                "Filecoin.StateSectorGetInfo",
                rpc_params![miner.to_string(), sector, key_json(tipset)],
            )
            .await
            .context("StateSectorGetInfo")?;
        Ok(info.map(|info| SectorOnChainInfo {
            sector_number: info.sector_number,
            seal_proof: RegisteredSealProof::from(info.seal_proof),
            sealed_cid: info.sealed_cid.into(),
            activation: info.activation,
        }))
    }

    async fn sector_precommit_info(
        &self,
        miner: &Address,
        sector: SectorNumber,
        tipset: &TipsetKey,
    ) -> anyhow::Result<Option<SectorPreCommitInfo>> {
        let info: Option<SectorPreCommitOnChainInfoJson> = self
            .client
            .request(
                "Filecoin.StateSectorPreCommitInfo",
                rpc_params![miner.to_string(), sector, key_json(tipset)],
            )
            .await
            .context("StateSectorPreCommitInfo")?;
        Ok(info.map(|record| SectorPreCommitInfo {
            sector_number: record.info.sector_number,
            seal_proof: RegisteredSealProof::from(record.info.seal_proof),
            sealed_cid: record.info.sealed_cid.into(),
            seal_rand_epoch: record.info.seal_rand_epoch,
            precommit_epoch: record.precommit_epoch,
        }))
    }

    async fn miner_sector_size(
        &self,
        miner: &Address,
        tipset: &TipsetKey,
    ) -> anyhow::Result<u64> {
        let info: MinerInfoJson = self
            .client
            .request(
                "Filecoin.StateMinerInfo",
                rpc_params![miner.to_string(), key_json(tipset)],
            )
            .await
            .context("StateMinerInfo")?;
        Ok(info.sector_size)
    }

    async fn tipset_by_height(
        &self,
        height: ChainEpoch,
        tipset: &TipsetKey,
    ) -> anyhow::Result<Option<Tipset>> {
        let ts: Option<TipsetJson> = self
            .client
            .request(
                "Filecoin.ChainGetTipSetByHeight",
                rpc_params![height, key_json(tipset)],
            )
            .await
            .context("ChainGetTipSetByHeight")?;
        Ok(ts.map(|ts| Tipset {
            key: TipsetKey(ts.cids.into_iter().map(Into::into).collect()),
            height: ts.height,
        }))
    }

    async fn randomness_from_tickets(
        &self,
        tag: DomainSeparationTag,
        epoch: ChainEpoch,
        entropy: &[u8],
        tipset: &TipsetKey,
    ) -> anyhow::Result<Randomness> {
        let encoded: String = self
            .client
            .request(
                "Filecoin.StateGetRandomnessFromTickets",
                rpc_params![tag as i64, epoch, BASE64.encode(entropy), key_json(tipset)],
            )
            .await
            .context("StateGetRandomnessFromTickets")?;
        Ok(Randomness(
            BASE64
                .decode(encoded)
                .context("randomness is not valid base64")?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_info_parses_token_and_multiaddr() {
        let api: ApiInfo = "sometoken:/dns/example.com/tcp/1234/http".parse().unwrap();
        assert_eq!(api.token.as_deref(), Some("sometoken"));
        assert_eq!(api.url.as_str(), "http://example.com:1234/rpc/v0");
    }

    #[test]
    fn api_info_without_token() {
        let api: ApiInfo = "/ip4/127.0.0.1/tcp/1234/http".parse().unwrap();
        assert_eq!(api.token, None);
        assert_eq!(api.url.as_str(), "http://127.0.0.1:1234/rpc/v0");
    }

    #[test]
    fn non_http_multiaddr_is_rejected() {
        assert!("/ip4/127.0.0.1/udp/1234".parse::<ApiInfo>().is_err());
    }
}
