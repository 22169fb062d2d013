use crate::{
    Error,
    Result,
    address::Address,
    profiles::{
        Profile,
        ProfileSource,
    },
};
use itertools::Itertools;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::{
    collections::HashMap,
    fmt,
};
use tracing::{
    debug,
    warn,
};

pub const DEFAULT_NEYNAR_URL: &str = "https://api.neynar.com";

/// Farcaster profile lookups through the Neynar API.
#[derive(Clone)]
pub struct NeynarClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl NeynarClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url,
            api_key: api_key.into(),
            http,
        })
    }

    fn bulk_by_address_url(&self, addresses: &[Address]) -> String {
        format!(
            "{}/v2/farcaster/user/bulk-by-address?addresses={}",
            self.base_url,
            addresses.iter().join(",")
        )
    }
}

impl ProfileSource for NeynarClient {
    async fn fetch_profiles(&self, addresses: &[Address]) -> Result<HashMap<Address, Profile>> {
        if addresses.is_empty() {
            return Ok(HashMap::new());
        }
        let url = self.bulk_by_address_url(addresses);
        debug!(%url, "fetching profiles");
        let res = self
            .http
            .get(url)
            .header("api_key", &self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                service: "neynar",
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        let dto: BulkUsersDto = serde_json::from_slice(&bytes)?;
        Ok(dto.into_profiles())
    }
}

/// Address (any case) to the users whose custody or verified address it is.
#[derive(Deserialize)]
#[serde(transparent)]
struct BulkUsersDto(HashMap<String, Vec<NeynarUserDto>>);

#[derive(Deserialize)]
struct NeynarUserDto {
    fid: u64,
    username: Option<String>,
    display_name: Option<String>,
    pfp_url: Option<String>,
}

impl BulkUsersDto {
    fn into_profiles(self) -> HashMap<Address, Profile> {
        self.0
            .into_iter()
            .filter_map(|(raw, users)| {
                let Ok(address) = raw.parse::<Address>() else {
                    warn!(%raw, "invalid address key in profile response");
                    return None;
                };
                let user = users.into_iter().next()?;
                Some((
                    address,
                    Profile {
                        fid: Some(user.fid),
                        username: user.username,
                        display_name: user.display_name,
                        pfp_url: user.pfp_url,
                        custody_address: address,
                    },
                ))
            })
            .collect()
    }
}

impl fmt::Display for NeynarClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url)
    }
}
