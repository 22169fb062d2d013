//! Social profiles for participant addresses, cached per address.

use crate::{
    Result,
    address::Address,
};
use itertools::Itertools;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    future::Future,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};
use tracing::{
    debug,
    warn,
};

pub const LOOKUP_CHUNK_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub fid: Option<u64>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub pfp_url: Option<String>,
    pub custody_address: Address,
}

impl Profile {
    /// Placeholder cached for addresses without a profile, so they are not
    /// looked up again.
    pub fn not_found(address: Address) -> Self {
        Self {
            fid: None,
            username: None,
            display_name: None,
            pfp_url: None,
            custody_address: address,
        }
    }

    pub fn is_found(&self) -> bool {
        self.fid.is_some()
    }

    pub fn label(&self) -> String {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.username.as_deref().filter(|name| !name.is_empty()))
            .map(str::to_string)
            .unwrap_or_else(|| self.custody_address.short())
    }
}

/// Bulk lookup of profiles by address. Addresses without a profile are simply
/// absent from the result.
pub trait ProfileSource {
    fn fetch_profiles(
        &self,
        addresses: &[Address],
    ) -> impl Future<Output = Result<HashMap<Address, Profile>>> + Send;
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProfileLookup {
    pub cached: HashMap<Address, Profile>,
    /// Not cached and not being fetched yet; the caller now owns their lookup.
    pub pending: Vec<Address>,
}

#[derive(Default)]
struct CacheState {
    profiles: HashMap<Address, Profile>,
    in_flight: HashSet<Address>,
}

pub struct ProfileCache<S> {
    source: Arc<S>,
    state: Arc<Mutex<CacheState>>,
}

impl<S> Clone for ProfileCache<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: ProfileSource> ProfileCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, address: &Address) -> Option<Profile> {
        self.state().profiles.get(address).cloned()
    }

    /// Display label for `address`, falling back to the short address while
    /// the profile is unknown.
    pub fn label(&self, address: &Address) -> String {
        self.get(address)
            .map(|profile| profile.label())
            .unwrap_or_else(|| address.short())
    }

    pub fn is_loading(&self) -> bool {
        !self.state().in_flight.is_empty()
    }

    /// Splits `addresses` into cached profiles and addresses that still need
    /// a lookup. Returned pending addresses are marked in flight, so a second
    /// caller does not fetch them again.
    pub fn get_many(&self, addresses: &[Address]) -> ProfileLookup {
        let mut state = self.state();
        let mut lookup = ProfileLookup::default();
        for address in addresses.iter().unique() {
            if let Some(profile) = state.profiles.get(address) {
                lookup.cached.insert(*address, profile.clone());
            } else if state.in_flight.insert(*address) {
                lookup.pending.push(*address);
            }
        }
        lookup
    }

    /// Resolves every address, fetching what is missing in chunks. Failed
    /// chunks and addresses without a profile are cached as not found.
    pub async fn resolve_many(&self, addresses: &[Address]) -> HashMap<Address, Profile> {
        let ProfileLookup { mut cached, pending } = self.get_many(addresses);

        for chunk in pending.chunks(LOOKUP_CHUNK_SIZE) {
            let fetched = match self.source.fetch_profiles(chunk).await {
                Ok(fetched) => fetched,
                Err(error) => {
                    warn!(%error, addresses = chunk.len(), "profile lookup failed");
                    HashMap::new()
                }
            };
            let mut state = self.state();
            for address in chunk {
                let profile = fetched
                    .get(address)
                    .cloned()
                    .unwrap_or_else(|| Profile::not_found(*address));
                state.in_flight.remove(address);
                state
                    .profiles
                    .entry(*address)
                    .or_insert_with(|| profile.clone());
                cached.insert(*address, profile);
            }
            debug!(found = fetched.len(), requested = chunk.len(), "profiles cached");
        }

        // addresses another caller is still fetching
        for address in addresses {
            cached
                .entry(*address)
                .or_insert_with(|| Profile::not_found(*address));
        }
        cached
    }
}
