//! Which local address does a peer's traffic arrive on?
//!
//! A wildcard listener only learns the sender of a datagram, not the local
//! address it was sent to. We recover that by asking the OS routing table
//! which source address it would pick to reach the sender, the same answer
//! a connected UDP socket gets. Nothing is ever sent.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::Error;

/// Port used for route queries. Connecting a UDP socket only selects a
/// route, so any non-zero port will do.
const DISCARD_PORT: u16 = 9;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(4096) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

/// IP family of an address. IPv4-mapped IPv6 addresses count as IPv6.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    pub fn of(addr: &IpAddr) -> Family {
        match addr {
            IpAddr::V4(_) => Family::V4,
            IpAddr::V6(_) => Family::V6,
        }
    }
}

/// Memoizing remote to local address lookup, one bounded cache per family.
///
/// Safe to share between tasks; each cache has its own lock so the two
/// families never contend.
pub struct LocalAddressResolver {
    v4: Option<Mutex<LruCache<IpAddr, IpAddr>>>,
    v6: Option<Mutex<LruCache<IpAddr, IpAddr>>>,
}

impl LocalAddressResolver {
    /// `capacity` is per family; zero falls back to the default.
    pub fn new(capacity: usize, v4: bool, v6: bool) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        let cache = |enabled: bool| enabled.then(|| Mutex::new(LruCache::new(capacity)));

        LocalAddressResolver {
            v4: cache(v4),
            v6: cache(v6),
        }
    }

    /// Resolver for both families with the default capacity.
    pub fn dual_stack() -> Self {
        Self::new(DEFAULT_CAPACITY.get(), true, true)
    }

    /// The local address the OS would use to reach `remote`.
    ///
    /// The first lookup per remote goes to the routing table, later ones are
    /// answered from the cache until the entry is evicted.
    pub fn resolve(&self, remote: IpAddr) -> Result<IpAddr, Error> {
        let cache = self
            .cache(Family::of(&remote))
            .ok_or(Error::UnsupportedAddressFamily)?;

        if let Some(local) = cache.lock().get(&remote) {
            return Ok(*local);
        }

        // Two tasks may race to fill the same entry; both get the same answer.
        let local = query_route(remote)?;
        cache.lock().put(remote, local);
        Ok(local)
    }

    /// Number of memoized entries for `family`, zero when it is disabled.
    pub fn cached_len(&self, family: Family) -> usize {
        self.cache(family).map(|cache| cache.lock().len()).unwrap_or(0)
    }

    pub fn supports(&self, family: Family) -> bool {
        self.cache(family).is_some()
    }

    fn cache(&self, family: Family) -> Option<&Mutex<LruCache<IpAddr, IpAddr>>> {
        match family {
            Family::V4 => self.v4.as_ref(),
            Family::V6 => self.v6.as_ref(),
        }
    }
}

impl std::fmt::Debug for LocalAddressResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAddressResolver")
            .field("v4", &self.cached_len(Family::V4))
            .field("v6", &self.cached_len(Family::V6))
            .finish()
    }
}

fn query_route(remote: IpAddr) -> Result<IpAddr, Error> {
    let unspecified: IpAddr = match remote {
        IpAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
        IpAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
    };

    let socket = UdpSocket::bind(SocketAddr::new(unspecified, 0)).map_err(Error::RouteQuery)?;
    socket
        .connect(SocketAddr::new(remote, DISCARD_PORT))
        .map_err(Error::RouteQuery)?;
    let local = socket.local_addr().map_err(Error::RouteQuery)?;

    Ok(local.ip())
}
