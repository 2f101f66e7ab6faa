//! UDP ingestion loop.
//!
//! One socket per enabled address family, each with its own receive task.
//! The receive task never decodes anything itself: every datagram is copied
//! out of the receive buffer and handed to a task of its own, so the socket
//! is re-armed right away. A semaphore caps how many of those tasks exist at
//! once; when it is exhausted the receive task waits and the kernel's socket
//! buffer absorbs the burst.
//!
//! Every datagram produces exactly one event: an [`IngestedRecord`] on the
//! message channel, or a [`DecodeErrorRecord`] on the error channel.
//!
//! ```no_run
//! # async fn run() -> Result<(), cisco_syslog::CollectorError> {
//! use cisco_syslog::{Collector, CollectorConfig, EventSinks};
//! use tokio::sync::mpsc;
//!
//! let (messages, mut message_rx) = mpsc::channel(1024);
//! let (errors, _error_rx) = mpsc::channel(1024);
//! let handle = Collector::new(CollectorConfig::default(), EventSinks { messages, errors }).start()?;
//!
//! while let Some(record) = message_rx.recv().await {
//!     println!("{} {}", record.sender, record.payload.body);
//! }
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::CollectorConfig;
use crate::decoder::Decoder;
use crate::record::{DecodeErrorRecord, IngestedRecord};
use crate::resolver::LocalAddressResolver;

// =============================================================================
// Errors
// =============================================================================

/// Failures starting the collector. Nothing after start-up is fatal.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// Failed to bind to address
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("neither IPv4 nor IPv6 is enabled")]
    NoFamilies,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Events
// =============================================================================

/// Where the collector delivers its two kinds of events.
///
/// Sends wait for capacity, so a slow consumer eventually stalls dispatch
/// and, through the in-flight limit, the receive loops.
#[derive(Debug, Clone)]
pub struct EventSinks {
    pub messages: mpsc::Sender<IngestedRecord>,
    pub errors: mpsc::Sender<DecodeErrorRecord>,
}

// =============================================================================
// Stats
// =============================================================================

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    decoded: AtomicU64,
    failed: AtomicU64,
    unresolved: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> CollectorStats {
        CollectorStats {
            received: self.received.load(Ordering::Relaxed),
            decoded: self.decoded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            unresolved: self.unresolved.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the collector's counters.
///
/// Once all dispatches have finished,
/// `received == decoded + failed + unresolved`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorStats {
    /// Datagrams taken off either socket.
    pub received: u64,
    /// Emitted as [`IngestedRecord`].
    pub decoded: u64,
    /// Rejected by the decoder.
    pub failed: u64,
    /// Decoded, but the local address could not be determined.
    pub unresolved: u64,
}

// =============================================================================
// Collector
// =============================================================================

/// A not yet started collector.
pub struct Collector {
    config: CollectorConfig,
    sinks: EventSinks,
    decoder: Decoder,
}

impl Collector {
    pub fn new(config: CollectorConfig, sinks: EventSinks) -> Self {
        Collector {
            config,
            sinks,
            decoder: Decoder::default(),
        }
    }

    /// Use `decoder` instead of one running on the system clock.
    pub fn with_decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Bind the sockets and start receiving. Must be called from within a
    /// tokio runtime.
    pub fn start(self) -> Result<CollectorHandle, CollectorError> {
        let v4_addr = self.config.v4_bind_address();
        let v6_addr = self.config.v6_bind_address();
        if v4_addr.is_none() && v6_addr.is_none() {
            return Err(CollectorError::NoFamilies);
        }

        // Bind everything before spawning anything, so a failure leaves
        // nothing running behind.
        let v4 = v4_addr
            .map(|addr| bind(addr, self.config.recv_buffer_size))
            .transpose()?;
        let v6 = v6_addr
            .map(|addr| bind(addr, self.config.recv_buffer_size))
            .transpose()?;

        let shared = Arc::new(Shared {
            decoder: self.decoder,
            resolver: LocalAddressResolver::new(
                self.config.resolver_cache_capacity,
                v4.is_some(),
                v6.is_some(),
            ),
            sinks: self.sinks,
            host_name: self.config.receiver_host_name(),
            counters: Counters::default(),
        });
        let permits = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();

        let mut local_v4 = None;
        let mut local_v6 = None;
        for (socket, local) in [(v4, &mut local_v4), (v6, &mut local_v6)] {
            let Some((socket, addr)) = socket else {
                continue;
            };
            *local = Some(addr);

            let receiver = Receiver {
                socket,
                local: addr,
                buf_size: self.config.max_datagram_size,
                shared: Arc::clone(&shared),
                permits: Arc::clone(&permits),
                cancel: cancel.clone(),
                tracker: tracker.clone(),
            };
            tracker.spawn(receiver.run());
        }

        tracing::info!(
            ipv4 = ?local_v4,
            ipv6 = ?local_v6,
            host_name = %shared.host_name,
            max_in_flight = self.config.max_in_flight,
            "syslog collector listening"
        );

        Ok(CollectorHandle {
            local_v4,
            local_v6,
            shared,
            cancel,
            tracker,
        })
    }
}

/// Create a UDP socket for `addr` with the requested receive buffer.
///
/// IPv6 sockets are made v6-only so that they never compete with the IPv4
/// socket for the same port.
fn bind(addr: SocketAddr, recv_buffer_size: usize) -> Result<(UdpSocket, SocketAddr), CollectorError> {
    let create = || -> std::io::Result<UdpSocket> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        if addr.is_ipv6() {
            socket.set_only_v6(true)?;
        }

        if let Err(err) = socket.set_recv_buffer_size(recv_buffer_size) {
            tracing::warn!(
                error = %err,
                requested_size = recv_buffer_size,
                "failed to set UDP SO_RCVBUF"
            );
        }

        socket.bind(&addr.into())?;
        socket.set_nonblocking(true)?;

        let std_socket: std::net::UdpSocket = socket.into();
        UdpSocket::from_std(std_socket)
    };

    let socket = create().map_err(|source| CollectorError::Bind {
        address: addr,
        source,
    })?;
    let local = socket.local_addr()?;
    Ok((socket, local))
}

// =============================================================================
// Handle
// =============================================================================

/// A running collector. Dropping it cancels the receive loops without
/// waiting for them; [`CollectorHandle::stop`] also waits.
pub struct CollectorHandle {
    local_v4: Option<SocketAddr>,
    local_v6: Option<SocketAddr>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl CollectorHandle {
    /// Address the IPv4 socket is bound to, with the actual port.
    pub fn local_addr_v4(&self) -> Option<SocketAddr> {
        self.local_v4
    }

    pub fn local_addr_v6(&self) -> Option<SocketAddr> {
        self.local_v6
    }

    pub fn stats(&self) -> CollectorStats {
        self.shared.counters.snapshot()
    }

    /// Stop receiving and wait until every datagram already taken off a
    /// socket has been dispatched.
    pub async fn stop(self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;

        let stats = self.stats();
        tracing::info!(
            received = stats.received,
            decoded = stats.decoded,
            failed = stats.failed,
            unresolved = stats.unresolved,
            "syslog collector stopped"
        );
    }
}

impl Drop for CollectorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// =============================================================================
// Receive and dispatch
// =============================================================================

/// State shared by both receive loops and every dispatch task.
struct Shared {
    decoder: Decoder,
    resolver: LocalAddressResolver,
    sinks: EventSinks,
    host_name: String,
    counters: Counters,
}

struct Receiver {
    socket: UdpSocket,
    local: SocketAddr,
    buf_size: usize,
    shared: Arc<Shared>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Receiver {
    async fn run(self) {
        tracing::debug!(local = %self.local, "syslog receive loop started");

        let mut buf = vec![0u8; self.buf_size.max(1)];
        loop {
            let permit = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let (len, peer) = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                result = self.socket.recv_from(&mut buf) => match result {
                    Ok(received) => received,
                    Err(err) => {
                        // e.g. ICMP port unreachable surfacing on some platforms
                        tracing::warn!(local = %self.local, error = %err, "syslog recv error");
                        continue;
                    }
                },
            };

            let received_at = Utc::now();
            let datagram = buf[..len].to_vec();
            let shared = Arc::clone(&self.shared);
            let local = self.local;

            self.tracker.spawn(async move {
                shared.dispatch(datagram, peer, local, received_at).await;
                drop(permit);
            });
        }

        tracing::debug!(local = %self.local, "syslog receive loop stopped");
    }
}

impl Shared {
    async fn dispatch(
        &self,
        datagram: Vec<u8>,
        sender: SocketAddr,
        local: SocketAddr,
        received_at: DateTime<Utc>,
    ) {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let payload = match self.decoder.decode(trim_trailing_newline(&datagram)) {
            Ok(payload) => payload,
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(peer = %sender, error = %err, "failed to decode syslog datagram");
                self.reject(sender, datagram, err.to_string()).await;
                return;
            }
        };

        let receiver = match self.resolver.resolve(sender.ip()) {
            Ok(ip) => SocketAddr::new(ip, local.port()),
            Err(err) => {
                self.counters.unresolved.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(peer = %sender, error = %err, "failed to resolve local address");
                self.reject(sender, datagram, err.to_string()).await;
                return;
            }
        };

        self.counters.decoded.fetch_add(1, Ordering::Relaxed);
        let record = IngestedRecord::new(
            received_at,
            sender,
            receiver,
            self.host_name.clone(),
            payload,
        );
        if self.sinks.messages.send(record).await.is_err() {
            tracing::debug!(peer = %sender, "message channel closed, dropping record");
        }
    }

    async fn reject(&self, sender: SocketAddr, raw_bytes: Vec<u8>, reason: String) {
        let record = DecodeErrorRecord {
            sender,
            raw_bytes,
            reason,
        };
        if self.sinks.errors.send(record).await.is_err() {
            tracing::debug!(peer = %sender, "error channel closed, dropping record");
        }
    }
}

/// Trim one trailing newline (LF or CRLF).
#[inline]
pub fn trim_trailing_newline(data: &[u8]) -> &[u8] {
    let mut end = data.len();

    if end > 0 && data[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && data[end - 1] == b'\r' {
        end -= 1;
    }

    &data[..end]
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    fn sinks() -> (
        EventSinks,
        mpsc::Receiver<IngestedRecord>,
        mpsc::Receiver<DecodeErrorRecord>,
    ) {
        let (messages, message_rx) = mpsc::channel(16);
        let (errors, error_rx) = mpsc::channel(16);
        (EventSinks { messages, errors }, message_rx, error_rx)
    }

    #[test]
    fn trailing_newline() {
        assert_eq!(trim_trailing_newline(b"hello\n"), b"hello");
        assert_eq!(trim_trailing_newline(b"hello\r\n"), b"hello");
        assert_eq!(trim_trailing_newline(b"hello\r"), b"hello");
        assert_eq!(trim_trailing_newline(b"hello"), b"hello");
        assert_eq!(trim_trailing_newline(b"hello\n\n"), b"hello\n");
        assert_eq!(trim_trailing_newline(b""), b"");
    }

    #[test]
    fn error_display() {
        let err = CollectorError::Bind {
            address: "0.0.0.0:514".parse().unwrap(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        };
        assert!(err.to_string().contains("0.0.0.0:514"));
        assert!(CollectorError::NoFamilies.to_string().contains("IPv4"));
    }

    #[tokio::test]
    async fn no_families() {
        let (sinks, _, _) = sinks();
        let config = CollectorConfig {
            ipv4: None,
            ipv6: None,
            ..CollectorConfig::loopback()
        };
        let result = Collector::new(config, sinks).start();
        assert!(matches!(result, Err(CollectorError::NoFamilies)));
    }

    #[tokio::test]
    async fn port_in_use() {
        let taken = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let (sinks, _, _) = sinks();
        let config = CollectorConfig {
            port,
            ..CollectorConfig::loopback()
        };
        let result = Collector::new(config, sinks).start();
        assert!(matches!(result, Err(CollectorError::Bind { .. })));
    }

    #[tokio::test]
    async fn one_event_per_datagram() {
        let (sinks, mut message_rx, mut error_rx) = sinks();
        let handle = Collector::new(CollectorConfig::loopback(), sinks)
            .start()
            .unwrap();
        let target = handle.local_addr_v4().unwrap();
        assert_eq!(handle.local_addr_v6(), None);

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"<13>1: hello\n", target).await.unwrap();
        client.send_to(b"not syslog", target).await.unwrap();

        let record = timeout(Duration::from_secs(5), message_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.payload.body, "hello");
        assert_eq!(record.receiver, target);

        let rejected = timeout(Duration::from_secs(5), error_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rejected.raw_bytes, b"not syslog");
        assert_eq!(rejected.sender, client.local_addr().unwrap());

        handle.stop().await;
    }

    #[tokio::test]
    async fn unresolved_receiver_is_rejected() {
        let (sinks, mut message_rx, mut error_rx) = sinks();
        let shared = Shared {
            decoder: Decoder::default(),
            resolver: LocalAddressResolver::new(4, true, false),
            sinks,
            host_name: "collector".into(),
            counters: Counters::default(),
        };

        let sender: SocketAddr = "[2001:db8::1]:514".parse().unwrap();
        let local: SocketAddr = "127.0.0.1:514".parse().unwrap();
        shared
            .dispatch(b"<13>1: fine".to_vec(), sender, local, Utc::now())
            .await;

        let rejected = error_rx.try_recv().unwrap();
        assert_eq!(rejected.sender, sender);
        assert_eq!(rejected.raw_bytes, b"<13>1: fine");
        assert_eq!(
            rejected.reason,
            crate::Error::UnsupportedAddressFamily.to_string()
        );
        assert!(message_rx.try_recv().is_err());

        let stats = shared.counters.snapshot();
        assert_eq!(stats.received, 1);
        assert_eq!(stats.decoded, 0);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.unresolved, 1);
    }

    #[tokio::test]
    async fn stop_waits_for_dispatch() {
        let (sinks, _message_rx, _error_rx) = sinks();
        let handle = Collector::new(CollectorConfig::loopback(), sinks)
            .start()
            .unwrap();
        let target = handle.local_addr_v4().unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"<13>1: hello", target).await.unwrap();

        timeout(Duration::from_secs(5), async {
            while handle.stats().received == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let shared = Arc::clone(&handle.shared);
        timeout(Duration::from_secs(5), handle.stop()).await.unwrap();

        let stats = shared.counters.snapshot();
        assert_eq!(stats.received, 1);
        assert_eq!(stats.decoded + stats.failed + stats.unresolved, 1);
    }
}
