//! # Resolver Pool
//!
//! One connected UDP socket per resolver, created through `socket2` so the
//! receive buffer can be enlarged before tokio takes the socket over.
//!
//! ```text
//!   scheduler ──try_send──▶ random socket ──▶ resolver
//!       ▲                                        │
//!       └──── mpsc<Datagram> ◀── receive task ◀──┘
//! ```
//!
//! Each socket gets its own receive task that forwards raw datagrams into a
//! bounded channel, which is the only path by which replies reach the
//! scheduler. The tasks are aborted when the pool is dropped.
//!
//! Resolvers whose socket cannot be created or connected are dropped at
//! startup with a warning. Opening fails only when none survive.
use std::{
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    sync::Arc,
    time::Duration,
};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tokio::{net::UdpSocket, sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

/// Largest reply read from a resolver.
pub const MAX_DATAGRAM: usize = 512;

/// Capacity of the datagram channel between receive tasks and the scheduler.
pub const CHANNEL_CAPACITY: usize = 8192;

const BACKOFF_START: Duration = Duration::from_micros(100);
const BACKOFF_CAP: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum TransportErrors {
    #[error("failed to open socket for resolver {resolver}: {source}")]
    Socket {
        resolver: SocketAddrV4,
        #[source]
        source: io::Error,
    },

    #[error("no usable resolver in the list")]
    NoResolvers,

    #[error("send failed after {attempts} attempt(s): {last}")]
    SendExhausted {
        attempts: u32,
        #[source]
        last: io::Error,
    },
}

/// A raw reply and the resolver it came from.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub from: SocketAddrV4,
    pub bytes: Vec<u8>,
}

/// A socket connected to a single resolver.
#[derive(Debug, Clone)]
pub struct ResolverSocket {
    addr: SocketAddrV4,
    socket: Arc<UdpSocket>,
}

impl ResolverSocket {
    /// Creates, binds and connects a socket for `addr`.
    pub async fn connect(addr: SocketAddrV4, recv_buffer_bytes: usize) -> Result<Self, TransportErrors> {
        let to_err = |source| TransportErrors::Socket {
            resolver: addr,
            source,
        };

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(to_err)?;

        // Some platforms cap the buffer; keep going with whatever we got.
        if let Err(e) = socket.set_recv_buffer_size(recv_buffer_bytes) {
            debug!(resolver = %addr, error = %e, "could not enlarge receive buffer");
        }

        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
        socket.bind(&bind_addr.into()).map_err(to_err)?;
        socket.set_nonblocking(true).map_err(to_err)?;

        let std_socket: std::net::UdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_socket).map_err(to_err)?;
        socket.connect(SocketAddr::V4(addr)).await.map_err(to_err)?;

        Ok(Self {
            addr,
            socket: Arc::new(socket),
        })
    }

    pub fn addr(&self) -> SocketAddrV4 {
        self.addr
    }

    /// Non-blocking send of one datagram.
    pub fn try_send(&self, bytes: &[u8]) -> io::Result<()> {
        self.socket.try_send(bytes).map(|_| ())
    }

    fn spawn_receiver(&self, tx: mpsc::Sender<Datagram>) -> JoinHandle<()> {
        let socket = self.socket.clone();
        let from = self.addr;

        tokio::spawn(async move {
            let mut buf = [0u8; MAX_DATAGRAM];
            loop {
                match socket.recv(&mut buf).await {
                    Ok(len) => {
                        let datagram = Datagram {
                            from,
                            bytes: buf[..len].to_vec(),
                        };
                        if tx.send(datagram).await.is_err() {
                            break;
                        }
                    }
                    // ICMP errors surface here on connected sockets.
                    Err(e) => debug!(resolver = %from, error = %e, "receive error"),
                }
            }
        })
    }
}

/// Aborts the receive tasks when the pool goes away.
struct ReceiverGuard {
    handles: Vec<JoinHandle<()>>,
}

impl Drop for ReceiverGuard {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// The set of usable resolvers for one run.
pub struct ResolverPool {
    sockets: Vec<ResolverSocket>,
    rng: SmallRng,
    _receivers: ReceiverGuard,
}

impl ResolverPool {
    /// Opens a socket per resolver and starts their receive tasks.
    ///
    /// Returns the pool and the receiving end of the datagram channel.
    pub async fn open(
        resolvers: &[SocketAddrV4],
        recv_buffer_bytes: usize,
    ) -> Result<(Self, mpsc::Receiver<Datagram>), TransportErrors> {
        let mut sockets = Vec::with_capacity(resolvers.len());
        for &addr in resolvers {
            match ResolverSocket::connect(addr, recv_buffer_bytes).await {
                Ok(socket) => sockets.push(socket),
                Err(e) => warn!(resolver = %addr, error = %e, "dropping resolver"),
            }
        }

        if sockets.is_empty() {
            return Err(TransportErrors::NoResolvers);
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handles = sockets
            .iter()
            .map(|s| s.spawn_receiver(tx.clone()))
            .collect();

        let mut thread_rng = rand::rng();
        let pool = Self {
            sockets,
            rng: SmallRng::from_rng(&mut thread_rng),
            _receivers: ReceiverGuard { handles },
        };

        info!(
            usable = pool.len(),
            requested = resolvers.len(),
            "resolver pool ready"
        );
        debug!(resolvers = ?pool.resolvers().collect::<Vec<_>>(), "resolver sockets connected");

        Ok((pool, rx))
    }

    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }

    pub fn resolvers(&self) -> impl Iterator<Item = SocketAddrV4> + '_ {
        self.sockets.iter().map(ResolverSocket::addr)
    }

    /// Sends `bytes` over a uniformly random socket.
    ///
    /// A failed send is retried on another random socket (a different one
    /// whenever the pool has more than one), up to `attempts` tries in
    /// total, sleeping between tries with a doubling backoff.
    pub async fn send(&mut self, bytes: &[u8], attempts: u32) -> Result<SocketAddrV4, TransportErrors> {
        let attempts = attempts.max(1);
        let mut backoff = BACKOFF_START;
        let mut last = io::Error::from(io::ErrorKind::WouldBlock);
        let mut previous = None;

        for attempt in 1..=attempts {
            let idx = self.pick(previous);
            let socket = &self.sockets[idx];

            match socket.try_send(bytes) {
                Ok(()) => return Ok(socket.addr()),
                Err(e) => {
                    debug!(resolver = %socket.addr(), attempt, error = %e, "send failed");
                    last = e;
                }
            }
            previous = Some(idx);

            if attempt < attempts {
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(BACKOFF_CAP);
            }
        }

        Err(TransportErrors::SendExhausted { attempts, last })
    }

    /// Uniform pick among the sockets, skipping `previous` when there is a choice.
    fn pick(&mut self, previous: Option<usize>) -> usize {
        let len = self.sockets.len();
        match previous {
            Some(prev) if len > 1 => {
                let idx = self.rng.random_range(0..len - 1);
                if idx >= prev { idx + 1 } else { idx }
            }
            _ => self.rng.random_range(0..len),
        }
    }
}
