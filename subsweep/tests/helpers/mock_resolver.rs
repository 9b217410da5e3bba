#![allow(dead_code)]
use std::{
    collections::HashMap,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    sync::{Arc, Mutex},
    time::Instant,
};

use subsweep::dns::{HeaderFlags, Message, Name, ResourceRecord};
use tokio::{net::UdpSocket, sync::oneshot};

/// A query as the mock resolver saw it.
#[derive(Debug, Clone)]
pub struct SeenQuery {
    pub name: String,
    pub qtype: u16,
    pub id: u16,
    pub at: Instant,
}

/// Decides what to send back for a query. The second argument counts how
/// many times this name and type have been seen, starting at 1.
pub type Responder = Arc<dyn Fn(&Message, u32) -> Vec<Vec<u8>> + Send + Sync>;

pub struct MockResolver {
    addr: SocketAddrV4,
    seen: Arc<Mutex<Vec<SeenQuery>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockResolver {
    pub async fn start(responder: Responder) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = match socket.local_addr().unwrap() {
            SocketAddr::V4(a) => a,
            SocketAddr::V6(_) => unreachable!(),
        };

        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 512];
            let mut counts: HashMap<(String, u16), u32> = HashMap::new();

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = socket.recv_from(&mut buf) => {
                        let Ok((len, peer)) = result else { continue };
                        let Ok(query) = Message::decode(&buf[..len]) else { continue };
                        let Some(question) = query.first_question() else { continue };

                        let name = question.name.to_string().to_ascii_lowercase();
                        let count = counts.entry((name.clone(), question.qtype)).or_insert(0);
                        *count += 1;

                        log.lock().unwrap().push(SeenQuery {
                            name,
                            qtype: question.qtype,
                            id: query.header.id,
                            at: Instant::now(),
                        });

                        for datagram in responder(&query, *count) {
                            let _ = socket.send_to(&datagram, peer).await;
                        }
                    }
                }
            }
        });

        Self {
            addr,
            seen,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn addr(&self) -> SocketAddrV4 {
        self.addr
    }

    pub fn seen(&self) -> Vec<SeenQuery> {
        self.seen.lock().unwrap().clone()
    }

    /// Queries seen for one name and type, in arrival order.
    pub fn seen_for(&self, name: &str, qtype: u16) -> Vec<SeenQuery> {
        self.seen()
            .into_iter()
            .filter(|q| q.name == name && q.qtype == qtype)
            .collect()
    }

    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockResolver {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// A well-formed response echoing the question of `query`.
pub fn reply(query: &Message, answers: Vec<ResourceRecord>) -> Vec<u8> {
    let flags = HeaderFlags {
        qr: true,
        rd: true,
        ra: true,
        ..HeaderFlags::default()
    };
    let mut msg = Message::new(query.header.id, flags);
    msg.questions = query.questions.clone();
    msg.answers = answers;
    msg.encode().unwrap()
}

/// A response carrying one `A` record for the queried name.
pub fn a_reply(query: &Message, ip: Ipv4Addr) -> Vec<u8> {
    let name = query.first_question().unwrap().name.clone();
    reply(query, vec![ResourceRecord::a(name, 300, ip)])
}

/// A response carrying one `CNAME` record for the queried name.
pub fn cname_reply(query: &Message, target: &str) -> Vec<u8> {
    let name = query.first_question().unwrap().name.clone();
    let target: Name = target.parse().unwrap();
    reply(query, vec![ResourceRecord::cname(name, 300, &target).unwrap()])
}

/// A response whose question label runs past the end of the datagram.
pub fn malformed_reply(query: &Message) -> Vec<u8> {
    let id = query.header.id.to_be_bytes();
    vec![
        id[0], id[1], 0x81, 0x80, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 60, b'w', b'w',
    ]
}
