//! # Scanner Engine
//!
//! Drives a subdomain sweep: every candidate name is queried for every
//! requested record type over a pool of UDP resolvers, under a global
//! queries-per-second ceiling, until each query has been answered (or given
//! up on, when `max_attempts` is set).
//!
//! ## Architecture Overview
//!
//! ```text
//! +------------------------------------------------------+
//! |                     User Code                        |
//! |       (builds a Scanner, consumes ScanEvents)        |
//! +------------------------------+-----------------------+
//!                                |
//!                                v
//! +------------------------------------------------------+
//! |                Scanner (configuration)               |
//! |   candidates, resolvers, ScannerOptions, formatter   |
//! +------------------------------+-----------------------+
//!                                | build().await
//!                                v
//! +------------------------------------------------------+
//! |                BuiltScanner (runtime)                |
//! | - Schedule: unsent / ready / pending / retry order   |
//! | - RateGate: 1/qps after every send                   |
//! | - ResolverPool: sockets + receive tasks              |
//! +------------------------------------------------------+
//! ```
//!
//! A single task owns all scheduling state, so the pending map needs no
//! lock. Replies reach it only through the pool's datagram channel. Each
//! iteration of the loop:
//!
//! 1. drains received datagrams and matches them against pending queries;
//! 2. emits a [`ScanEvent::Progress`] when the progress interval elapsed;
//! 3. sends the next due query if the rate gate is open;
//! 4. otherwise waits for a datagram or for the gate to reopen, whichever
//!    comes first, never longer than a short poll interval.
//!
//! ## Matching
//!
//! A reply is matched on its first question, lowercased name and type,
//! never on its transaction id. Replies that do not decode are counted as
//! malformed and dropped; the query they were meant for stays pending until
//! its timeout sends it again. Replies for nothing pending (late, duplicate
//! or spoofed) are dropped silently.
//!
//! ## Example
//!
//! ```rust,no_run
//! use subsweep::scanner::*;
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() {
//!     let candidates = vec!["www.example.com".to_string(), "mail.example.com".to_string()];
//!     let resolvers = vec!["1.1.1.1:53".parse().unwrap()];
//!
//!     let scanner = Scanner::<PlainFormatter>::new(candidates, resolvers)
//!         .with_options(ScannerOptions {
//!             max_attempts: Some(5),
//!             ..Default::default()
//!         })
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     let (mut events, handle) = scanner.spawn();
//!     while let Some(event) = events.next().await {
//!         if let ScanEvent::Record(line) = event {
//!             println!("{line}");
//!         }
//!     }
//!
//!     let summary = handle.await.unwrap();
//!     println!("{summary}");
//! }
//! ```
use std::{
    net::SocketAddrV4,
    pin::Pin,
    task::{Context, Poll},
    time::{Duration, Instant},
};

use thiserror::Error;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tokio_stream::{Stream, wrappers::UnboundedReceiverStream};
use tracing::{debug, info, warn};

pub mod formatter;
pub use formatter::{Discovery, JsonFormatter, LogFormatter, PlainFormatter, StructuredFormatter};
pub mod pending;
pub use pending::{Abandoned, MatchKey, Outbound, PendingQuery, Schedule};
pub mod rate;
pub use rate::RateGate;
pub mod stats;
pub use stats::{Progress, Summary};

pub use crate::config::{ConfigErrors, ScannerOptions};
use crate::{
    dns::{Message, Name, RecordType, build_query, generate_id},
    scanner::stats::Counters,
    transport::{Datagram, ResolverPool, TransportErrors},
};

/// Longest the loop sleeps without looking at the clock again.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum ScanErrors {
    #[error(transparent)]
    Config(#[from] ConfigErrors),

    #[error(transparent)]
    Transport(#[from] TransportErrors),
}

/// Something that happened during a scan.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent<T> {
    /// An answer record, formatted by the scanner's [`LogFormatter`].
    Record(T),
    /// A query abandoned after `max_attempts` sends without a reply.
    Unanswered {
        domain: String,
        record_type: String,
        attempts: u32,
    },
    Progress(Progress),
}

/// Events of a spawned scan, in the order they happened.
///
/// Ends when the scan finishes.
pub struct EventStream<T> {
    inner: UnboundedReceiverStream<ScanEvent<T>>,
}

impl<T> EventStream<T> {
    pub fn new(rx: UnboundedReceiver<ScanEvent<T>>) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(rx),
        }
    }
}

impl<T> Stream for EventStream<T> {
    type Item = ScanEvent<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Configuration of a scan, before any socket exists.
///
/// - [`Scanner::new`] takes the candidate names and resolver addresses.
/// - [`Scanner::with_options`] / [`Scanner::with_formatter`] adjust it.
/// - [`Scanner::build`] validates everything and opens the resolver pool.
#[derive(Debug, Clone)]
pub struct Scanner<F>
where
    F: LogFormatter,
{
    pub options: ScannerOptions,
    candidates: Vec<String>,
    resolvers: Vec<SocketAddrV4>,
    formatter: F,
}

impl<F> Scanner<F>
where
    F: LogFormatter + Default,
{
    pub fn new(candidates: Vec<String>, resolvers: Vec<SocketAddrV4>) -> Self {
        Self {
            options: ScannerOptions::default(),
            candidates,
            resolvers,
            formatter: F::default(),
        }
    }
}

impl<F> Scanner<F>
where
    F: LogFormatter,
{
    /// Sets custom configuration of the [`Scanner`].
    pub fn with_options(mut self, options: ScannerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_formatter(mut self, formatter: F) -> Self {
        self.formatter = formatter;
        self
    }

    /// Validates the configuration and opens one socket per resolver.
    ///
    /// Candidates that are not valid DNS names are skipped with a warning.
    pub async fn build(self) -> Result<BuiltScanner<F>, ScanErrors> {
        self.options.validate()?;
        if self.resolvers.is_empty() {
            return Err(ConfigErrors::NoResolvers.into());
        }

        let candidates: Vec<String> = self
            .candidates
            .into_iter()
            .filter(|c| match c.parse::<Name>() {
                Ok(name) if !name.is_root() => true,
                Ok(_) => false,
                Err(e) => {
                    warn!(candidate = %c, error = %e, "skipping candidate");
                    false
                }
            })
            .collect();
        if candidates.is_empty() {
            return Err(ConfigErrors::NoCandidates.into());
        }

        let (pool, replies) =
            ResolverPool::open(&self.resolvers, self.options.recv_buffer_bytes).await?;

        let schedule = Schedule::new(
            candidates,
            &self.options.type_codes(),
            self.options.timeout(),
            self.options.max_attempts,
        );

        Ok(BuiltScanner {
            gate: RateGate::new(self.options.qps),
            options: self.options,
            schedule,
            pool,
            replies,
            formatter: self.formatter,
            counters: Counters::default(),
        })
    }
}

/// A scan ready to run: resolver sockets are open and the schedule is filled.
pub struct BuiltScanner<F>
where
    F: LogFormatter,
{
    options: ScannerOptions,
    schedule: Schedule,
    gate: RateGate,
    pool: ResolverPool,
    replies: mpsc::Receiver<Datagram>,
    formatter: F,
    counters: Counters,
}

impl<F> BuiltScanner<F>
where
    F: LogFormatter,
{
    /// Number of resolvers that survived startup.
    pub fn resolvers(&self) -> usize {
        self.pool.len()
    }

    /// Distinct `(domain, type)` queries in this scan.
    pub fn total_queries(&self) -> usize {
        self.schedule.total()
    }

    /// Runs the scan to completion on a new task.
    pub fn spawn(self) -> (EventStream<F::Output>, JoinHandle<Summary>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(tx));
        (EventStream::new(rx), handle)
    }

    /// Runs the scan to completion, publishing events on `events`.
    ///
    /// The scan keeps going if the receiving side of `events` is dropped.
    pub async fn run(mut self, events: UnboundedSender<ScanEvent<F::Output>>) -> Summary {
        let started = Instant::now();
        let progress_every = self.options.progress_interval();
        let mut last_progress: Option<Instant> = None;

        info!(
            queries = self.schedule.total(),
            resolvers = self.pool.len(),
            qps = self.options.qps,
            "scan started"
        );

        while !self.schedule.is_finished() {
            while let Ok(datagram) = self.replies.try_recv() {
                self.handle_reply(datagram, &events);
            }

            let now = Instant::now();
            if self.options.print_stats
                && last_progress.is_none_or(|at| now.duration_since(at) >= progress_every)
            {
                events.send(ScanEvent::Progress(self.progress())).ok();
                last_progress = Some(now);
            }

            if self.gate.is_open(now) {
                let next = self.schedule.next_query(now);
                self.report_abandoned(&events);

                if let Some(out) = next {
                    self.dispatch(out).await;
                    continue;
                }
                if self.schedule.is_finished() {
                    break;
                }
            }

            let deadline = match self.gate.opens_at() {
                Some(at) if at > now => at.min(now + POLL_INTERVAL),
                _ => now + POLL_INTERVAL,
            };

            let received = tokio::select! {
                datagram = self.replies.recv() => datagram,
                _ = tokio::time::sleep_until(deadline.into()) => None,
            };
            if let Some(datagram) = received {
                self.handle_reply(datagram, &events);
            }
        }

        let summary = Summary::new(self.counters, self.schedule.total(), started.elapsed());
        info!(
            found = summary.found,
            sent = summary.queries_sent,
            retried = summary.retried,
            unanswered = summary.unanswered,
            malformed = summary.malformed,
            "scan finished"
        );
        summary
    }

    fn progress(&self) -> Progress {
        Progress {
            in_flight: self.schedule.in_flight(),
            sent: self.counters.sent,
            total: self.schedule.total(),
            remaining: self.schedule.remaining(),
        }
    }

    async fn dispatch(&mut self, out: Outbound) {
        let mut msg = match build_query(&out.domain, out.qtype) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(domain = %out.domain, error = %e, "cannot encode query, dropping it");
                return;
            }
        };

        // A retry always carries a different transaction id than the send it replaces.
        while Some(msg.header.id) == out.previous_id {
            msg.header.id = generate_id();
        }
        let id = msg.header.id;

        let bytes = match msg.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(domain = %out.domain, error = %e, "cannot encode query, dropping it");
                return;
            }
        };

        let sent = self.pool.send(&bytes, self.options.send_attempts).await;
        self.record_send(out, id, sent, Instant::now());
    }

    /// Books a dispatch whatever the outcome of the send.
    fn record_send(
        &mut self,
        out: Outbound,
        id: u16,
        sent: Result<SocketAddrV4, TransportErrors>,
        now: Instant,
    ) {
        match sent {
            Ok(resolver) => {
                self.counters.sent += 1;
                if out.is_retry() {
                    debug!(
                        domain = %out.domain,
                        qtype = out.qtype,
                        attempt = out.attempt,
                        resolver = %resolver,
                        "retrying query"
                    );
                }
            }
            Err(e) => {
                // Stays pending: the timeout path tries again later.
                self.counters.send_failures += 1;
                warn!(domain = %out.domain, error = %e, "send failed");
            }
        }

        self.schedule.record_dispatch(out, id, now);
        self.gate.close(now);
    }

    fn handle_reply(&mut self, datagram: Datagram, events: &UnboundedSender<ScanEvent<F::Output>>) {
        let msg = match Message::decode(&datagram.bytes) {
            Ok(msg) => msg,
            Err(e) => {
                self.counters.malformed += 1;
                debug!(resolver = %datagram.from, error = %e, "discarding malformed reply");
                return;
            }
        };

        if !msg.is_response() {
            debug!(resolver = %datagram.from, "discarding datagram that is not a response");
            return;
        }
        let Some(question) = msg.first_question() else {
            debug!(resolver = %datagram.from, "discarding reply without a question");
            return;
        };

        let key = MatchKey::new(&question.name.to_string(), question.qtype);
        let Some(query) = self.schedule.resolve(&key) else {
            return;
        };

        if msg.response_code() != 0 {
            debug!(
                domain = %query.domain,
                rcode = msg.response_code(),
                "query answered with an error code"
            );
        }

        for record in &msg.answers {
            self.counters.found += 1;
            let discovery = Discovery::new(&query.domain, query.qtype, record);
            events
                .send(ScanEvent::Record(self.formatter.format(discovery)))
                .ok();
        }
    }

    fn report_abandoned(&mut self, events: &UnboundedSender<ScanEvent<F::Output>>) {
        for abandoned in self.schedule.take_abandoned() {
            self.counters.unanswered += 1;
            debug!(
                domain = %abandoned.domain,
                qtype = abandoned.qtype,
                attempts = abandoned.attempts,
                "giving up on query"
            );
            events
                .send(ScanEvent::Unanswered {
                    domain: abandoned.domain,
                    record_type: RecordType::describe(abandoned.qtype),
                    attempts: abandoned.attempts,
                })
                .ok();
        }
    }
}
