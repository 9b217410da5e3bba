use std::{fmt::Display, time::Duration};

use serde::Serialize;

/// Snapshot of a running scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Queries waiting for a reply.
    pub in_flight: usize,
    /// Datagrams sent so far, retries included.
    pub sent: u64,
    /// Distinct `(domain, type)` pairs in the run.
    pub total: usize,
    /// Queries not sent even once.
    pub remaining: usize,
}

impl Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} queries ongoing, {} queries done, {} queries total, {} queries pending...",
            self.in_flight, self.sent, self.total, self.remaining
        )
    }
}

/// Counters kept by the scheduler while it runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Counters {
    pub found: u64,
    pub sent: u64,
    pub unanswered: u64,
    pub malformed: u64,
    pub send_failures: u64,
}

/// Final report of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    /// Answer records emitted.
    pub found: u64,
    pub queries_sent: u64,
    pub queries_total: u64,
    /// `queries_sent - queries_total`, never negative.
    pub retried: u64,
    /// Queries abandoned after `max_attempts`.
    pub unanswered: u64,
    /// Datagrams that failed to decode.
    pub malformed: u64,
    /// Queries whose every send attempt failed.
    pub send_failures: u64,
    pub elapsed: Duration,
    /// Sent queries per second.
    pub gross_rate: f64,
    /// Distinct queries per second.
    pub effective_rate: f64,
}

impl Summary {
    pub(crate) fn new(counters: Counters, total: usize, elapsed: Duration) -> Self {
        let total = total as u64;
        let secs = elapsed.as_secs_f64();
        let rate = |n: u64| if secs > 0.0 { n as f64 / secs } else { 0.0 };

        Self {
            found: counters.found,
            queries_sent: counters.sent,
            queries_total: total,
            retried: counters.sent.saturating_sub(total),
            unanswered: counters.unanswered,
            malformed: counters.malformed,
            send_failures: counters.send_failures,
            elapsed,
            gross_rate: rate(counters.sent),
            effective_rate: rate(total),
        }
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} subdomains found in {} queries, with {} retried queries. Time taken: {:.2} seconds",
            self.found,
            self.queries_sent,
            self.retried,
            self.elapsed.as_secs_f64()
        )?;
        write!(
            f,
            "Total query rate: {:.2} q/s, effective query rate: {:.2} q/s",
            self.gross_rate, self.effective_rate
        )
    }
}
