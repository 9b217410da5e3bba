//! Scheduling state of a scan: what is still unsent, what is waiting for a
//! reply, and what must be retried.
//!
//! [`Schedule`] does no I/O and never reads a clock. The driver passes `now`
//! to every time-dependent call, which keeps the retry rules testable
//! without sockets or sleeps.
//!
//! Lifecycle of a `(domain, type)` pair:
//!
//! ```text
//!   Unsent ──▶ Ready ──▶ Pending ──reply──▶ Answered
//!                           │  ▲
//!                   timeout │  │ re-dispatch (new id, same key)
//!                           ▼  │
//!                         Retry ──max_attempts──▶ Abandoned
//! ```
use std::{
    collections::{HashMap, HashSet, VecDeque},
    time::{Duration, Instant},
};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Identity of an outstanding query. At most one pending entry exists per key.
///
/// The domain is lowercased so replies from resolvers that randomise the
/// case of the echoed question still match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey {
    pub domain: String,
    pub qtype: u16,
}

impl MatchKey {
    pub fn new(domain: &str, qtype: u16) -> Self {
        Self {
            domain: domain.trim_end_matches('.').to_ascii_lowercase(),
            qtype,
        }
    }
}

/// A query that has been sent and not yet answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuery {
    pub domain: String,
    pub qtype: u16,
    /// Transaction id of the latest dispatch.
    pub id: u16,
    pub dispatched_at: Instant,
    /// Number of dispatches so far, this one included.
    pub attempts: u32,
    seq: u64,
}

/// A query the driver should send next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub domain: String,
    pub qtype: u16,
    /// 1 for a first send, higher for retries.
    pub attempt: u32,
    /// Transaction id used by the previous attempt, if any.
    pub previous_id: Option<u16>,
}

impl Outbound {
    pub fn key(&self) -> MatchKey {
        MatchKey::new(&self.domain, self.qtype)
    }

    pub fn is_retry(&self) -> bool {
        self.attempt > 1
    }
}

/// A query given up on after `max_attempts` unanswered dispatches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abandoned {
    pub domain: String,
    pub qtype: u16,
    pub attempts: u32,
}

#[derive(Debug)]
pub struct Schedule {
    unsent: Vec<String>,
    record_types: Vec<u16>,
    ready: VecDeque<Outbound>,
    pending: HashMap<MatchKey, PendingQuery>,
    // Dispatch order, oldest first. Entries whose seq no longer matches the
    // pending map are stale and skipped.
    order: VecDeque<(MatchKey, u64)>,
    abandoned: Vec<Abandoned>,
    timeout: Duration,
    max_attempts: Option<u32>,
    total: usize,
    answered: usize,
    next_seq: u64,
    rng: SmallRng,
}

impl Schedule {
    /// Builds the schedule for every candidate × record type.
    ///
    /// Candidates that only differ by case or a trailing dot are merged.
    pub fn new(
        candidates: impl IntoIterator<Item = String>,
        record_types: &[u16],
        timeout: Duration,
        max_attempts: Option<u32>,
    ) -> Self {
        let mut seen = HashSet::new();
        let unsent: Vec<String> = candidates
            .into_iter()
            .filter(|c| seen.insert(MatchKey::new(c, 0).domain))
            .collect();

        let mut types = Vec::with_capacity(record_types.len());
        for &t in record_types {
            if !types.contains(&t) {
                types.push(t);
            }
        }

        let mut thread_rng = rand::rng();
        Self {
            total: unsent.len() * types.len(),
            unsent,
            record_types: types,
            ready: VecDeque::new(),
            pending: HashMap::new(),
            order: VecDeque::new(),
            abandoned: Vec::new(),
            timeout,
            max_attempts,
            answered: 0,
            next_seq: 0,
            rng: SmallRng::from_rng(&mut thread_rng),
        }
    }

    /// Picks the next query to send, if any is due at `now`.
    ///
    /// Order of preference: queries already chosen, then a uniformly random
    /// unsent candidate (queued for every requested type), then the oldest
    /// pending query whose age exceeds the timeout.
    pub fn next_query(&mut self, now: Instant) -> Option<Outbound> {
        if let Some(out) = self.ready.pop_front() {
            return Some(out);
        }

        while !self.unsent.is_empty() {
            let idx = self.rng.random_range(0..self.unsent.len());
            let domain = self.unsent.swap_remove(idx);

            for &qtype in &self.record_types {
                if !self.pending.contains_key(&MatchKey::new(&domain, qtype)) {
                    self.ready.push_back(Outbound {
                        domain: domain.clone(),
                        qtype,
                        attempt: 1,
                        previous_id: None,
                    });
                }
            }

            if let Some(out) = self.ready.pop_front() {
                return Some(out);
            }
        }

        self.next_retry(now)
    }

    fn next_retry(&mut self, now: Instant) -> Option<Outbound> {
        while let Some((key, seq)) = self.order.front() {
            let Some(entry) = self.pending.get(key) else {
                self.order.pop_front();
                continue;
            };
            if entry.seq != *seq {
                self.order.pop_front();
                continue;
            }

            // The front is the oldest live dispatch: nothing behind it is due either.
            if now.saturating_duration_since(entry.dispatched_at) <= self.timeout {
                return None;
            }

            let (key, _) = self.order.pop_front()?;
            let entry = self.pending.remove(&key)?;

            if self.max_attempts.is_some_and(|max| entry.attempts >= max) {
                self.abandoned.push(Abandoned {
                    domain: entry.domain,
                    qtype: entry.qtype,
                    attempts: entry.attempts,
                });
                continue;
            }

            return Some(Outbound {
                domain: entry.domain,
                qtype: entry.qtype,
                attempt: entry.attempts + 1,
                previous_id: Some(entry.id),
            });
        }
        None
    }

    /// Records that `out` was dispatched with transaction id `id` at `now`.
    pub fn record_dispatch(&mut self, out: Outbound, id: u16, now: Instant) -> MatchKey {
        let key = out.key();
        let seq = self.next_seq;
        self.next_seq += 1;

        self.pending.insert(
            key.clone(),
            PendingQuery {
                domain: out.domain,
                qtype: out.qtype,
                id,
                dispatched_at: now,
                attempts: out.attempt,
                seq,
            },
        );
        self.order.push_back((key.clone(), seq));
        key
    }

    /// Removes and returns the pending entry a reply matched, if any.
    pub fn resolve(&mut self, key: &MatchKey) -> Option<PendingQuery> {
        let entry = self.pending.remove(key)?;
        self.answered += 1;
        Some(entry)
    }

    pub fn get(&self, key: &MatchKey) -> Option<&PendingQuery> {
        self.pending.get(key)
    }

    /// Queries given up on since the last call.
    pub fn take_abandoned(&mut self) -> Vec<Abandoned> {
        std::mem::take(&mut self.abandoned)
    }

    pub fn is_finished(&self) -> bool {
        self.unsent.is_empty() && self.ready.is_empty() && self.pending.is_empty()
    }

    /// Queries waiting for a reply.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Queries not sent even once.
    pub fn remaining(&self) -> usize {
        self.unsent.len() * self.record_types.len() + self.ready.len()
    }

    /// Distinct `(domain, type)` pairs in the run.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn answered(&self) -> usize {
        self.answered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: u16 = 1;
    const CNAME: u16 = 5;
    const TIMEOUT: Duration = Duration::from_millis(500);

    fn schedule(names: &[&str], types: &[u16], max_attempts: Option<u32>) -> Schedule {
        Schedule::new(
            names.iter().map(|s| s.to_string()),
            types,
            TIMEOUT,
            max_attempts,
        )
    }

    fn dispatch_next(s: &mut Schedule, now: Instant) -> MatchKey {
        let out = s.next_query(now).unwrap();
        s.record_dispatch(out, 42, now)
    }

    #[test]
    fn test_match_key_ignores_case_and_trailing_dot() {
        assert_eq!(
            MatchKey::new("WwW.Example.COM.", A),
            MatchKey::new("www.example.com", A)
        );
        assert_ne!(
            MatchKey::new("www.example.com", A),
            MatchKey::new("www.example.com", CNAME)
        );
    }

    #[test]
    fn test_candidates_are_merged_and_counted() {
        let s = schedule(
            &["www.example.com", "WWW.example.com.", "mail.example.com"],
            &[A, CNAME, A],
            None,
        );
        assert_eq!(s.total(), 4);
        assert_eq!(s.remaining(), 4);
        assert!(!s.is_finished());
    }

    #[test]
    fn test_every_candidate_is_sent_once_before_retries() {
        let names = ["a.example.com", "b.example.com", "c.example.com"];
        let mut s = schedule(&names, &[A], None);
        let t0 = Instant::now();

        let mut sent = HashSet::new();
        for _ in 0..names.len() {
            let out = s.next_query(t0).unwrap();
            assert_eq!(out.attempt, 1);
            assert!(sent.insert(out.domain.clone()));
            s.record_dispatch(out, 1, t0);
        }
        assert_eq!(s.remaining(), 0);
        assert_eq!(s.in_flight(), 3);

        // Nothing is due until the timeout has passed.
        assert_eq!(s.next_query(t0 + TIMEOUT / 2), None);
        assert_eq!(s.next_query(t0 + TIMEOUT), None);
    }

    #[test]
    fn test_two_types_coexist_and_resolve_independently() {
        let mut s = schedule(&["www.example.com"], &[A, CNAME], None);
        let t0 = Instant::now();

        let first = dispatch_next(&mut s, t0);
        let second = dispatch_next(&mut s, t0);
        assert_eq!(first.domain, second.domain);
        assert_ne!(first.qtype, second.qtype);
        assert_eq!(s.in_flight(), 2);

        let answered = s.resolve(&MatchKey::new("www.example.com", CNAME)).unwrap();
        assert_eq!(answered.qtype, CNAME);
        assert_eq!(s.in_flight(), 1);
        assert!(s.get(&MatchKey::new("www.example.com", A)).is_some());
        assert!(!s.is_finished());

        // A duplicate reply matches nothing.
        assert_eq!(s.resolve(&MatchKey::new("www.example.com", CNAME)), None);
        assert_eq!(s.answered(), 1);
    }

    #[test]
    fn test_retry_after_timeout_keeps_key_and_reports_previous_id() {
        let mut s = schedule(&["mail.example.com"], &[A], None);
        let t0 = Instant::now();

        let out = s.next_query(t0).unwrap();
        let key = s.record_dispatch(out, 1000, t0);

        let t1 = t0 + TIMEOUT + Duration::from_millis(1);
        let retry = s.next_query(t1).unwrap();
        assert!(retry.is_retry());
        assert_eq!(retry.attempt, 2);
        assert_eq!(retry.previous_id, Some(1000));
        assert_eq!(retry.key(), key);
        // Pulled out of pending until it is dispatched again.
        assert_eq!(s.in_flight(), 0);

        let again = s.record_dispatch(retry, 2000, t1);
        assert_eq!(again, key);
        let entry = s.get(&key).unwrap();
        assert_eq!(entry.id, 2000);
        assert_eq!(entry.attempts, 2);
        assert_eq!(entry.dispatched_at, t1);

        // The next retry is measured from the new dispatch time.
        assert_eq!(s.next_query(t1 + TIMEOUT / 2), None);
        assert!(s.next_query(t1 + TIMEOUT * 2).is_some());
    }

    #[test]
    fn test_retries_are_served_oldest_first() {
        let names = ["a.example.com", "b.example.com", "c.example.com"];
        let mut s = schedule(&names, &[A], None);
        let t0 = Instant::now();

        let mut dispatch_order = Vec::new();
        for i in 0..3 {
            let t = t0 + Duration::from_millis(i * 10);
            let key = dispatch_next(&mut s, t);
            dispatch_order.push(key.domain);
        }

        let late = t0 + TIMEOUT * 4;
        let retried: Vec<String> = (0..3).map(|_| s.next_query(late).unwrap().domain).collect();
        assert_eq!(retried, dispatch_order);
    }

    #[test]
    fn test_answered_and_redispatched_entries_are_skipped() {
        let mut s = schedule(&["a.example.com", "b.example.com"], &[A], None);
        let t0 = Instant::now();

        let first = dispatch_next(&mut s, t0);
        let second = dispatch_next(&mut s, t0 + Duration::from_millis(1));
        s.resolve(&first);

        let late = t0 + TIMEOUT * 2;
        let retry = s.next_query(late).unwrap();
        assert_eq!(retry.key(), second);
        s.record_dispatch(retry, 7, late);

        // Only the fresh dispatch of `second` is in the ring now, and it is not due.
        assert_eq!(s.next_query(late), None);
        assert_eq!(s.in_flight(), 1);
    }

    #[test]
    fn test_max_attempts_abandons_query() {
        let mut s = schedule(&["mail.example.com"], &[A], Some(2));
        let mut now = Instant::now();

        let out = s.next_query(now).unwrap();
        s.record_dispatch(out, 1, now);

        now += TIMEOUT * 2;
        let retry = s.next_query(now).unwrap();
        assert_eq!(retry.attempt, 2);
        s.record_dispatch(retry, 2, now);

        now += TIMEOUT * 2;
        assert_eq!(s.next_query(now), None);
        assert!(s.is_finished());

        let abandoned = s.take_abandoned();
        assert_eq!(
            abandoned,
            vec![Abandoned {
                domain: "mail.example.com".into(),
                qtype: A,
                attempts: 2,
            }]
        );
        assert!(s.take_abandoned().is_empty());
    }

    #[test]
    fn test_never_two_pending_entries_for_one_key() {
        let mut s = schedule(&["x.example.com", "y.example.com"], &[A, CNAME], None);
        let mut now = Instant::now();

        for _ in 0..50 {
            if let Some(out) = s.next_query(now) {
                let key = out.key();
                assert!(s.get(&key).is_none());
                s.record_dispatch(out, 0, now);
            }
            assert!(s.in_flight() <= 4);
            now += Duration::from_millis(130);
        }
    }
}
