use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::domain::TRError;
use crate::record::Record;
use crate::source::DataSource;

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshRequest {
    pub seq: u64,
    pub query: String,
}

/// Fixed-interval refresh trigger bound to the active search text. Requests
/// carry a monotonic sequence number; completions older than the newest
/// applied one, or issued for a different query, are rejected.
pub struct RefreshScheduler {
    interval: Duration,
    next_due: Option<Instant>,
    query: String,
    issued_seq: u64,
    applied_seq: u64,
}

impl RefreshScheduler {
    pub fn new(interval: Duration) -> Self {
        RefreshScheduler {
            interval,
            next_due: None,
            query: String::new(),
            issued_seq: 0,
            applied_seq: 0,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// (Re)arms the timer for `query`. Changing the query restarts the
    /// interval so the next poll fetches against the new text.
    pub fn restart(&mut self, query: &str, now: Instant) {
        if query != self.query {
            debug!("Refresh query changed {:?} -> {:?}", self.query, query);
            self.query = query.to_string();
        }
        self.next_due = Some(now + self.interval);
    }

    pub fn poll(&mut self, now: Instant) -> Option<RefreshRequest> {
        match self.next_due {
            Some(due) if now >= due => Some(self.request_now(now)),
            _ => None,
        }
    }

    /// On-demand refresh. Also pushes the next scheduled one out by a full
    /// interval.
    pub fn request_now(&mut self, now: Instant) -> RefreshRequest {
        self.issued_seq += 1;
        self.next_due = Some(now + self.interval);
        trace!("Issuing refresh #{} for {:?}", self.issued_seq, self.query);
        RefreshRequest {
            seq: self.issued_seq,
            query: self.query.clone(),
        }
    }

    pub fn accept(&mut self, request: &RefreshRequest) -> bool {
        if request.seq <= self.applied_seq || request.query != self.query {
            debug!(
                "Discarding stale refresh #{} ({:?}), applied #{}, query {:?}",
                request.seq, request.query, self.applied_seq, self.query
            );
            return false;
        }
        self.applied_seq = request.seq;
        true
    }

    pub fn shutdown(&mut self) {
        self.next_due = None;
    }
}

pub struct FetchResult {
    pub table: usize,
    pub request: RefreshRequest,
    pub records: Result<Vec<Record>, TRError>,
}

/// Runs fetches on the rayon pool and hands completions back to the UI loop.
pub struct Fetcher {
    tx: Sender<FetchResult>,
    rx: Receiver<FetchResult>,
}

impl Fetcher {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Fetcher { tx, rx }
    }

    pub fn dispatch(&self, table: usize, source: Arc<dyn DataSource>, request: RefreshRequest) {
        let tx = self.tx.clone();
        rayon::spawn(move || {
            let records = source.fetch(&request.query);
            if tx
                .send(FetchResult {
                    table,
                    request,
                    records,
                })
                .is_err()
            {
                warn!("Fetch finished after the model was dropped");
            }
        });
    }

    pub fn completed(&self) -> Vec<FetchResult> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_on_interval_and_rearms() {
        let start = Instant::now();
        let interval = Duration::from_secs(30);
        let mut scheduler = RefreshScheduler::new(interval);
        assert_eq!(scheduler.poll(start + interval), None);
        scheduler.restart("dave", start);
        assert_eq!(scheduler.poll(start + Duration::from_secs(29)), None);
        let first = scheduler.poll(start + interval).unwrap();
        assert_eq!(first.query, "dave");
        assert_eq!(scheduler.poll(start + interval + Duration::from_secs(1)), None);
        let second = scheduler.poll(start + interval * 2).unwrap();
        assert!(second.seq > first.seq);
    }

    #[test]
    fn query_change_restarts_interval() {
        let start = Instant::now();
        let interval = Duration::from_secs(10);
        let mut scheduler = RefreshScheduler::new(interval);
        scheduler.restart("", start);
        scheduler.restart("anna", start + Duration::from_secs(8));
        assert_eq!(scheduler.poll(start + interval), None);
        let request = scheduler.poll(start + Duration::from_secs(18)).unwrap();
        assert_eq!(request.query, "anna");
    }

    #[test]
    fn out_of_order_completions_are_discarded() {
        let start = Instant::now();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(10));
        scheduler.restart("", start);
        let older = scheduler.request_now(start);
        let newer = scheduler.request_now(start);
        assert!(scheduler.accept(&newer));
        assert!(!scheduler.accept(&older));
        assert!(!scheduler.accept(&newer));
    }

    #[test]
    fn completion_for_previous_query_is_discarded() {
        let start = Instant::now();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(10));
        scheduler.restart("dave", start);
        let request = scheduler.request_now(start);
        scheduler.restart("anna", start);
        assert!(!scheduler.accept(&request));
    }

    #[test]
    fn shutdown_clears_the_timer() {
        let start = Instant::now();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(1));
        scheduler.restart("", start);
        scheduler.shutdown();
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.poll(start + Duration::from_secs(60)), None);
    }
}
