//! Background fetching.
//!
//! A single worker thread owns the data source and serves requests in the
//! order they were sent, so the UI thread never blocks on the network.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{debug, trace, warn};

use crate::domain::DashError;
use crate::snapshot::StatusSnapshot;
use crate::source::{DataSource, save_export};

#[derive(Debug)]
enum Request {
    Status(u64),
    Logs,
    Export,
}

#[derive(Debug)]
pub enum Response {
    Status {
        seq: u64,
        result: Result<StatusSnapshot, DashError>,
    },
    Logs(Result<Vec<String>, DashError>),
    Export(Result<PathBuf, DashError>),
}

pub struct Fetcher {
    tx: Sender<Request>,
    rx: Receiver<Response>,
    next_seq: u64,
    in_flight: usize,
}

impl Fetcher {
    pub fn spawn(source: Box<dyn DataSource>, export_dir: PathBuf) -> Self {
        let (tx, requests) = mpsc::channel::<Request>();
        let (responses, rx) = mpsc::channel::<Response>();

        thread::spawn(move || {
            // Ends once the Fetcher (and with it the request sender) is dropped
            for request in requests {
                trace!("Worker got {request:?}");
                let response = match request {
                    Request::Status(seq) => Response::Status {
                        seq,
                        result: source.fetch_status(),
                    },
                    Request::Logs => Response::Logs(source.fetch_logs()),
                    Request::Export => Response::Export(
                        source
                            .fetch_export()
                            .and_then(|bytes| save_export(&export_dir, Local::now().date_naive(), &bytes)),
                    ),
                };
                if responses.send(response).is_err() {
                    break;
                }
            }
            debug!("Fetch worker stopped");
        });

        Fetcher {
            tx,
            rx,
            next_seq: 0,
            in_flight: 0,
        }
    }

    /// Queues a status fetch and returns its sequence number.
    pub fn request_status(&mut self) -> Result<u64, DashError> {
        self.next_seq += 1;
        self.send(Request::Status(self.next_seq))?;
        Ok(self.next_seq)
    }

    pub fn request_logs(&mut self) -> Result<(), DashError> {
        self.send(Request::Logs)
    }

    pub fn request_export(&mut self) -> Result<(), DashError> {
        self.send(Request::Export)
    }

    fn send(&mut self, request: Request) -> Result<(), DashError> {
        self.tx.send(request).map_err(|_| DashError::WorkerGone)?;
        self.in_flight += 1;
        Ok(())
    }

    /// Everything the worker has finished so far, in completion order.
    pub fn drain(&mut self) -> Vec<Response> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(response) => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    out.push(response);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.in_flight > 0 {
                        warn!("Fetch worker disconnected with {} requests pending", self.in_flight);
                        self.in_flight = 0;
                    }
                    break;
                }
            }
        }
        out
    }

    pub fn busy(&self) -> bool {
        self.in_flight > 0
    }
}

/// Fixed-period schedule driven by the event loop.
#[derive(Debug, Clone)]
pub struct Cadence {
    period: Duration,
    last: Option<Instant>,
}

impl Cadence {
    pub fn new(period: Duration) -> Self {
        Cadence { period, last: None }
    }

    pub fn due(&self, now: Instant) -> bool {
        match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.period,
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn next_at(&self) -> Option<Instant> {
        self.last.map(|l| l + self.period)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::record::{LinkRecord, LinkStatus};
    use crate::snapshot::Summary;
    use std::sync::{Arc, Mutex};

    /// Scriptable in-memory source shared by the poller and model tests.
    #[derive(Clone, Default)]
    pub(crate) struct FakeSource {
        pub(crate) links: Arc<Mutex<Option<Vec<LinkRecord>>>>,
        pub(crate) logs: Arc<Mutex<Vec<String>>>,
    }

    impl FakeSource {
        pub(crate) fn with_links(n: usize) -> Self {
            let source = FakeSource::default();
            source.set_links(Some(n));
            source
        }

        /// `None` makes the next status fetches fail.
        pub(crate) fn set_links(&self, n: Option<usize>) {
            let links = n.map(|n| {
                (0..n)
                    .map(|i| LinkRecord::new(&format!("https://l{i:02}.com"), LinkStatus::Success, true, true, ""))
                    .collect()
            });
            *self.links.lock().unwrap() = links;
        }
    }

    impl DataSource for FakeSource {
        fn fetch_status(&self) -> Result<StatusSnapshot, DashError> {
            match self.links.lock().unwrap().clone() {
                Some(links) => Ok(StatusSnapshot {
                    summary: Summary {
                        total_links: links.len() as u64,
                        ..Summary::default()
                    },
                    links,
                    malformed: 0,
                }),
                None => Err(DashError::HttpStatus {
                    endpoint: "/api/status".into(),
                    status: 503,
                }),
            }
        }

        fn fetch_logs(&self) -> Result<Vec<String>, DashError> {
            Ok(self.logs.lock().unwrap().clone())
        }

        fn fetch_export(&self) -> Result<Vec<u8>, DashError> {
            Ok(b"URL,Status\n".to_vec())
        }
    }

    pub(crate) fn wait_for<T>(mut poll: impl FnMut() -> Option<T>) -> T {
        for _ in 0..500 {
            if let Some(v) = poll() {
                return v;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("timed out waiting for background work");
    }

    #[test]
    fn responses_arrive_in_request_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut fetcher = Fetcher::spawn(Box::new(FakeSource::with_links(3)), dir.path().to_path_buf());

        assert_eq!(fetcher.request_status().unwrap(), 1);
        fetcher.request_logs().unwrap();
        assert_eq!(fetcher.request_status().unwrap(), 2);
        assert!(fetcher.busy());

        let mut got = Vec::new();
        wait_for(|| {
            got.extend(fetcher.drain());
            (got.len() == 3).then_some(())
        });

        assert!(matches!(&got[0], Response::Status { seq: 1, result: Ok(s) } if s.links.len() == 3));
        assert!(matches!(&got[1], Response::Logs(Ok(_))));
        assert!(matches!(&got[2], Response::Status { seq: 2, .. }));
        assert!(!fetcher.busy());
    }

    #[test]
    fn export_lands_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut fetcher = Fetcher::spawn(Box::new(FakeSource::default()), dir.path().to_path_buf());
        fetcher.request_export().unwrap();

        let path = wait_for(|| {
            fetcher.drain().into_iter().find_map(|r| match r {
                Response::Export(result) => Some(result.unwrap()),
                _ => None,
            })
        });
        assert!(path.starts_with(dir.path()));
        assert_eq!(std::fs::read(path).unwrap(), b"URL,Status\n");
    }

    #[test]
    fn cadence_fires_once_per_period() {
        let start = Instant::now();
        let mut c = Cadence::new(Duration::from_secs(30));
        assert!(c.due(start));
        c.mark(start);
        assert!(!c.due(start + Duration::from_secs(29)));
        assert!(c.due(start + Duration::from_secs(30)));
        assert_eq!(c.next_at(), Some(start + Duration::from_secs(30)));
        c.reset();
        assert!(c.due(start));
    }
}
