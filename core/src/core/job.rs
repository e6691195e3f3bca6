use std::sync::Arc;

use futures::{stream, StreamExt};
use log::{info, warn};

use crate::core::events::{EventBus, LogLevel, ScanEvent};
use crate::core::result_aggregator::{ResultAggregator, StatusRecord};
use crate::core::state::JobStats;
use crate::core::target_manager::RootDomain;
use crate::modules::enumerator::Enumerator;
use crate::modules::prober::{ProbeOutcome, Prober};

/// Scans one root domain: enumerate, then probe every candidate.
///
/// Lifecycle: Enumerating -> Probing -> Completed. A failed enumeration is
/// logged and treated as zero candidates, so every job reaches Completed.
/// Probes may run concurrently (`probe_concurrency`), but outcomes are folded
/// one at a time, so each candidate bumps `checked` exactly once and progress
/// events stay monotonic.
pub struct DomainJob {
    pub(crate) domain: RootDomain,
    pub(crate) stats: Arc<JobStats>,
    pub(crate) enumerator: Arc<dyn Enumerator>,
    pub(crate) prober: Prober,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) aggregator: Arc<ResultAggregator>,
    pub(crate) probe_concurrency: usize,
}

impl DomainJob {
    pub async fn run(self) {
        let domain = self.domain.clone();
        info!("starting job for {}", domain);
        self.bus.publish(ScanEvent::stamped(
            LogLevel::Info,
            format!("Starting subfinder: {}", domain),
        ));

        let candidates = match self.enumerator.enumerate(&domain).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("enumeration failed for {}: {}", domain, e);
                self.bus.publish(ScanEvent::stamped(
                    LogLevel::Error,
                    format!("subfinder failed for {}: {}", domain, e),
                ));
                Vec::new()
            }
        };

        let total = candidates.len();
        self.stats.begin_probing(total);
        self.bus.publish(ScanEvent::DomainInitialized { domain: domain.clone(), total });

        let prober = &self.prober;
        let mut outcomes = stream::iter(candidates)
            .map(|candidate| async move { prober.probe(&candidate).await })
            .buffer_unordered(self.probe_concurrency.max(1));

        while let Some(outcome) = outcomes.next().await {
            self.fold(outcome);
        }

        self.stats.complete();
        info!(
            "finished {}: {}/{} checked, {} found",
            domain,
            self.stats.checked(),
            total,
            self.stats.found()
        );
        self.bus.publish(ScanEvent::stamped(LogLevel::Success, format!("Finished {}", domain)));
    }

    fn fold(&self, outcome: ProbeOutcome) {
        let (checked, found) = self.stats.record(outcome.is_success());

        if let Some(message) = outcome.summary() {
            self.bus.publish(ScanEvent::ResultFound {
                domain: self.domain.clone(),
                message,
            });
        } else if let Some(code) = outcome.status {
            self.aggregator.record(
                code,
                StatusRecord {
                    domain: self.domain.clone(),
                    url: outcome.url.clone(),
                    size: outcome.size,
                },
            );
            self.bus.publish(ScanEvent::StatusObserved {
                domain: self.domain.clone(),
                code,
                url: outcome.url,
                size: outcome.size,
            });
        }

        self.bus.publish(ScanEvent::ProgressUpdate {
            domain: self.domain.clone(),
            checked,
            found,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::JobPhase;
    use crate::core::target_manager::normalize;
    use crate::testing::{FakeEnumerator, FakeFetcher, Reply};
    use std::time::Duration;

    fn job(
        domain: &str,
        enumerator: &FakeEnumerator,
        fetcher: &FakeFetcher,
        probe_concurrency: usize,
    ) -> (DomainJob, Arc<EventBus>, Arc<ResultAggregator>, Arc<JobStats>) {
        let bus = Arc::new(EventBus::new());
        let aggregator = Arc::new(ResultAggregator::new());
        let stats = Arc::new(JobStats::new());
        let job = DomainJob {
            domain: normalize(domain),
            stats: Arc::clone(&stats),
            enumerator: enumerator.shared(),
            prober: Prober::new(fetcher.shared()),
            bus: Arc::clone(&bus),
            aggregator: Arc::clone(&aggregator),
            probe_concurrency,
        };
        (job, bus, aggregator, stats)
    }

    fn drain(stream: &mut crate::core::events::EventStream) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        while let Some(e) = stream.try_recv() {
            events.push(e);
        }
        events
    }

    #[tokio::test]
    async fn test_mixed_outcomes() {
        let enumerator = FakeEnumerator::new()
            .with("example.com", &["ok.example.com", "gone.example.com", "dead.example.com"]);
        let fetcher = FakeFetcher::new()
            .on("https://ok.example.com", Reply::page("https://ok.example.com/", 200, 10))
            .on("https://gone.example.com", Reply::page("https://gone.example.com/x", 410, 3));
        let (job, bus, aggregator, stats) = job("example.com", &enumerator, &fetcher, 1);
        let mut stream = bus.subscribe();

        job.run().await;
        let events = drain(&mut stream);

        let domain = normalize("example.com");
        let progress: Vec<(usize, usize)> = events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::ProgressUpdate { checked, found, .. } => Some((*checked, *found)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(1, 1), (2, 1), (3, 1)]);

        assert!(events.contains(&ScanEvent::DomainInitialized { domain: domain.clone(), total: 3 }));
        assert!(events.contains(&ScanEvent::StatusObserved {
            domain: domain.clone(),
            code: 410,
            url: "https://gone.example.com/x".to_string(),
            size: 3,
        }));
        assert!(events.contains(&ScanEvent::ResultFound {
            domain,
            message: "https://ok.example.com/ [200] | 10 Bytes".to_string(),
        }));

        let rows = aggregator.export_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, 410);

        let snap = stats.snapshot();
        assert_eq!(snap.phase, JobPhase::Completed);
        assert_eq!((snap.total, snap.checked, snap.found), (3, 3, 1));
    }

    #[tokio::test]
    async fn test_event_order_within_job() {
        let enumerator = FakeEnumerator::new().with("example.com", &["a.example.com"]);
        let fetcher = FakeFetcher::new()
            .on("https://a.example.com", Reply::page("https://a.example.com/", 500, 1));
        let (job, bus, _, _) = job("example.com", &enumerator, &fetcher, 1);
        let mut stream = bus.subscribe();

        job.run().await;
        let kinds: Vec<&'static str> = drain(&mut stream)
            .iter()
            .map(|e| match e {
                ScanEvent::Log { .. } => "log",
                ScanEvent::DomainInitialized { .. } => "init",
                ScanEvent::ProgressUpdate { .. } => "progress",
                ScanEvent::ResultFound { .. } => "result",
                ScanEvent::StatusObserved { .. } => "status",
            })
            .collect();
        assert_eq!(kinds, vec!["log", "init", "status", "progress", "log"]);
    }

    #[tokio::test]
    async fn test_log_lines_carry_clock_prefix() {
        let enumerator = FakeEnumerator::new().with("example.com", &[]);
        let fetcher = FakeFetcher::new();
        let (job, bus, _, _) = job("example.com", &enumerator, &fetcher, 1);
        let mut stream = bus.subscribe();

        job.run().await;
        let logs: Vec<String> = drain(&mut stream)
            .into_iter()
            .filter_map(|e| match e {
                ScanEvent::Log { message, .. } => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(logs.len(), 2);
        assert!(logs[0].starts_with('[') && logs[0][9..].starts_with("] Starting subfinder: example.com"));
        assert!(logs[1].starts_with('[') && logs[1].ends_with("] Finished example.com"));
    }

    #[tokio::test]
    async fn test_enumeration_failure_completes_empty() {
        let enumerator = FakeEnumerator::new();
        let fetcher = FakeFetcher::new();
        let (job, bus, aggregator, stats) = job("missing.com", &enumerator, &fetcher, 1);
        let mut stream = bus.subscribe();

        job.run().await;
        let events = drain(&mut stream);

        assert!(events.contains(&ScanEvent::DomainInitialized { domain: normalize("missing.com"), total: 0 }));
        assert!(events.iter().any(|e| matches!(
            e,
            ScanEvent::Log { level: LogLevel::Error, message } if message.contains("subfinder failed for missing.com")
        )));
        assert!(!events.iter().any(|e| matches!(e, ScanEvent::ProgressUpdate { .. })));
        assert!(fetcher.calls().is_empty());
        assert!(aggregator.is_empty());
        assert_eq!(stats.phase(), JobPhase::Completed);
    }

    #[tokio::test]
    async fn test_concurrent_probes_keep_progress_monotonic() {
        let hosts: Vec<String> = (0..20).map(|i| format!("h{}.example.com", i)).collect();
        let host_refs: Vec<&str> = hosts.iter().map(String::as_str).collect();
        let enumerator = FakeEnumerator::new().with("example.com", &host_refs);

        let mut fetcher = FakeFetcher::new();
        for (i, host) in hosts.iter().enumerate() {
            let status = if i % 3 == 0 { 200 } else { 403 };
            let delay = Duration::from_millis(((20 - i) % 7) as u64);
            fetcher = fetcher.on(
                &format!("https://{}", host),
                Reply::page(&format!("https://{}/", host), status, i as u64).delayed(delay),
            );
        }

        let (job, bus, aggregator, stats) = job("example.com", &enumerator, &fetcher, 8);
        let mut stream = bus.subscribe();
        job.run().await;

        let mut last_checked = 0;
        let mut last_found = 0;
        for event in drain(&mut stream) {
            if let ScanEvent::ProgressUpdate { checked, found, .. } = event {
                assert_eq!(checked, last_checked + 1);
                assert!(found >= last_found && found <= checked);
                last_checked = checked;
                last_found = found;
            }
        }
        assert_eq!(last_checked, 20);
        assert_eq!(last_found, 7);
        assert_eq!(aggregator.len(), 13);
        assert_eq!(stats.checked(), stats.total());
    }
}
