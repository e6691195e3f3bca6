use std::sync::{Arc, Mutex};

use log::{debug, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::core::events::{EventBus, EventStream};
use crate::core::job::DomainJob;
use crate::core::result_aggregator::ResultAggregator;
use crate::core::state::{JobSnapshot, JobStats};
use crate::core::target_manager::{RootDomain, TargetManager};
use crate::http::{Fetcher, HttpClient};
use crate::modules::enumerator::{Enumerator, SubfinderEnumerator};
use crate::modules::prober::Prober;
use crate::{ConfigError, ScanConfig};

/// Concurrency knobs for a scan session.
#[derive(Debug, Clone, Copy)]
pub struct ScanLimits {
    /// Domain jobs allowed to run at once; 0 means unbounded.
    pub max_domains: usize,
    /// In-flight probes inside one job.
    pub probe_concurrency: usize,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            max_domains: 0,
            probe_concurrency: 1,
        }
    }
}

/// Owns every domain job of a session.
///
/// 1. `submit` normalizes raw input and skips domains the session has seen
/// 2. Each new domain gets its stats registered and a job spawned right away
/// 3. Jobs run independently and report through the shared `EventBus`
/// 4. Non-200 outcomes from all jobs land in one `ResultAggregator`
///
/// Must be used from within a Tokio runtime.
pub struct ScanOrchestrator {
    targets: Mutex<TargetManager>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    enumerator: Arc<dyn Enumerator>,
    prober: Prober,
    bus: Arc<EventBus>,
    aggregator: Arc<ResultAggregator>,
    limiter: Option<Arc<Semaphore>>,
    probe_concurrency: usize,
}

impl ScanOrchestrator {
    pub fn new(enumerator: Arc<dyn Enumerator>, fetcher: Arc<dyn Fetcher>, limits: ScanLimits) -> Self {
        let limiter = (limits.max_domains > 0).then(|| Arc::new(Semaphore::new(limits.max_domains)));
        Self {
            targets: Mutex::new(TargetManager::new()),
            handles: Mutex::new(Vec::new()),
            enumerator,
            prober: Prober::new(fetcher),
            bus: Arc::new(EventBus::new()),
            aggregator: Arc::new(ResultAggregator::new()),
            limiter,
            probe_concurrency: limits.probe_concurrency.max(1),
        }
    }

    /// Builds the live subfinder + reqwest stack from a config.
    pub fn from_config(config: &ScanConfig) -> Result<Self, ConfigError> {
        let client = HttpClient::new(&config.http_options())?;
        let enumerator = match config.subfinder_ref() {
            Some(path) => SubfinderEnumerator::with_binary(path),
            None => SubfinderEnumerator::new(),
        };
        Ok(Self::new(Arc::new(enumerator), Arc::new(client), config.limits()))
    }

    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    pub fn subscribe(&self) -> EventStream {
        self.bus.subscribe()
    }

    pub fn aggregator(&self) -> Arc<ResultAggregator> {
        Arc::clone(&self.aggregator)
    }

    /// Starts one job per new normalized domain and returns the domains that
    /// were started. Never waits for a job.
    pub fn submit<I, S>(&self, raw_domains: I) -> Vec<RootDomain>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut started = Vec::new();
        for raw in raw_domains {
            let domain = RootDomain::normalize(raw.as_ref());
            let stats = {
                let mut targets = self.targets.lock().unwrap_or_else(|e| e.into_inner());
                targets.register(&domain)
            };
            let Some(stats) = stats else {
                debug!("skipping '{}': empty or already submitted", domain);
                continue;
            };

            let handle = self.spawn_job(domain.clone(), stats);
            self.handles.lock().unwrap_or_else(|e| e.into_inner()).push(handle);
            started.push(domain);
        }
        started
    }

    fn spawn_job(&self, domain: RootDomain, stats: Arc<JobStats>) -> JoinHandle<()> {
        let job = DomainJob {
            domain,
            stats,
            enumerator: Arc::clone(&self.enumerator),
            prober: self.prober.clone(),
            bus: Arc::clone(&self.bus),
            aggregator: Arc::clone(&self.aggregator),
            probe_concurrency: self.probe_concurrency,
        };
        let limiter = self.limiter.clone();

        tokio::spawn(async move {
            let _permit = match limiter {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };
            job.run().await;
        })
    }

    /// Stats handle for a submitted domain (raw input is normalized first).
    pub fn stats(&self, domain: &str) -> Option<Arc<JobStats>> {
        let domain = RootDomain::normalize(domain);
        self.targets.lock().unwrap_or_else(|e| e.into_inner()).stats(&domain)
    }

    /// Every job of the session with its current counters, in submission order.
    pub fn jobs(&self) -> Vec<(RootDomain, JobSnapshot)> {
        self.targets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries()
            .into_iter()
            .map(|(domain, stats)| (domain, stats.snapshot()))
            .collect()
    }

    /// Waits until every job submitted so far has completed.
    pub async fn wait(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> = {
                let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
                handles.drain(..).collect()
            };
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    warn!("domain job ended abnormally: {}", e);
                }
            }
        }
    }
}
