use reqwest::Client;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counters for the backend HTTP pool
#[derive(Debug, Default)]
pub struct RequestMetrics {
    pub total_requests: AtomicU64,
    pub failed_requests: AtomicU64,
    /// Requests currently holding a pool slot
    pub active_requests: AtomicUsize,
    pub peak_concurrent: AtomicUsize,
}

impl RequestMetrics {
    pub fn summary(&self) -> String {
        format!(
            "Requests - Total: {}, Failed: {}, Active: {}, Peak: {}",
            self.total_requests.load(Ordering::Relaxed),
            self.failed_requests.load(Ordering::Relaxed),
            self.active_requests.load(Ordering::Relaxed),
            self.peak_concurrent.load(Ordering::Relaxed),
        )
    }
}

#[derive(Debug, Error)]
pub enum ReqManagerError {
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Request pool closed")]
    Closed,
}

/// Configuration for the HTTP request manager
#[derive(Debug, Clone)]
pub struct ReqManagerConfig {
    /// Maximum number of concurrent requests
    pub max_concurrent_requests: usize,
    /// Keep-alive interval for HTTP/2 connections
    pub http2_keep_alive_interval: Duration,
    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,
    /// TCP keep-alive duration
    pub tcp_keepalive: Duration,
    pub connect_timeout: Duration,
    /// Upper bound on a whole request, streamed body included
    pub request_timeout: Duration,
}

impl Default for ReqManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            http2_keep_alive_interval: Duration::from_secs(3),
            pool_max_idle_per_host: 64,
            tcp_keepalive: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Shared HTTP client with a concurrency cap, used by every call's LLM and
/// TTS requests.
///
/// # Example
/// ```rust,no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use receptionist::utils::req_manager::ReqManager;
///
/// let manager = ReqManager::new(10)?;
/// let guard = manager.acquire().await?;
/// let response = guard.client().get("https://api.openai.com/v1/models").send().await?;
/// println!("{} ({})", response.status(), manager.metrics().summary());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ReqManager {
    max_concurrent_requests: usize,
    client: Client,
    semaphore: Arc<Semaphore>,
    metrics: Arc<RequestMetrics>,
}

/// Holds one pool slot until dropped.
///
/// Owned so it can travel into the task that drains a streamed response.
#[derive(Debug)]
pub struct ClientGuard {
    client: Client,
    metrics: Arc<RequestMetrics>,
    _permit: OwnedSemaphorePermit,
}

impl ClientGuard {
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Record the outcome of a request made with this guard
    pub fn record<T, E>(&self, result: &Result<T, E>) {
        self.metrics.total_requests.fetch_add(1, Ordering::Relaxed);
        if result.is_err() {
            self.metrics.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.metrics.active_requests.fetch_sub(1, Ordering::Relaxed);
    }
}

impl ReqManager {
    pub fn new(max_concurrent_requests: usize) -> Result<Self, ReqManagerError> {
        Self::with_config(ReqManagerConfig {
            max_concurrent_requests,
            ..Default::default()
        })
    }

    pub fn with_config(config: ReqManagerConfig) -> Result<Self, ReqManagerError> {
        if config.max_concurrent_requests == 0 {
            return Err(ReqManagerError::InvalidConfig(
                "max_concurrent_requests must be greater than 0".to_string(),
            ));
        }
        if config.max_concurrent_requests > 1000 {
            return Err(ReqManagerError::InvalidConfig(
                "max_concurrent_requests must not exceed 1000".to_string(),
            ));
        }

        let client = Client::builder()
            .http2_keep_alive_interval(Some(config.http2_keep_alive_interval))
            .http2_keep_alive_while_idle(true)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .tcp_keepalive(config.tcp_keepalive)
            .tcp_nodelay(true)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(concat!("receptionist/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            max_concurrent_requests: config.max_concurrent_requests,
            client,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_requests)),
            metrics: Arc::new(RequestMetrics::default()),
        })
    }

    /// Wait for a free slot and hand out the shared client.
    pub async fn acquire(&self) -> Result<ClientGuard, ReqManagerError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ReqManagerError::Closed)?;

        let active = self.metrics.active_requests.fetch_add(1, Ordering::Relaxed) + 1;
        self.metrics
            .peak_concurrent
            .fetch_max(active, Ordering::Relaxed);

        Ok(ClientGuard {
            client: self.client.clone(),
            metrics: Arc::clone(&self.metrics),
            _permit: permit,
        })
    }

    pub fn available_count(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent_requests
    }

    pub fn active_requests(&self) -> usize {
        self.metrics.active_requests.load(Ordering::Relaxed)
    }

    pub fn metrics(&self) -> &RequestMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn test_req_manager_creation() {
        let manager = ReqManager::new(3).unwrap();
        assert_eq!(manager.max_concurrent(), 3);
        assert_eq!(manager.active_requests(), 0);
        assert_eq!(manager.available_count(), 3);
    }

    #[tokio::test]
    async fn test_req_manager_rejects_bad_limits() {
        assert!(matches!(
            ReqManager::new(0),
            Err(ReqManagerError::InvalidConfig(_))
        ));
        assert!(ReqManager::new(1001).is_err());
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let manager = ReqManager::new(2).unwrap();

        let guard1 = manager.acquire().await.unwrap();
        let guard2 = manager.acquire().await.unwrap();
        assert_eq!(manager.active_requests(), 2);
        assert_eq!(manager.available_count(), 0);

        // A third acquire must wait for a slot
        assert!(
            timeout(Duration::from_millis(20), manager.acquire())
                .await
                .is_err()
        );

        drop(guard1);
        let _guard3 = manager.acquire().await.unwrap();
        assert_eq!(manager.metrics().peak_concurrent.load(Ordering::Relaxed), 2);
        drop(guard2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_limited() {
        let manager = Arc::new(ReqManager::new(2).unwrap());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let manager = manager.clone();
            let in_flight = in_flight.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = manager.acquire().await.unwrap();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
        assert_eq!(manager.active_requests(), 0);
    }

    #[tokio::test]
    async fn test_guard_records_outcomes() {
        let manager = ReqManager::new(1).unwrap();
        let guard = manager.acquire().await.unwrap();
        guard.record::<(), ()>(&Ok(()));
        guard.record::<(), ()>(&Err(()));

        assert_eq!(manager.metrics().total_requests.load(Ordering::Relaxed), 2);
        assert_eq!(manager.metrics().failed_requests.load(Ordering::Relaxed), 1);
        assert!(manager.metrics().summary().contains("Failed: 1"));
    }
}
