//! Plan generation orchestrator.
//!
//! Composes the cache, client, parser, and metrics into `generate_plan`.
//! Every failure mode (missing credential, transport, total parse failure)
//! degrades to the deterministic mock plan; the caller never sees an error
//! and `parse_status` is the only degradation signal.
//!
//! Cache and metrics live behind short-lived `parking_lot` locks that are
//! never held across an await. Two concurrent requests for the same
//! not-yet-cached goal can both miss and both call the API; there is no
//! single-flight coalescing.

use crate::cache::{CacheStats, PlanCache};
use crate::client::GenerationClient;
use crate::config::{GenerationConfig, SWEEP_INTERVAL};
use crate::error::PlanError;
use crate::metrics::{CostEstimate, MetricsAggregator, MetricsSnapshot, RequestEvent};
use crate::parser::parse_tasks;
use crate::plan::{mock_plan, GenerationResult, ParseStatus, PlanResponse};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Per-request options. `save` and `user_id` are opaque passthroughs for the
/// HTTP layer; this core only looks at `skip_cache`.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub skip_cache: bool,
    pub save: bool,
    pub user_id: Option<String>,
}

/// Dependency-injected pipeline state: one instance per process, created at
/// startup and shared by reference. No ambient globals.
pub struct PlanService {
    client: GenerationClient,
    cache: Mutex<PlanCache>,
    metrics: Mutex<MetricsAggregator>,
}

impl PlanService {
    pub fn new(client: GenerationClient) -> Self {
        Self {
            client,
            cache: Mutex::new(PlanCache::new()),
            metrics: Mutex::new(MetricsAggregator::new()),
        }
    }

    pub fn with_cache(client: GenerationClient, cache: PlanCache) -> Self {
        Self {
            client,
            cache: Mutex::new(cache),
            metrics: Mutex::new(MetricsAggregator::new()),
        }
    }

    /// Build a service from environment configuration.
    pub fn from_env() -> Result<Self, PlanError> {
        let config = GenerationConfig::from_env();
        Ok(Self::new(GenerationClient::from_config(&config)?))
    }

    /// Generate a plan for a goal: cache lookup, else client call and tiered
    /// parse, else mock fallback. Never fails; population of the cache
    /// happens before the metrics record for the same call.
    pub async fn generate_plan(&self, goal: &str, opts: &GenerateOptions) -> PlanResponse {
        let goal = goal.trim();
        self.metrics.lock().record_request(RequestEvent::generate(goal));
        info!(goal, skip_cache = opts.skip_cache, "generating plan");

        if !opts.skip_cache {
            let cached = self.cache.lock().get(goal);
            if let Some(result) = cached {
                info!(goal, "plan served from cache");
                self.metrics.lock().record_ai_call(
                    result.parse_status,
                    result.latency_ms,
                    result.tasks.len(),
                    true,
                );
                return PlanResponse {
                    result,
                    cached: true,
                };
            }
        }

        let started = Instant::now();
        let result = match self.client.call(goal).await {
            Ok(text) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                match parse_tasks(&text) {
                    Some((tasks, parse_status)) => {
                        info!(
                            latency_ms,
                            parse_status = parse_status.as_str(),
                            task_count = tasks.len(),
                            "plan generated"
                        );
                        GenerationResult {
                            tasks,
                            raw: text,
                            parse_status,
                            ai_model: self.client.model().to_string(),
                            latency_ms,
                        }
                    }
                    None => {
                        warn!(latency_ms, "model output unparseable, returning mock plan");
                        self.mock_result(&PlanError::ParseFailed.to_string(), latency_ms)
                    }
                }
            }
            Err(err) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                warn!(error = %err, latency_ms, "generation failed, returning mock plan");
                self.mock_result(&err.to_string(), latency_ms)
            }
        };

        self.cache.lock().insert(goal, result.clone(), None);
        self.metrics.lock().record_ai_call(
            result.parse_status,
            result.latency_ms,
            result.tasks.len(),
            false,
        );

        PlanResponse {
            result,
            cached: false,
        }
    }

    fn mock_result(&self, reason: &str, latency_ms: u64) -> GenerationResult {
        GenerationResult {
            tasks: mock_plan(),
            raw: format!("mock (error: {})", reason),
            parse_status: ParseStatus::Mock,
            ai_model: self.client.model().to_string(),
            latency_ms,
        }
    }

    /// Spawn the periodic expired-entry sweeper. The handle can be aborted
    /// at shutdown; the task otherwise runs for the process lifetime.
    pub fn spawn_cache_sweeper(self: Arc<Self>, interval: Option<Duration>) -> JoinHandle<()> {
        let service = self;
        let period = interval.unwrap_or(SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // An interval's first tick fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                service.cache.lock().cleanup();
            }
        })
    }

    pub fn record_error(&self, status_code: u16, message: &str) {
        self.metrics.lock().record_error(status_code, message);
    }

    pub fn record_success(&self, status_code: u16) {
        self.metrics.lock().record_success(status_code);
    }

    // Read surface for the stats endpoint. Pure reads, no mutation.

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.lock().snapshot()
    }

    pub fn estimate_costs(&self) -> CostEstimate {
        self.metrics.lock().estimate_costs()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::MockBackend;
    use crate::config::{CACHE_TTL, MAX_RETRIES};
    use crate::plan::TaskStatus;

    const THREE_TASK_JSON: &str = r#"[
        { "name": "Find a teacher", "dependsOn": [], "duration": "1 week", "deadline": "" },
        { "name": "Buy a keyboard", "dependsOn": [], "duration": "2 days", "deadline": "" },
        { "name": "Practice scales", "dependsOn": ["Find a teacher", "Buy a keyboard"], "duration": "4 weeks", "deadline": "" }
    ]"#;

    fn service_with(outcomes: Vec<Result<String, PlanError>>) -> (Arc<MockBackend>, PlanService) {
        let backend = Arc::new(MockBackend::new(outcomes));
        let client = GenerationClient::new(backend.clone(), "gemini-2.0-flash-001", MAX_RETRIES);
        (backend, PlanService::new(client))
    }

    #[tokio::test]
    async fn json_response_produces_json_parse_status() {
        let (_, service) = service_with(vec![Ok(THREE_TASK_JSON.to_string())]);

        let response = service
            .generate_plan("Learn to play piano", &GenerateOptions::default())
            .await;

        assert!(!response.cached);
        assert_eq!(response.result.parse_status, ParseStatus::Json);
        assert_eq!(response.result.tasks.len(), 3);
        assert_eq!(response.result.tasks[0].status, TaskStatus::Todo);
        assert_eq!(response.result.raw, THREE_TASK_JSON);
    }

    #[tokio::test]
    async fn second_identical_goal_is_served_from_cache() {
        let (backend, service) = service_with(vec![Ok(THREE_TASK_JSON.to_string())]);

        let first = service
            .generate_plan("Learn to play piano", &GenerateOptions::default())
            .await;
        let second = service
            .generate_plan("Learn to play piano", &GenerateOptions::default())
            .await;

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(second.result.tasks, first.result.tasks);
        assert_eq!(backend.calls(), 1);

        let snapshot = service.metrics_snapshot();
        assert_eq!(snapshot.summary.total_ai_calls, 1);
        assert_eq!(snapshot.summary.total_cached_responses, 1);
    }

    #[tokio::test]
    async fn normalized_goal_variants_hit_the_same_entry() {
        let (backend, service) = service_with(vec![Ok(THREE_TASK_JSON.to_string())]);

        service
            .generate_plan("Learn Piano", &GenerateOptions::default())
            .await;
        let response = service
            .generate_plan("  learn   PIANO ", &GenerateOptions::default())
            .await;

        assert!(response.cached);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn skip_cache_forces_a_fresh_call() {
        let (backend, service) = service_with(vec![
            Ok(THREE_TASK_JSON.to_string()),
            Ok(THREE_TASK_JSON.to_string()),
        ]);
        let opts = GenerateOptions {
            skip_cache: true,
            ..GenerateOptions::default()
        };

        service.generate_plan("Learn to play piano", &opts).await;
        let response = service.generate_plan("Learn to play piano", &opts).await;

        assert!(!response.cached);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn text_response_falls_back_to_heuristic_tier() {
        let raw = "Here is your plan:\n1. Draft outline - 2 days\n2. Write chapters - 3 weeks";
        let (_, service) = service_with(vec![Ok(raw.to_string())]);

        let response = service
            .generate_plan("Write a book", &GenerateOptions::default())
            .await;

        assert_eq!(response.result.parse_status, ParseStatus::Text);
        assert_eq!(response.result.tasks[0].name, "Draft outline");
        assert_eq!(response.result.tasks[0].duration, "2 days");
    }

    #[tokio::test]
    async fn missing_credential_degrades_to_mock_plan() {
        let (backend, service) = service_with(vec![Err(PlanError::MissingCredential)]);

        let response = service
            .generate_plan("Launch a startup", &GenerateOptions::default())
            .await;

        assert_eq!(backend.calls(), 1);
        assert_eq!(response.result.parse_status, ParseStatus::Mock);
        assert!(response.result.raw.starts_with("mock (error:"));

        let names: Vec<&str> = response.result.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Research and define target market",
                "Design MVP",
                "Build MVP",
                "Test & iterate"
            ]
        );
        for pair in response.result.tasks.windows(2) {
            assert_eq!(pair[1].depends_on, vec![pair[0].name.clone()]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_degrades_after_retries() {
        let (backend, service) = service_with(vec![
            Err(PlanError::Transport("down".into())),
            Err(PlanError::Transport("down".into())),
            Err(PlanError::Transport("down".into())),
        ]);

        let response = service
            .generate_plan("Launch a startup", &GenerateOptions::default())
            .await;

        assert_eq!(backend.calls(), 1 + MAX_RETRIES as usize);
        assert_eq!(response.result.parse_status, ParseStatus::Mock);
        assert_eq!(response.result.tasks.len(), 4);

        let snapshot = service.metrics_snapshot();
        assert_eq!(snapshot.summary.total_mock_responses, 1);
    }

    #[tokio::test]
    async fn unparseable_output_degrades_to_mock_plan() {
        let (_, service) = service_with(vec![Ok("I cannot help with that.".to_string())]);

        let response = service
            .generate_plan("Launch a startup", &GenerateOptions::default())
            .await;

        assert_eq!(response.result.parse_status, ParseStatus::Mock);
        assert!(response.result.raw.contains("could not be parsed"));
    }

    #[tokio::test]
    async fn degraded_results_are_cached_like_any_other() {
        let (backend, service) = service_with(vec![Err(PlanError::MissingCredential)]);

        let first = service
            .generate_plan("Launch a startup", &GenerateOptions::default())
            .await;
        let second = service
            .generate_plan("Launch a startup", &GenerateOptions::default())
            .await;

        assert_eq!(first.result.parse_status, ParseStatus::Mock);
        assert!(second.cached);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn stats_surface_reflects_activity() {
        let (_, service) = service_with(vec![Ok(THREE_TASK_JSON.to_string())]);

        service
            .generate_plan("Learn to play piano", &GenerateOptions::default())
            .await;
        service
            .generate_plan("Learn to play piano", &GenerateOptions::default())
            .await;
        service.record_success(200);
        service.record_success(200);

        let cache_stats = service.cache_stats();
        assert_eq!(cache_stats.hits, 1);
        assert_eq!(cache_stats.size, 1);

        let snapshot = service.metrics_snapshot();
        assert_eq!(snapshot.summary.total_requests, 2);
        assert_eq!(snapshot.summary.cache_hit_rate, "50.00%");
        assert_eq!(snapshot.status_codes.get(&200), Some(&2));

        let costs = service.estimate_costs();
        assert_eq!(costs.ai_calls_made, 1);
        assert_eq!(costs.cached_responses_served, 1);
    }

    // Real time on purpose: entry expiry is measured with std Instants,
    // which the paused tokio clock does not advance.
    #[tokio::test]
    async fn sweeper_removes_expired_entries() {
        let backend = Arc::new(MockBackend::new(vec![Ok(THREE_TASK_JSON.to_string())]));
        let client = GenerationClient::new(backend, "gemini-2.0-flash-001", MAX_RETRIES);
        let service = Arc::new(PlanService::with_cache(
            client,
            PlanCache::with_capacity(10, Duration::from_millis(50)),
        ));

        service
            .generate_plan("Learn to play piano", &GenerateOptions::default())
            .await;
        assert_eq!(service.cache_stats().size, 1);

        let sweeper = Arc::clone(&service).spawn_cache_sweeper(Some(Duration::from_millis(100)));
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(service.cache_stats().size, 0);
        sweeper.abort();
    }

    #[test]
    fn default_cache_ttl_is_one_hour() {
        assert_eq!(CACHE_TTL, Duration::from_millis(3_600_000));
    }
}
