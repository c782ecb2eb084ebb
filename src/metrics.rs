//! Usage metrics for the generation pipeline.
//!
//! Process-lifetime counters plus a bounded most-recent-first activity
//! buffer, derived into summary statistics on read. Nothing here persists
//! across restarts.

use crate::plan::ParseStatus;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Estimated cost per Gemini Flash call, in dollars. Purely illustrative.
const COST_PER_CALL: f64 = 0.001;

/// How many recent events the activity buffer keeps.
const MAX_RECENT_EVENTS: usize = 100;

/// One recorded pipeline event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEvent {
    pub timestamp: String,

    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,

    #[serde(rename = "statusCode", skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RequestEvent {
    fn now_timestamp() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn generate(goal: impl Into<String>) -> Self {
        Self {
            timestamp: Self::now_timestamp(),
            event_type: "generate-plan".to_string(),
            goal: Some(goal.into()),
            status_code: None,
            message: None,
        }
    }

    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            timestamp: Self::now_timestamp(),
            event_type: "error".to_string(),
            goal: None,
            status_code: Some(status_code),
            message: Some(message.into()),
        }
    }
}

/// Derived headline counters and rates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub total_requests: u64,
    pub total_ai_calls: u64,
    pub total_cached_responses: u64,
    pub total_mock_responses: u64,
    pub total_errors: u64,
    pub success_rate: String,
    pub cache_hit_rate: String,
}

/// Derived latency and plan-size figures.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsPerformance {
    pub average_latency_ms: u64,
    pub total_latency_ms: u64,
    pub average_tasks_per_plan: String,
}

/// Full derived view over the aggregator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub summary: MetricsSummary,
    pub performance: MetricsPerformance,
    pub parse_status: HashMap<ParseStatus, u64>,
    pub status_codes: HashMap<u16, u64>,
    pub requests_by_hour: HashMap<String, u64>,
    pub recent_requests: Vec<RequestEvent>,
}

/// Illustrative cost figures derived from call counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub estimated_total_cost: String,
    pub estimated_saved_cost: String,
    pub ai_calls_made: u64,
    pub cached_responses_served: u64,
    pub note: String,
}

/// Process-wide usage aggregator.
pub struct MetricsAggregator {
    total_requests: u64,
    total_ai_calls: u64,
    total_cached_responses: u64,
    total_mock_responses: u64,
    total_errors: u64,
    total_latency_ms: u64,
    total_plans_generated: u64,
    average_tasks_per_plan: f64,
    parse_status_counts: HashMap<ParseStatus, u64>,
    status_codes: HashMap<u16, u64>,
    requests_by_hour: HashMap<String, u64>,
    /// Most recent first; oldest events fall off the back.
    recent_requests: VecDeque<RequestEvent>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self {
            total_requests: 0,
            total_ai_calls: 0,
            total_cached_responses: 0,
            total_mock_responses: 0,
            total_errors: 0,
            total_latency_ms: 0,
            total_plans_generated: 0,
            average_tasks_per_plan: 0.0,
            parse_status_counts: HashMap::new(),
            status_codes: HashMap::new(),
            requests_by_hour: HashMap::new(),
            recent_requests: VecDeque::new(),
        }
    }

    /// Record an incoming request: bumps the total, buckets it into the
    /// current hour, and prepends it to the activity buffer.
    pub fn record_request(&mut self, event: RequestEvent) {
        self.total_requests += 1;

        let hour = Utc::now().format("%Y-%m-%dT%H").to_string();
        *self.requests_by_hour.entry(hour).or_insert(0) += 1;

        self.recent_requests.push_front(event);
        if self.recent_requests.len() > MAX_RECENT_EVENTS {
            self.recent_requests.pop_back();
        }
    }

    /// Record the outcome of one generation, cached or fresh.
    pub fn record_ai_call(
        &mut self,
        parse_status: ParseStatus,
        latency_ms: u64,
        task_count: usize,
        cached: bool,
    ) {
        if cached {
            self.total_cached_responses += 1;
        } else {
            self.total_ai_calls += 1;
        }

        *self.parse_status_counts.entry(parse_status).or_insert(0) += 1;
        if parse_status == ParseStatus::Mock {
            self.total_mock_responses += 1;
        }

        self.total_latency_ms += latency_ms;

        if task_count > 0 {
            let prev_total = self.average_tasks_per_plan * self.total_plans_generated as f64;
            self.total_plans_generated += 1;
            self.average_tasks_per_plan =
                (prev_total + task_count as f64) / self.total_plans_generated as f64;
        }
    }

    /// Record a failed request. Also counts as a request and lands in the
    /// activity buffer as a `type: error` event.
    pub fn record_error(&mut self, status_code: u16, message: impl Into<String>) {
        self.total_errors += 1;
        *self.status_codes.entry(status_code).or_insert(0) += 1;
        self.record_request(RequestEvent::error(status_code, message));
    }

    pub fn record_success(&mut self, status_code: u16) {
        *self.status_codes.entry(status_code).or_insert(0) += 1;
    }

    /// Derive the full metrics view. Rates follow the reporting conventions:
    /// `100%` success with no requests yet, `0%` cache hits with no
    /// responses yet.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let average_latency_ms = if self.total_ai_calls > 0 {
            (self.total_latency_ms as f64 / self.total_ai_calls as f64).round() as u64
        } else {
            0
        };

        let success_rate = if self.total_requests > 0 {
            format!(
                "{:.2}%",
                (self.total_requests - self.total_errors) as f64 / self.total_requests as f64
                    * 100.0
            )
        } else {
            "100%".to_string()
        };

        let responses = self.total_ai_calls + self.total_cached_responses;
        let cache_hit_rate = if responses > 0 {
            format!(
                "{:.2}%",
                self.total_cached_responses as f64 / responses as f64 * 100.0
            )
        } else {
            "0%".to_string()
        };

        MetricsSnapshot {
            summary: MetricsSummary {
                total_requests: self.total_requests,
                total_ai_calls: self.total_ai_calls,
                total_cached_responses: self.total_cached_responses,
                total_mock_responses: self.total_mock_responses,
                total_errors: self.total_errors,
                success_rate,
                cache_hit_rate,
            },
            performance: MetricsPerformance {
                average_latency_ms,
                total_latency_ms: self.total_latency_ms,
                average_tasks_per_plan: format!("{:.2}", self.average_tasks_per_plan),
            },
            parse_status: self.parse_status_counts.clone(),
            status_codes: self.status_codes.clone(),
            requests_by_hour: self.requests_by_hour.clone(),
            recent_requests: self.recent_requests.iter().take(10).cloned().collect(),
        }
    }

    /// Rough per-call cost applied to fresh calls (spent) and cached
    /// responses (saved).
    pub fn estimate_costs(&self) -> CostEstimate {
        CostEstimate {
            estimated_total_cost: format!("${:.4}", self.total_ai_calls as f64 * COST_PER_CALL),
            estimated_saved_cost: format!(
                "${:.4}",
                self.total_cached_responses as f64 * COST_PER_CALL
            ),
            ai_calls_made: self.total_ai_calls,
            cached_responses_served: self.total_cached_responses,
            note: "Cost estimates are approximate and based on typical API pricing".to_string(),
        }
    }

    /// Zero every counter and drop the activity buffer.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}
