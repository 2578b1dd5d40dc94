//! Inquiry dashboard statistics.
//!
//! Derives presentation values from an [`InquiryDashboardSnapshot`]:
//! - Status and priority shares of the total
//! - Severity bands for response time, response rate and conversion rate
//! - Ordered distribution buckets for charts
//!
//! [`InquiryStatsService`] fetches snapshots and exports them.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::domain::{
    InquiryDashboardSnapshot, InquiryOverview, InquiryPerformance, InquiryPriority, InquiryStatus,
};
use crate::providers::{ApiError, MessagingApi};

/// Errors that can occur during stats operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    /// Fetch failed. The previous snapshot is kept.
    #[error("network error: {0}")]
    Network(String),

    /// The stats endpoint does not exist for this user.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rendering an export failed.
    #[error("export error: {0}")]
    Export(String),
}

impl From<ApiError> for StatsError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotFound(msg) => StatsError::NotFound(msg),
            ApiError::Network(msg) => StatsError::Network(msg),
            other => StatsError::Network(other.to_string()),
        }
    }
}

/// Result type for stats operations.
pub type StatsResult<T> = Result<T, StatsError>;

/// Health band of a performance metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Good,
    Warning,
    Poor,
}

impl Severity {
    /// Returns the indicator color.
    pub fn color(&self) -> &'static str {
        match self {
            Severity::Good => "green",
            Severity::Warning => "amber",
            Severity::Poor => "red",
        }
    }
}

/// Bands an average first-response time in hours.
pub fn response_time_severity(hours: f64) -> Severity {
    if hours <= 2.0 {
        Severity::Good
    } else if hours <= 8.0 {
        Severity::Warning
    } else {
        Severity::Poor
    }
}

/// Bands a response rate percentage.
pub fn response_rate_severity(rate: f64) -> Severity {
    if rate >= 90.0 {
        Severity::Good
    } else if rate >= 70.0 {
        Severity::Warning
    } else {
        Severity::Poor
    }
}

/// Bands a conversion rate percentage.
pub fn conversion_rate_severity(rate: f64) -> Severity {
    if rate >= 20.0 {
        Severity::Good
    } else if rate >= 10.0 {
        Severity::Warning
    } else {
        Severity::Poor
    }
}

/// One bar of a distribution chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionBucket<K> {
    /// Status or priority.
    pub key: K,
    /// Display label.
    pub label: &'static str,
    /// Badge color.
    pub color: &'static str,
    /// Inquiries in this bucket.
    pub count: u32,
    /// Share of the overview total, 0-100.
    pub percentage: f64,
}

/// Read-only view computing dashboard figures from a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct InquiryStatsAggregator<'a> {
    snapshot: &'a InquiryDashboardSnapshot,
}

impl<'a> InquiryStatsAggregator<'a> {
    /// Creates a view over `snapshot`.
    pub fn new(snapshot: &'a InquiryDashboardSnapshot) -> Self {
        Self { snapshot }
    }

    /// Returns the underlying snapshot.
    pub fn snapshot(&self) -> &'a InquiryDashboardSnapshot {
        self.snapshot
    }

    fn share(&self, count: u32) -> f64 {
        let total = self.snapshot.overview.total;
        if total == 0 {
            return 0.0;
        }
        100.0 * f64::from(count) / f64::from(total)
    }

    /// Share of inquiries with `status`. Zero when there are none.
    pub fn status_percentage(&self, status: InquiryStatus) -> f64 {
        let count = self
            .snapshot
            .status_distribution
            .get(&status)
            .copied()
            .unwrap_or(0);
        self.share(count)
    }

    /// Share of inquiries with `priority`. Zero when there are none.
    pub fn priority_percentage(&self, priority: InquiryPriority) -> f64 {
        let count = self
            .snapshot
            .priority_distribution
            .get(&priority)
            .copied()
            .unwrap_or(0);
        self.share(count)
    }

    /// Share of inquiries nobody is assigned to.
    pub fn unassigned_percentage(&self) -> f64 {
        self.share(self.snapshot.overview.unassigned)
    }

    /// Severity of the average response time.
    pub fn response_time_severity(&self) -> Severity {
        response_time_severity(self.snapshot.performance.avg_response_time_hours)
    }

    /// Severity of the response rate.
    pub fn response_rate_severity(&self) -> Severity {
        response_rate_severity(self.snapshot.performance.response_rate)
    }

    /// Severity of the conversion rate.
    pub fn conversion_rate_severity(&self) -> Severity {
        conversion_rate_severity(self.snapshot.performance.conversion_rate)
    }

    /// Every status with its count and share, in display order.
    pub fn status_buckets(&self) -> Vec<DistributionBucket<InquiryStatus>> {
        InquiryStatus::ALL
            .iter()
            .map(|&status| DistributionBucket {
                key: status,
                label: status.label(),
                color: status.color(),
                count: self
                    .snapshot
                    .status_distribution
                    .get(&status)
                    .copied()
                    .unwrap_or(0),
                percentage: self.status_percentage(status),
            })
            .collect()
    }

    /// Every priority with its count and share, in display order.
    pub fn priority_buckets(&self) -> Vec<DistributionBucket<InquiryPriority>> {
        InquiryPriority::ALL
            .iter()
            .map(|&priority| DistributionBucket {
                key: priority,
                label: priority.label(),
                color: priority.color(),
                count: self
                    .snapshot
                    .priority_distribution
                    .get(&priority)
                    .copied()
                    .unwrap_or(0),
                percentage: self.priority_percentage(priority),
            })
            .collect()
    }
}

struct Fetched {
    snapshot: InquiryDashboardSnapshot,
    fetched_at: DateTime<Utc>,
}

/// Service holding the latest dashboard snapshot.
pub struct InquiryStatsService {
    api: Arc<dyn MessagingApi>,
    latest: RwLock<Option<Fetched>>,
}

impl InquiryStatsService {
    /// Creates a service with no snapshot yet.
    pub fn new(api: Arc<dyn MessagingApi>) -> Self {
        Self {
            api,
            latest: RwLock::new(None),
        }
    }

    /// Fetches a fresh snapshot, replacing the previous one whole.
    ///
    /// On failure the previous snapshot is kept.
    pub async fn refresh(&self) -> StatsResult<InquiryDashboardSnapshot> {
        let snapshot = match self.api.fetch_inquiry_stats().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to refresh inquiry stats");
                return Err(e.into());
            }
        };

        tracing::info!(total = snapshot.overview.total, "Inquiry stats refreshed");
        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        *latest = Some(Fetched {
            snapshot: snapshot.clone(),
            fetched_at: Utc::now(),
        });
        Ok(snapshot)
    }

    /// Returns the latest snapshot, if any.
    pub fn snapshot(&self) -> Option<InquiryDashboardSnapshot> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|f| f.snapshot.clone())
    }

    /// Returns when the latest snapshot was fetched.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|f| f.fetched_at)
    }

    /// Exports a snapshot with its derived figures as JSON.
    pub fn export_json(&self, snapshot: &InquiryDashboardSnapshot) -> StatsResult<String> {
        serde_json::to_string_pretty(&ReportExport::from(snapshot))
            .map_err(|e| StatsError::Export(e.to_string()))
    }

    /// Exports a snapshot as two-column CSV.
    pub fn export_csv(&self, snapshot: &InquiryDashboardSnapshot) -> String {
        let stats = InquiryStatsAggregator::new(snapshot);
        let overview = &snapshot.overview;
        let performance = &snapshot.performance;

        let mut csv = String::new();
        csv.push_str("Metric,Value\n");
        csv.push_str(&format!("Total Inquiries,{}\n", overview.total));
        csv.push_str(&format!("New Today,{}\n", overview.new_today));
        csv.push_str(&format!("New This Week,{}\n", overview.new_this_week));
        csv.push_str(&format!("Unassigned,{}\n", overview.unassigned));
        csv.push_str(&format!("Urgent,{}\n", overview.urgent));
        csv.push_str(&format!(
            "Avg Response Time (h),{:.2}\n",
            performance.avg_response_time_hours
        ));
        csv.push_str(&format!("Response Rate (%),{:.1}\n", performance.response_rate));
        csv.push_str(&format!(
            "Conversion Rate (%),{:.1}\n",
            performance.conversion_rate
        ));
        for bucket in stats.status_buckets() {
            csv.push_str(&format!("Status {},{}\n", bucket.label, bucket.count));
        }
        for bucket in stats.priority_buckets() {
            csv.push_str(&format!("Priority {},{}\n", bucket.label, bucket.count));
        }
        csv
    }
}

/// Serializable export format for dashboard stats.
#[derive(Debug, Serialize)]
struct ReportExport<'a> {
    overview: &'a InquiryOverview,
    performance: PerformanceExport<'a>,
    unassigned_percentage: f64,
    status: Vec<DistributionBucket<InquiryStatus>>,
    priority: Vec<DistributionBucket<InquiryPriority>>,
}

#[derive(Debug, Serialize)]
struct PerformanceExport<'a> {
    #[serde(flatten)]
    figures: &'a InquiryPerformance,
    response_time_severity: Severity,
    response_rate_severity: Severity,
    conversion_rate_severity: Severity,
}

impl<'a> From<&'a InquiryDashboardSnapshot> for ReportExport<'a> {
    fn from(snapshot: &'a InquiryDashboardSnapshot) -> Self {
        let stats = InquiryStatsAggregator::new(snapshot);
        Self {
            overview: &snapshot.overview,
            performance: PerformanceExport {
                figures: &snapshot.performance,
                response_time_severity: stats.response_time_severity(),
                response_rate_severity: stats.response_rate_severity(),
                conversion_rate_severity: stats.conversion_rate_severity(),
            },
            unassigned_percentage: stats.unassigned_percentage(),
            status: stats.status_buckets(),
            priority: stats.priority_buckets(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Conversation, ConversationId, Message, MessageId};
    use crate::providers::{ApiResult, OutgoingMessage, SentMessage};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn snapshot() -> InquiryDashboardSnapshot {
        InquiryDashboardSnapshot {
            overview: InquiryOverview {
                total: 40,
                new_today: 3,
                new_this_week: 12,
                unassigned: 10,
                urgent: 4,
            },
            status_distribution: BTreeMap::from([
                (InquiryStatus::New, 10),
                (InquiryStatus::InProgress, 20),
                (InquiryStatus::Closed, 10),
            ]),
            priority_distribution: BTreeMap::from([
                (InquiryPriority::Normal, 30),
                (InquiryPriority::Urgent, 10),
            ]),
            performance: InquiryPerformance {
                avg_response_time_hours: 3.5,
                response_rate: 92.0,
                conversion_rate: 8.0,
            },
            recent_activities: Vec::new(),
        }
    }

    #[test]
    fn percentages_of_total() {
        let snapshot = snapshot();
        let stats = InquiryStatsAggregator::new(&snapshot);

        assert_eq!(stats.status_percentage(InquiryStatus::InProgress), 50.0);
        assert_eq!(stats.status_percentage(InquiryStatus::Resolved), 0.0);
        assert_eq!(stats.priority_percentage(InquiryPriority::Urgent), 25.0);
        assert_eq!(stats.unassigned_percentage(), 25.0);
    }

    #[test]
    fn empty_snapshot_yields_zero_not_nan() {
        let snapshot = InquiryDashboardSnapshot::default();
        let stats = InquiryStatsAggregator::new(&snapshot);

        for status in InquiryStatus::ALL {
            assert_eq!(stats.status_percentage(status), 0.0);
        }
        for priority in InquiryPriority::ALL {
            assert_eq!(stats.priority_percentage(priority), 0.0);
        }
        assert_eq!(stats.unassigned_percentage(), 0.0);
    }

    #[test]
    fn response_time_bands() {
        assert_eq!(response_time_severity(0.0), Severity::Good);
        assert_eq!(response_time_severity(2.0), Severity::Good);
        assert_eq!(response_time_severity(2.01), Severity::Warning);
        assert_eq!(response_time_severity(8.0), Severity::Warning);
        assert_eq!(response_time_severity(8.01), Severity::Poor);
    }

    #[test]
    fn response_rate_bands() {
        assert_eq!(response_rate_severity(100.0), Severity::Good);
        assert_eq!(response_rate_severity(90.0), Severity::Good);
        assert_eq!(response_rate_severity(89.9), Severity::Warning);
        assert_eq!(response_rate_severity(70.0), Severity::Warning);
        assert_eq!(response_rate_severity(69.9), Severity::Poor);
    }

    #[test]
    fn conversion_rate_bands() {
        assert_eq!(conversion_rate_severity(20.0), Severity::Good);
        assert_eq!(conversion_rate_severity(10.0), Severity::Warning);
        assert_eq!(conversion_rate_severity(9.99), Severity::Poor);
    }

    #[test]
    fn severity_colors() {
        assert_eq!(Severity::Good.color(), "green");
        assert_eq!(Severity::Warning.color(), "amber");
        assert_eq!(Severity::Poor.color(), "red");
    }

    #[test]
    fn buckets_cover_every_variant_in_order() {
        let snapshot = snapshot();
        let stats = InquiryStatsAggregator::new(&snapshot);

        let statuses = stats.status_buckets();
        let keys: Vec<_> = statuses.iter().map(|b| b.key).collect();
        assert_eq!(keys, InquiryStatus::ALL.to_vec());
        assert_eq!(statuses[3].count, 0);
        assert_eq!(statuses[1].percentage, 50.0);

        let priorities = stats.priority_buckets();
        assert_eq!(priorities.len(), 4);
        assert_eq!(priorities[0].count, 0);
        assert_eq!(priorities[3].label, "Urgent");
    }

    #[test]
    fn aggregator_severities_use_performance() {
        let snapshot = snapshot();
        let stats = InquiryStatsAggregator::new(&snapshot);

        assert_eq!(stats.response_time_severity(), Severity::Warning);
        assert_eq!(stats.response_rate_severity(), Severity::Good);
        assert_eq!(stats.conversion_rate_severity(), Severity::Poor);
    }

    struct MockApi {
        responses: Mutex<Vec<ApiResult<InquiryDashboardSnapshot>>>,
    }

    impl MockApi {
        fn new(mut responses: Vec<ApiResult<InquiryDashboardSnapshot>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl MessagingApi for MockApi {
        async fn fetch_conversations(&self) -> ApiResult<Vec<Conversation>> {
            Ok(Vec::new())
        }

        async fn fetch_messages(&self, _conversation_id: &ConversationId) -> ApiResult<Vec<Message>> {
            Ok(Vec::new())
        }

        async fn send_message(&self, _message: &OutgoingMessage) -> ApiResult<SentMessage> {
            Err(ApiError::Network("unused".to_string()))
        }

        async fn mark_message_read(&self, _message_id: &MessageId) -> ApiResult<()> {
            Ok(())
        }

        async fn fetch_inquiry_stats(&self) -> ApiResult<InquiryDashboardSnapshot> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ApiError::Network("exhausted".to_string())))
        }
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let service = InquiryStatsService::new(Arc::new(MockApi::new(vec![
            Ok(snapshot()),
            Err(ApiError::Network("timeout".to_string())),
        ])));

        service.refresh().await.unwrap();
        let err = service.refresh().await.unwrap_err();

        assert_eq!(err, StatsError::Network("timeout".to_string()));
        assert_eq!(service.snapshot(), Some(snapshot()));
        assert!(service.fetched_at().is_some());
    }

    #[tokio::test]
    async fn refresh_replaces_snapshot_whole() {
        let mut second = InquiryDashboardSnapshot::default();
        second.overview.total = 1;
        let service = InquiryStatsService::new(Arc::new(MockApi::new(vec![
            Ok(snapshot()),
            Ok(second.clone()),
        ])));

        service.refresh().await.unwrap();
        service.refresh().await.unwrap();

        assert_eq!(service.snapshot(), Some(second));
    }

    #[tokio::test]
    async fn missing_endpoint_is_not_found() {
        let service = InquiryStatsService::new(Arc::new(MockApi::new(vec![Err(
            ApiError::NotFound("stats".to_string()),
        )])));

        let err = service.refresh().await.unwrap_err();
        assert_eq!(err, StatsError::NotFound("stats".to_string()));
        assert!(service.snapshot().is_none());
    }

    #[test]
    fn csv_export() {
        let service = InquiryStatsService::new(Arc::new(MockApi::new(Vec::new())));
        let csv = service.export_csv(&snapshot());

        assert!(csv.starts_with("Metric,Value\n"));
        assert!(csv.contains("Total Inquiries,40"));
        assert!(csv.contains("Avg Response Time (h),3.50"));
        assert!(csv.contains("Status In progress,20"));
        assert!(csv.contains("Priority Low,0"));
    }

    #[test]
    fn json_export_includes_derived_figures() {
        let service = InquiryStatsService::new(Arc::new(MockApi::new(Vec::new())));
        let json = service.export_json(&snapshot()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["overview"]["total"], 40);
        assert_eq!(value["performance"]["response_rate"], 92.0);
        assert_eq!(value["performance"]["response_time_severity"], "warning");
        assert_eq!(value["unassigned_percentage"], 25.0);
        assert_eq!(value["status"].as_array().unwrap().len(), 5);
    }
}
