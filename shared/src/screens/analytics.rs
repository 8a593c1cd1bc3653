use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use super::LoadStatus;
use crate::api::{endpoints, BackendApi};
use crate::capabilities::{AbortSignal, Capabilities};
use crate::config::ClientConfig;
use crate::error::{AppError, AppResult, ErrorKind};
use crate::model::decimal;
use crate::optimistic::surface_failure;

pub const ROUTE: &str = "/admin/analytics";

/// Inclusive range of calendar days.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> AppResult<Self> {
        if start > end {
            return Err(AppError::new(ErrorKind::Validation, "start after end")
                .with_detail("The start date must be on or before the end date."));
        }
        Ok(Self { start, end })
    }

    /// The `days` days ending on `end`, `end` included.
    pub fn last_days(end: NaiveDate, days: u32) -> AppResult<Self> {
        let back = i64::from(days.max(1)) - 1;
        let start = Duration::try_days(back)
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or_else(|| {
                AppError::new(ErrorKind::Validation, "range out of bounds")
                    .with_detail("The date range is too long.")
            })?;
        Ok(Self { start, end })
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    fn query(&self) -> [(&'static str, String); 2] {
        [
            ("start_date", self.start.format("%Y-%m-%d").to_string()),
            ("end_date", self.end.format("%Y-%m-%d").to_string()),
        ]
    }
}

/// Aggregates for the dashboard cards. Missing figures read as zero.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct AnalyticsSummary {
    pub total_bookings: u64,
    #[serde(deserialize_with = "decimal::required")]
    pub total_revenue: f64,
    pub total_properties: u64,
    pub total_agents: u64,
    pub total_reviews: u64,
    #[serde(deserialize_with = "decimal::optional")]
    pub average_rating: Option<f64>,
    pub bookings_by_status: BTreeMap<String, u64>,
}

impl AnalyticsSummary {
    pub fn bookings_with_status(&self, status: &str) -> u64 {
        self.bookings_by_status.get(status).copied().unwrap_or(0)
    }

    /// Share of bookings that were approved or completed, 0.0 to 1.0.
    pub fn conversion_rate(&self) -> f64 {
        if self.total_bookings == 0 {
            return 0.0;
        }
        let converted =
            self.bookings_with_status("approved") + self.bookings_with_status("completed");
        converted as f64 / self.total_bookings as f64
    }
}

/// Read-only dashboard. Nothing here is mutated optimistically.
#[derive(Clone)]
pub struct AnalyticsScreen {
    api: BackendApi,
    caps: Capabilities,
    login_url: String,
    status: Arc<RwLock<LoadStatus>>,
    summary: Arc<RwLock<Option<AnalyticsSummary>>>,
}

impl AnalyticsScreen {
    pub fn new(config: ClientConfig, caps: Capabilities) -> Self {
        let login_url = config.login_url(ROUTE);
        Self {
            api: BackendApi::new(config, &caps),
            caps,
            login_url,
            status: Arc::new(RwLock::new(LoadStatus::Idle)),
            summary: Arc::new(RwLock::new(None)),
        }
    }

    #[must_use]
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.api = self.api.with_signal(signal);
        self
    }

    pub async fn status(&self) -> LoadStatus {
        self.status.read().await.clone()
    }

    pub async fn summary(&self) -> Option<AnalyticsSummary> {
        self.summary.read().await.clone()
    }

    #[instrument(skip(self), fields(start = %range.start, end = %range.end))]
    pub async fn fetch(&self, range: DateRange) -> LoadStatus {
        *self.status.write().await = LoadStatus::Loading;

        let status = match self
            .api
            .get_json::<AnalyticsSummary>(endpoints::ANALYTICS, &range.query())
            .await
        {
            Ok(summary) => {
                info!(total_bookings = summary.total_bookings, "analytics loaded");
                *self.summary.write().await = Some(summary);
                LoadStatus::Ready
            }
            Err(e) if e.is_cancelled() => LoadStatus::Idle,
            Err(e) => {
                warn!(code = e.code(), "analytics load failed");
                let message = e.user_facing_message();
                *self.summary.write().await = None;
                surface_failure(&self.caps, &self.login_url, e);
                LoadStatus::Failed(message)
            }
        };

        *self.status.write().await = status.clone();
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_range_validation() {
        assert!(DateRange::new(day(2026, 3, 2), day(2026, 3, 1)).is_err());
        let range = DateRange::new(day(2026, 3, 1), day(2026, 3, 31)).unwrap();
        assert_eq!(range.days(), 31);
        assert_eq!(range.query()[0], ("start_date", "2026-03-01".to_string()));
    }

    #[test]
    fn test_last_days_includes_end() {
        let range = DateRange::last_days(day(2026, 1, 7), 7).unwrap();
        assert_eq!(range.start, day(2026, 1, 1));
        assert_eq!(range.days(), 7);
        assert_eq!(DateRange::last_days(day(2026, 1, 7), 0).unwrap().days(), 1);
    }

    #[test]
    fn test_last_days_out_of_range_is_rejected() {
        let err = DateRange::last_days(day(2026, 1, 1), u32::MAX).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.user_facing_message(), "The date range is too long.");
    }

    #[test]
    fn test_summary_accepts_decimal_strings() {
        let summary: AnalyticsSummary = serde_json::from_value(serde_json::json!({
            "total_revenue": "12500.50",
            "average_rating": "4.25"
        }))
        .unwrap();
        assert!((summary.total_revenue - 12500.5).abs() < f64::EPSILON);
        assert_eq!(summary.average_rating, Some(4.25));
    }

    #[test]
    fn test_summary_defaults_and_conversion() {
        let summary: AnalyticsSummary = serde_json::from_value(serde_json::json!({
            "total_bookings": 10,
            "bookings_by_status": {"approved": 3, "completed": 2, "pending": 5}
        }))
        .unwrap();
        assert_eq!(summary.total_agents, 0);
        assert!((summary.conversion_rate() - 0.5).abs() < f64::EPSILON);
        assert_eq!(AnalyticsSummary::default().conversion_rate(), 0.0);
    }
}
