/// Dashboard statistics over an owner's image records
///
/// Statistics are derived on demand from the full record set; `now` is
/// always passed in so the same records and `now` give the same output.

use crate::{
    error::{HerdError, HerdResult},
    metrics,
    records::{ImageRecord, OwnerId, RecordStore},
};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Number of calendar months in the trend, current month included
pub const TREND_MONTHS: u32 = 6;

/// Labels that mean "no disease", compared case-insensitively
///
/// Matching folds ASCII case only, which is exact for these labels.
/// Disease labels are never folded; breakdown keys keep the classifier's casing.
const HEALTHY_LABELS: &[&str] = &["healthy", "normal"];

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Infected cases uploaded in one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyCases {
    #[serde(rename = "month")]
    pub month_label: String,
    #[serde(rename = "cases")]
    pub infected_count: u64,
}

/// Dashboard statistics for one owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_cases: u64,
    pub healthy_percentage: u8,
    pub active_alerts: u64,
    /// Raw predicted label → infected count; labels differing only in
    /// case are separate keys
    pub disease_breakdown: BTreeMap<String, u64>,
    pub monthly_trend: Vec<MonthlyCases>,
}

/// Health classification of a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnosis<'a> {
    Healthy,
    Infected(&'a str),
}

/// Classify a record
///
/// Records without a usable prediction (pending, failed, or a malformed
/// payload) count as healthy.
pub fn diagnose(record: &ImageRecord) -> Diagnosis<'_> {
    match record.analysis_result().and_then(|r| r.predicted_class()) {
        Some(label)
            if !HEALTHY_LABELS
                .iter()
                .any(|healthy| label.eq_ignore_ascii_case(healthy)) =>
        {
            Diagnosis::Infected(label)
        }
        _ => Diagnosis::Healthy,
    }
}

/// Months counted from year 0, so month arithmetic is plain integer math
fn month_index(ts: DateTime<Utc>) -> i32 {
    ts.year() * 12 + ts.month0() as i32
}

/// First instant of the month with the given index
fn month_start(index: i32) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(index.div_euclid(12), index.rem_euclid(12) as u32 + 1, 1)?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// Compute statistics over a record set
pub fn aggregate(records: &[ImageRecord], now: DateTime<Utc>) -> DashboardStats {
    let total_cases = records.len() as u64;
    let mut healthy_count = 0u64;
    let mut disease_breakdown = BTreeMap::new();

    for record in records {
        match diagnose(record) {
            Diagnosis::Healthy => healthy_count += 1,
            Diagnosis::Infected(label) => {
                *disease_breakdown.entry(label.to_string()).or_insert(0) += 1;
            }
        }
    }
    let infected_count = total_cases - healthy_count;

    // round(healthy / total * 100), halves rounding up
    let healthy_percentage = if total_cases == 0 {
        100
    } else {
        ((healthy_count * 200 + total_cases) / (2 * total_cases)) as u8
    };

    DashboardStats {
        total_cases,
        healthy_percentage,
        active_alerts: infected_count,
        disease_breakdown,
        monthly_trend: monthly_trend(records, now),
    }
}

/// Infected uploads per month for the trend window, oldest first
fn monthly_trend(records: &[ImageRecord], now: DateTime<Utc>) -> Vec<MonthlyCases> {
    let current = month_index(now);

    (0..TREND_MONTHS as i32)
        .rev()
        .map(|months_back| {
            let index = current - months_back;

            let infected_count = match (month_start(index), month_start(index + 1)) {
                (Some(start), Some(end)) => records
                    .iter()
                    .filter(|r| r.upload_date >= start && r.upload_date < end)
                    .filter(|r| matches!(diagnose(r), Diagnosis::Infected(_)))
                    .count() as u64,
                _ => 0,
            };

            MonthlyCases {
                month_label: MONTH_LABELS[index.rem_euclid(12) as usize].to_string(),
                infected_count,
            }
        })
        .collect()
}

/// Computes dashboard statistics from the record store
#[derive(Clone)]
pub struct StatsAggregator {
    records: Arc<dyn RecordStore>,
}

impl StatsAggregator {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// Statistics for `owner` as of `now`
    pub async fn compute_stats(&self, owner: &OwnerId, now: DateTime<Utc>) -> HerdResult<DashboardStats> {
        let records = match self.records.list_for_owner(owner).await {
            Ok(records) => records,
            Err(e) => {
                metrics::record_stats_request(false);
                return Err(HerdError::Aggregation(format!(
                    "Failed to fetch records for {}: {}",
                    owner, e
                )));
            }
        };

        let stats = aggregate(&records, now);
        metrics::record_stats_request(true);

        tracing::debug!(
            "Computed stats for {}: {} cases, {} alerts",
            owner,
            stats.total_cases,
            stats.active_alerts
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db,
        file_store::StoredFile,
        records::{AnalysisResult, RecordState, SqliteRecordStore},
        test_support::{FlakyRecordStore, StoreFailures},
    };
    use serde_json::json;
    use std::path::PathBuf;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn record(uploaded: &str, state: RecordState) -> ImageRecord {
        let file = StoredFile {
            filename: "1-abc.jpg".to_string(),
            original_name: "cow.jpg".to_string(),
            storage_path: PathBuf::from("/data/uploads/1-abc.jpg"),
            size_bytes: 1000,
            mime_type: "image/jpeg".to_string(),
        };
        let mut record = ImageRecord::pending(OwnerId::new("owner").unwrap(), &file, ts(uploaded));
        record.state = state;
        record
    }

    fn analyzed(uploaded: &str, payload: serde_json::Value) -> ImageRecord {
        let result: AnalysisResult = serde_json::from_value(payload).unwrap();
        record(uploaded, RecordState::Analyzed(result))
    }

    fn predicted(uploaded: &str, label: &str) -> ImageRecord {
        analyzed(uploaded, json!({ "predicted_class": label, "confidence": 0.8 }))
    }

    const NOW: &str = "2024-06-15T12:00:00Z";

    #[test]
    fn test_empty_owner() {
        let stats = aggregate(&[], ts(NOW));

        assert_eq!(stats.total_cases, 0);
        assert_eq!(stats.healthy_percentage, 100);
        assert_eq!(stats.active_alerts, 0);
        assert!(stats.disease_breakdown.is_empty());
        assert_eq!(stats.monthly_trend.len(), 6);
        assert!(stats.monthly_trend.iter().all(|m| m.infected_count == 0));
    }

    #[test]
    fn test_mange_breakdown() {
        let records = vec![
            predicted("2024-06-01T09:00:00Z", "Mange"),
            predicted("2024-06-02T09:00:00Z", "Mange"),
            predicted("2024-06-03T09:00:00Z", "healthy"),
        ];
        let stats = aggregate(&records, ts(NOW));

        assert_eq!(stats.total_cases, 3);
        assert_eq!(stats.active_alerts, 2);
        assert_eq!(stats.healthy_percentage, 33);
        assert_eq!(
            stats.disease_breakdown,
            BTreeMap::from([("Mange".to_string(), 2)])
        );
    }

    #[test]
    fn test_healthy_labels_are_case_insensitive() {
        let records = vec![
            predicted("2024-06-01T09:00:00Z", "Healthy"),
            predicted("2024-06-01T09:00:00Z", "NORMAL"),
            predicted("2024-06-01T09:00:00Z", "normal"),
            predicted("2024-06-01T09:00:00Z", "hEaLtHy"),
        ];
        let stats = aggregate(&records, ts(NOW));

        assert_eq!(stats.active_alerts, 0);
        assert_eq!(stats.healthy_percentage, 100);
    }

    #[test]
    fn test_unanalyzed_and_malformed_count_as_healthy() {
        let records = vec![
            record("2024-06-01T09:00:00Z", RecordState::Pending),
            record("2024-06-01T09:00:00Z", RecordState::Error),
            analyzed("2024-06-01T09:00:00Z", json!({ "confidence": 0.4 })),
            analyzed("2024-06-01T09:00:00Z", json!({ "predicted_class": "" })),
            predicted("2024-06-01T09:00:00Z", "Lumpy Skin"),
        ];
        let stats = aggregate(&records, ts(NOW));

        assert_eq!(stats.total_cases, 5);
        assert_eq!(stats.active_alerts, 1);
        assert_eq!(stats.healthy_percentage, 80);
    }

    #[test]
    fn test_breakdown_keys_keep_case() {
        let records = vec![
            predicted("2024-06-01T09:00:00Z", "Mange"),
            predicted("2024-06-01T09:00:00Z", "mange"),
            predicted("2024-06-01T09:00:00Z", "FIÈVRE"),
            predicted("2024-06-01T09:00:00Z", "fièvre"),
        ];
        let stats = aggregate(&records, ts(NOW));

        assert_eq!(stats.active_alerts, 4);
        assert_eq!(stats.disease_breakdown.len(), 4);
        assert_eq!(stats.disease_breakdown["Mange"], 1);
        assert_eq!(stats.disease_breakdown["mange"], 1);
        assert_eq!(stats.disease_breakdown["FIÈVRE"], 1);
        assert_eq!(stats.disease_breakdown["fièvre"], 1);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        // 1 of 8 healthy = 12.5% -> 13
        let mut records = vec![predicted("2024-06-01T09:00:00Z", "healthy")];
        records.extend((0..7).map(|_| predicted("2024-06-01T09:00:00Z", "Mange")));
        assert_eq!(aggregate(&records, ts(NOW)).healthy_percentage, 13);

        // 2 of 3 healthy = 66.67% -> 67
        let records = vec![
            predicted("2024-06-01T09:00:00Z", "healthy"),
            predicted("2024-06-01T09:00:00Z", "normal"),
            predicted("2024-06-01T09:00:00Z", "Mange"),
        ];
        assert_eq!(aggregate(&records, ts(NOW)).healthy_percentage, 67);
    }

    #[test]
    fn test_counts_always_add_up() {
        let labels = ["healthy", "Mange", "normal", "Foot and Mouth", "Lumpy Skin", "HEALTHY"];
        let records: Vec<_> = labels
            .iter()
            .map(|l| predicted("2024-05-10T00:00:00Z", l))
            .chain(std::iter::once(record("2024-05-10T00:00:00Z", RecordState::Error)))
            .collect();
        let stats = aggregate(&records, ts(NOW));

        let healthy = stats.total_cases - stats.active_alerts;
        assert_eq!(healthy, 4);
        assert_eq!(stats.disease_breakdown.values().sum::<u64>(), stats.active_alerts);
        assert!(stats.healthy_percentage <= 100);
    }

    #[test]
    fn test_monthly_trend_buckets() {
        let records = vec![
            // Outside the window (December 2023)
            predicted("2023-12-31T23:59:59Z", "Mange"),
            // January, first instant
            predicted("2024-01-01T00:00:00Z", "Mange"),
            predicted("2024-01-20T00:00:00Z", "healthy"),
            // March, two infected
            predicted("2024-03-05T00:00:00Z", "Mange"),
            predicted("2024-03-31T23:59:59Z", "Lumpy Skin"),
            // June (current month)
            predicted("2024-06-14T10:00:00Z", "Mange"),
            record("2024-06-14T10:00:00Z", RecordState::Pending),
            // After the current month
            predicted("2024-07-01T00:00:00Z", "Mange"),
        ];
        let stats = aggregate(&records, ts(NOW));

        let trend: Vec<(&str, u64)> = stats
            .monthly_trend
            .iter()
            .map(|m| (m.month_label.as_str(), m.infected_count))
            .collect();
        assert_eq!(
            trend,
            vec![
                ("Jan", 1),
                ("Feb", 0),
                ("Mar", 2),
                ("Apr", 0),
                ("May", 0),
                ("Jun", 1),
            ]
        );

        // Totals are not time-bounded
        assert_eq!(stats.total_cases, 8);
        assert_eq!(stats.active_alerts, 6);
    }

    #[test]
    fn test_monthly_trend_crosses_year_boundary() {
        let records = vec![
            predicted("2023-09-15T00:00:00Z", "Mange"),
            predicted("2023-08-31T23:59:59Z", "Mange"),
            predicted("2024-02-29T12:00:00Z", "Mange"),
        ];
        let stats = aggregate(&records, ts("2024-02-29T23:00:00Z"));

        let labels: Vec<&str> = stats.monthly_trend.iter().map(|m| m.month_label.as_str()).collect();
        assert_eq!(labels, vec!["Sep", "Oct", "Nov", "Dec", "Jan", "Feb"]);

        let counts: Vec<u64> = stats.monthly_trend.iter().map(|m| m.infected_count).collect();
        assert_eq!(counts, vec![1, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let records = vec![
            predicted("2024-04-01T09:00:00Z", "Mange"),
            predicted("2024-05-01T09:00:00Z", "Lumpy Skin"),
            predicted("2024-06-01T09:00:00Z", "Foot and Mouth"),
            predicted("2024-06-01T10:00:00Z", "healthy"),
        ];

        let first = serde_json::to_string(&aggregate(&records, ts(NOW))).unwrap();
        let second = serde_json::to_string(&aggregate(&records, ts(NOW))).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_wire_format() {
        let stats = aggregate(&[predicted("2024-06-01T09:00:00Z", "Mange")], ts(NOW));
        let value = serde_json::to_value(&stats).unwrap();

        assert_eq!(value["totalCases"], 1);
        assert_eq!(value["healthyPercentage"], 0);
        assert_eq!(value["activeAlerts"], 1);
        assert_eq!(value["diseaseBreakdown"], json!({ "Mange": 1 }));
        assert_eq!(value["monthlyTrend"][5], json!({ "month": "Jun", "cases": 1 }));
    }

    #[tokio::test]
    async fn test_compute_stats_from_store() {
        let store = SqliteRecordStore::new(db::in_memory_pool().await);
        let mut mange = predicted("2024-06-01T09:00:00Z", "Mange");
        mange.id = uuid::Uuid::new_v4();
        store.insert(&mange).await.unwrap();

        let mut other = predicted("2024-06-01T09:00:00Z", "Mange");
        other.id = uuid::Uuid::new_v4();
        other.owner_id = OwnerId::new("someone-else").unwrap();
        store.insert(&other).await.unwrap();

        let aggregator = StatsAggregator::new(Arc::new(store));
        let stats = aggregator
            .compute_stats(&OwnerId::new("owner").unwrap(), ts(NOW))
            .await
            .unwrap();

        assert_eq!(stats.total_cases, 1);
        assert_eq!(stats.active_alerts, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_aggregation_error() {
        let store = SqliteRecordStore::new(db::in_memory_pool().await);
        let aggregator = StatsAggregator::new(Arc::new(FlakyRecordStore::new(
            store,
            StoreFailures {
                list: true,
                ..Default::default()
            },
        )));

        let err = aggregator
            .compute_stats(&OwnerId::new("owner").unwrap(), ts(NOW))
            .await
            .unwrap_err();
        assert!(matches!(err, HerdError::Aggregation(_)));
    }
}
