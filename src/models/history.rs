use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::point::GpsPoint;

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 1000;
/// Deepest page a client may request.
pub const MAX_PAGE: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistorySort {
    #[default]
    CapturedAt,
    Speed,
}

impl HistorySort {
    pub fn column(&self) -> &'static str {
        match self {
            HistorySort::CapturedAt => "captured_at",
            HistorySort::Speed => "speed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filters and pagination for a vehicle's location history.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HistoryQuery {
    pub driver_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Keep points whose horizontal accuracy is at most this many meters.
    pub min_accuracy: Option<f64>,
    pub max_speed: Option<f64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub sort: HistorySort,
    #[serde(default)]
    pub order: SortOrder,
}

impl HistoryQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }

    pub fn matches(&self, point: &GpsPoint) -> bool {
        self.driver_id.map_or(true, |d| point.driver_id == d)
            && self.from.map_or(true, |t| point.captured_at >= t)
            && self.to.map_or(true, |t| point.captured_at <= t)
            && self.min_accuracy.map_or(true, |a| point.horizontal_accuracy <= a)
            && self.max_speed.map_or(true, |s| point.speed <= s)
    }

    /// Canonical, order-stable encoding of every parameter, used as a cache key suffix.
    /// Defaults are resolved first so equivalent queries share a key.
    pub fn canonical_key(&self) -> String {
        fn opt<T>(v: Option<T>, f: impl Fn(T) -> String) -> String {
            v.map(f).unwrap_or_else(|| "*".to_string())
        }
        let time = |t: DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::Micros, true);
        let num = |v: f64| format!("{:.6}", v);

        format!(
            "{}:{}:{}:{}:{}:{}:{}:{}:{}",
            opt(self.driver_id, |d| d.to_string()),
            opt(self.from, time),
            opt(self.to, time),
            opt(self.min_accuracy, num),
            opt(self.max_speed, num),
            self.sort.column(),
            self.order.keyword().to_lowercase(),
            self.page(),
            self.limit(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub points: Vec<GpsPoint>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}
