#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dashboard statistics result types.
//!
//! Serialized field names are the dashboard's JSON contract and stay in
//! `snake_case`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Complete dashboard payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    /// When and over what the statistics were computed.
    pub meta: StatsMeta,
    /// Headline numbers.
    pub primary_metrics: PrimaryMetrics,
    /// Supporting numbers.
    pub secondary_metrics: SecondaryMetrics,
    /// Breakdowns by province and tender type.
    pub distribution_metrics: DistributionMetrics,
    /// Launch trends over the last six months.
    pub time_based_analytics: TimeBasedAnalytics,
    /// Busiest issuing entities.
    pub entity_analytics: EntityAnalytics,
    /// Per-province counts with nested tender type shares.
    pub geographical_insights: BTreeMap<String, ProvinceInsight>,
    /// Frequent words in tender subjects.
    pub content_analytics: ContentAnalytics,
    /// Most recently launched tenders.
    pub recent_tenders: Vec<RecentTender>,
    /// Launches this month and last month.
    pub period_comparisons: PeriodComparisons,
}

/// Generation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsMeta {
    /// Computation timestamp.
    pub generated_at: DateTime<Utc>,
    /// Computation date as `YYYY-MM-DD`.
    pub current_date: String,
    /// What was analysed.
    pub data_source: DataSourceSummary,
}

/// Size of the analysed data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceSummary {
    /// Number of open tenders analysed.
    pub total_tenders_analyzed: usize,
}

/// Headline numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryMetrics {
    /// Number of open tenders.
    pub total_open_tenders: usize,
    /// Month-over-month growth rates.
    pub growth_rates: GrowthRates,
    /// Tenders opening soon.
    pub upcoming_tenders: UpcomingTenders,
}

/// Month-over-month growth rates, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthRates {
    /// Growth of open tender launches.
    pub open_tenders: f64,
}

/// Tenders whose opening falls within the next N days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingTenders {
    /// Opening within 7 days.
    pub next_7_days: usize,
    /// Opening within 14 days.
    pub next_14_days: usize,
    /// Opening within 30 days.
    pub next_30_days: usize,
}

/// Supporting numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryMetrics {
    /// Distinct issuing entities.
    pub unique_entities: usize,
    /// Distinct provinces.
    pub unique_provinces: usize,
    /// Mean whole days between launch and opening.
    pub average_days_until_opening: i64,
    /// Tenders bucketed by time left until opening.
    pub time_to_opening_distribution: TimeToOpening,
}

/// Tenders bucketed by time left until opening.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeToOpening {
    /// Opening is in the past.
    pub already_opened: usize,
    /// Up to 7 days left.
    #[serde(rename = "1-7_days")]
    pub within_7_days: usize,
    /// 8 to 14 days left.
    #[serde(rename = "8-14_days")]
    pub within_14_days: usize,
    /// 15 to 30 days left.
    #[serde(rename = "15-30_days")]
    pub within_30_days: usize,
    /// More than 30 days left.
    pub more_than_30_days: usize,
}

/// A count and its share of the total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Share {
    /// Absolute count.
    pub count: usize,
    /// Percentage of the total, one decimal place.
    pub percentage: f64,
}

/// Breakdowns of open tenders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionMetrics {
    /// Share per province.
    pub province_distribution: BTreeMap<String, Share>,
    /// Share per tender type.
    pub tender_type_distribution: BTreeMap<String, Share>,
}

/// Launch trends, oldest month first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBasedAnalytics {
    /// Launches per month.
    pub monthly_trends: Vec<MonthlyTrend>,
    /// Launches per month and tender type.
    pub tender_types_trend: Vec<TypeTrend>,
}

/// Launches in one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTrend {
    /// Month as `YYYY-MM`.
    pub month: String,
    /// Open tenders launched that month.
    pub open_tenders: usize,
}

/// Launches per tender type in one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTrend {
    /// Month as `YYYY-MM`.
    pub month: String,
    /// Launches per tender type.
    #[serde(flatten)]
    pub counts: BTreeMap<String, usize>,
}

/// Busiest issuing entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityAnalytics {
    /// Top five entities by open tender count.
    pub top_entities: Vec<EntityCount>,
}

/// Open tenders issued by one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCount {
    /// Entity name.
    pub entity: String,
    /// Open tender count.
    pub count: usize,
}

/// Per-province summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvinceInsight {
    /// Open tenders in the province.
    pub count: usize,
    /// Share of all open tenders.
    pub percentage: f64,
    /// Tender type shares within the province.
    pub types: BTreeMap<String, Share>,
}

/// Subject keyword statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentAnalytics {
    /// Up to 20 most frequent words.
    pub common_keywords: Vec<KeywordCount>,
}

/// A subject word and how often it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordCount {
    /// Lowercased word.
    pub word: String,
    /// Occurrences across all subjects.
    pub count: usize,
}

/// Condensed view of a recently launched tender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentTender {
    /// Tender reference.
    pub referencia: String,
    /// Subject.
    pub objeto: String,
    /// Issuing entity.
    pub ugea: Option<String>,
    /// Province.
    pub provincia: Option<String>,
    /// Launch date as published.
    pub data_lancamento: Option<String>,
    /// Opening date as published.
    pub data_abertura: Option<String>,
}

/// Launch counts for a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthCounts {
    /// Open tenders launched.
    pub open: usize,
}

/// Current against previous month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodComparisons {
    /// Current calendar month.
    pub current_month: MonthCounts,
    /// Previous calendar month.
    pub previous_month: MonthCounts,
}
