#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dashboard statistics over the open tenders of a snapshot.
//!
//! Everything is computed in memory from one [`Snapshot`]; records whose
//! dates cannot be parsed are skipped by date-based metrics but still
//! counted everywhere else. Percentages and growth rates are rounded half
//! away from zero to one decimal place.

pub mod dates;

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike as _, Months, NaiveDate, TimeDelta, Utc};
use tender_watch_analytics_models::{
    ContentAnalytics, DashboardStats, DataSourceSummary, DistributionMetrics, EntityAnalytics,
    EntityCount, GrowthRates, KeywordCount, MonthCounts, MonthlyTrend, PeriodComparisons,
    PrimaryMetrics, ProvinceInsight, RecentTender, SecondaryMetrics, Share, StatsMeta,
    TimeBasedAnalytics, TimeToOpening, TypeTrend, UpcomingTenders,
};
use tender_watch_tender_models::{Category, Snapshot, TenderRecord};

/// Label used when a record has no value for a grouping field.
pub const UNKNOWN_LABEL: &str = "Desconhecido";

/// Number of months covered by the trend series.
const TREND_MONTHS: u32 = 6;
const TOP_ENTITIES: usize = 5;
const TOP_KEYWORDS: usize = 20;
const MIN_KEYWORD_OCCURRENCES: usize = 3;
const MIN_KEYWORD_CHARS: usize = 4;
const RECENT_TENDERS: usize = 5;

/// Computes the dashboard over the open tenders of `snapshot`, relative to
/// `now`.
#[must_use]
pub fn compute(snapshot: &Snapshot, now: DateTime<Utc>) -> DashboardStats {
    let tenders = snapshot.records(Category::OpenTenders);
    let today = now.date_naive();

    let current_month = launches_in_month(tenders, month_start(today, 0));
    let previous_month = launches_in_month(tenders, month_start(today, 1));

    log::debug!("Computing dashboard over {} open tenders", tenders.len());

    DashboardStats {
        meta: StatsMeta {
            generated_at: now,
            current_date: today.format("%Y-%m-%d").to_string(),
            data_source: DataSourceSummary {
                total_tenders_analyzed: tenders.len(),
            },
        },
        primary_metrics: PrimaryMetrics {
            total_open_tenders: tenders.len(),
            growth_rates: GrowthRates {
                open_tenders: growth_rate(current_month, previous_month),
            },
            upcoming_tenders: upcoming(tenders, now),
        },
        secondary_metrics: SecondaryMetrics {
            unique_entities: distinct(tenders.iter().map(|t| t.entity.as_deref())),
            unique_provinces: distinct(tenders.iter().map(|t| t.province.as_deref())),
            average_days_until_opening: average_days_until_opening(tenders),
            time_to_opening_distribution: time_to_opening(tenders, now),
        },
        distribution_metrics: DistributionMetrics {
            province_distribution: shares(tenders.iter().map(|t| label(t.province.as_deref()))),
            tender_type_distribution: shares(
                tenders.iter().map(|t| label(t.tender_type.as_deref())),
            ),
        },
        time_based_analytics: TimeBasedAnalytics {
            monthly_trends: monthly_trends(tenders, today),
            tender_types_trend: tender_types_trend(tenders, today),
        },
        entity_analytics: EntityAnalytics {
            top_entities: top_entities(tenders),
        },
        geographical_insights: geographical_insights(tenders),
        content_analytics: ContentAnalytics {
            common_keywords: common_keywords(tenders),
        },
        recent_tenders: recent_tenders(tenders),
        period_comparisons: PeriodComparisons {
            current_month: MonthCounts {
                open: current_month,
            },
            previous_month: MonthCounts {
                open: previous_month,
            },
        },
    }
}

/// Rounds half away from zero to one decimal place.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `count` as a percentage of `total`, rounded to one decimal place.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(count as f64 / total as f64 * 100.0)
}

/// Percentage change from `previous` to `current`. With no previous
/// activity any current activity counts as 100% growth.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn growth_rate(current: usize, previous: usize) -> f64 {
    if previous == 0 {
        return if current > 0 { 100.0 } else { 0.0 };
    }
    round1((current as f64 - previous as f64) / previous as f64 * 100.0)
}

fn label(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN_LABEL)
        .to_owned()
}

fn distinct<'a>(values: impl Iterator<Item = Option<&'a str>>) -> usize {
    values
        .flatten()
        .filter(|v| !v.is_empty())
        .collect::<HashSet<_>>()
        .len()
}

fn launch_date(tender: &TenderRecord) -> Option<NaiveDate> {
    tender.launched_on.as_deref().and_then(dates::parse_date)
}

fn opening(tender: &TenderRecord) -> Option<DateTime<Utc>> {
    dates::opening_instant(
        tender.opening_date.as_deref()?,
        tender.opening_time.as_deref(),
    )
}

/// First day of the month `back` months before the month of `today`.
fn month_start(today: NaiveDate, back: u32) -> NaiveDate {
    today
        .with_day(1)
        .and_then(|first| first.checked_sub_months(Months::new(back)))
        .unwrap_or(today)
}

fn same_month(date: NaiveDate, start: NaiveDate) -> bool {
    date.year() == start.year() && date.month() == start.month()
}

fn launches_in_month(tenders: &[TenderRecord], start: NaiveDate) -> usize {
    tenders
        .iter()
        .filter_map(launch_date)
        .filter(|d| same_month(*d, start))
        .count()
}

fn upcoming(tenders: &[TenderRecord], now: DateTime<Utc>) -> UpcomingTenders {
    let openings: Vec<DateTime<Utc>> = tenders.iter().filter_map(opening).collect();
    let within = |days: i64| {
        let horizon = now + TimeDelta::days(days);
        openings.iter().filter(|o| **o > now && **o < horizon).count()
    };
    UpcomingTenders {
        next_7_days: within(7),
        next_14_days: within(14),
        next_30_days: within(30),
    }
}

fn average_days_until_opening(tenders: &[TenderRecord]) -> i64 {
    let spans: Vec<i64> = tenders
        .iter()
        .filter_map(|t| {
            let launch = launch_date(t)?;
            let opening = dates::parse_date(t.opening_date.as_deref()?)?;
            Some((opening - launch).num_days())
        })
        .filter(|days| *days > 0)
        .collect();

    mean_rounded(&spans)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn mean_rounded(values: &[i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }
    (values.iter().sum::<i64>() as f64 / values.len() as f64).round() as i64
}

fn time_to_opening(tenders: &[TenderRecord], now: DateTime<Utc>) -> TimeToOpening {
    let mut buckets = TimeToOpening::default();
    for opening in tenders.iter().filter_map(opening) {
        if opening < now {
            buckets.already_opened += 1;
            continue;
        }
        match (opening - now).num_days() {
            ..=7 => buckets.within_7_days += 1,
            8..=14 => buckets.within_14_days += 1,
            15..=30 => buckets.within_30_days += 1,
            _ => buckets.more_than_30_days += 1,
        }
    }
    buckets
}

/// Counts in first-seen order.
fn ordered_counts(values: impl Iterator<Item = String>) -> Vec<(String, usize)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();
    for value in values {
        if let Some(&i) = index.get(&value) {
            counts[i].1 += 1;
        } else {
            index.insert(value.clone(), counts.len());
            counts.push((value, 1));
        }
    }
    counts
}

fn shares(values: impl Iterator<Item = String>) -> BTreeMap<String, Share> {
    let counts = ordered_counts(values);
    let total = counts.iter().map(|(_, c)| c).sum();
    counts
        .into_iter()
        .map(|(key, count)| {
            (
                key,
                Share {
                    count,
                    percentage: percentage(count, total),
                },
            )
        })
        .collect()
}

fn month_labels(today: NaiveDate) -> Vec<NaiveDate> {
    (0..TREND_MONTHS)
        .rev()
        .map(|back| month_start(today, back))
        .collect()
}

fn monthly_trends(tenders: &[TenderRecord], today: NaiveDate) -> Vec<MonthlyTrend> {
    month_labels(today)
        .into_iter()
        .map(|start| MonthlyTrend {
            month: start.format("%Y-%m").to_string(),
            open_tenders: launches_in_month(tenders, start),
        })
        .collect()
}

fn tender_types_trend(tenders: &[TenderRecord], today: NaiveDate) -> Vec<TypeTrend> {
    let types: Vec<String> = ordered_counts(tenders.iter().map(|t| label(t.tender_type.as_deref())))
        .into_iter()
        .map(|(tender_type, _)| tender_type)
        .collect();

    month_labels(today)
        .into_iter()
        .map(|start| {
            let counts = types
                .iter()
                .map(|tender_type| {
                    let count = tenders
                        .iter()
                        .filter(|t| label(t.tender_type.as_deref()) == *tender_type)
                        .filter_map(launch_date)
                        .filter(|d| same_month(*d, start))
                        .count();
                    (tender_type.clone(), count)
                })
                .collect();
            TypeTrend {
                month: start.format("%Y-%m").to_string(),
                counts,
            }
        })
        .collect()
}

fn top_entities(tenders: &[TenderRecord]) -> Vec<EntityCount> {
    let mut counts = ordered_counts(tenders.iter().map(|t| label(t.entity.as_deref())));
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(TOP_ENTITIES)
        .map(|(entity, count)| EntityCount { entity, count })
        .collect()
}

fn keywords(subject: &str) -> impl Iterator<Item = String> + '_ {
    subject
        .split_whitespace()
        .map(|word| {
            word.to_lowercase()
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect::<String>()
        })
        .filter(|word| word.chars().count() >= MIN_KEYWORD_CHARS)
}

fn common_keywords(tenders: &[TenderRecord]) -> Vec<KeywordCount> {
    let mut counts = ordered_counts(tenders.iter().flat_map(|t| keywords(&t.subject)));
    counts.retain(|(_, count)| *count >= MIN_KEYWORD_OCCURRENCES);
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(TOP_KEYWORDS)
        .map(|(word, count)| KeywordCount { word, count })
        .collect()
}

fn recent_tenders(tenders: &[TenderRecord]) -> Vec<RecentTender> {
    let mut dated: Vec<(Option<NaiveDate>, &TenderRecord)> =
        tenders.iter().map(|t| (launch_date(t), t)).collect();
    // Undated records sort last; ties keep table order.
    dated.sort_by(|a, b| b.0.cmp(&a.0));

    dated
        .into_iter()
        .take(RECENT_TENDERS)
        .map(|(_, t)| RecentTender {
            referencia: t.reference.clone(),
            objeto: t.subject.clone(),
            ugea: t.entity.clone(),
            provincia: t.province.clone(),
            data_lancamento: t.launched_on.clone(),
            data_abertura: t.opening_date.clone(),
        })
        .collect()
}

fn geographical_insights(tenders: &[TenderRecord]) -> BTreeMap<String, ProvinceInsight> {
    let mut by_province: BTreeMap<String, Vec<&TenderRecord>> = BTreeMap::new();
    for tender in tenders {
        by_province
            .entry(label(tender.province.as_deref()))
            .or_default()
            .push(tender);
    }

    by_province
        .into_iter()
        .map(|(province, members)| {
            let insight = ProvinceInsight {
                count: members.len(),
                percentage: percentage(members.len(), tenders.len()),
                types: shares(members.iter().map(|t| label(t.tender_type.as_deref()))),
            };
            (province, insight)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn open(
        reference: &str,
        province: &str,
        tender_type: &str,
        launched: &str,
        opening: &str,
    ) -> TenderRecord {
        TenderRecord {
            tender_type: Some(tender_type.to_owned()),
            entity: Some(format!("UGEA {province}")),
            province: Some(province.to_owned()),
            launched_on: Some(launched.to_owned()),
            opening_date: Some(opening.to_owned()),
            opening_time: Some("10:00".to_owned()),
            ..TenderRecord::new(reference, "Aquisição de material escolar")
        }
    }

    fn snapshot(tenders: Vec<TenderRecord>) -> Snapshot {
        let mut data = BTreeMap::new();
        data.insert(Category::OpenTenders, tenders);
        Snapshot::new(data, Utc::now())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert!((round1(33.35) - 33.4).abs() < f64::EPSILON);
        assert!((round1(-12.25) - -12.3).abs() < f64::EPSILON);
        assert!((percentage(1, 3) - 33.3).abs() < f64::EPSILON);
        assert!((percentage(2, 3) - 66.7).abs() < f64::EPSILON);
        assert!(percentage(0, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn growth_from_zero() {
        assert!((growth_rate(4, 0) - 100.0).abs() < f64::EPSILON);
        assert!(growth_rate(0, 0).abs() < f64::EPSILON);
        assert!((growth_rate(3, 2) - 50.0).abs() < f64::EPSILON);
        assert!((growth_rate(1, 3) - -66.7).abs() < f64::EPSILON);
    }

    #[test]
    fn dashboard_over_sample_snapshot() {
        let stats = compute(
            &snapshot(vec![
                open("A", "Maputo", "Concurso Público", "2024-05-02", "2024-05-20"),
                open("B", "Maputo", "Concurso Limitado", "2024-05-10", "2024-06-30"),
                open("C", "Sofala", "Concurso Público", "2024-04-20", "2024-05-01"),
                open("D", "Sofala", "Concurso Público", "sem data", "2024-05-25"),
            ]),
            now(),
        );

        assert_eq!(stats.primary_metrics.total_open_tenders, 4);
        assert_eq!(stats.period_comparisons.current_month.open, 2);
        assert_eq!(stats.period_comparisons.previous_month.open, 1);
        assert!((stats.primary_metrics.growth_rates.open_tenders - 100.0).abs() < f64::EPSILON);

        let upcoming = stats.primary_metrics.upcoming_tenders;
        assert_eq!(
            (upcoming.next_7_days, upcoming.next_14_days, upcoming.next_30_days),
            (1, 2, 2)
        );

        let buckets = stats.secondary_metrics.time_to_opening_distribution;
        assert_eq!(buckets.already_opened, 1);
        assert_eq!(buckets.within_7_days, 1);
        assert_eq!(buckets.within_14_days, 1);
        assert_eq!(buckets.more_than_30_days, 1);

        // (18 + 51 + 11) / 3
        assert_eq!(stats.secondary_metrics.average_days_until_opening, 27);
        assert_eq!(stats.secondary_metrics.unique_provinces, 2);

        let maputo = &stats.distribution_metrics.province_distribution["Maputo"];
        assert_eq!(maputo.count, 2);
        assert!((maputo.percentage - 50.0).abs() < f64::EPSILON);
        let publico = &stats.distribution_metrics.tender_type_distribution["Concurso Público"];
        assert!((publico.percentage - 75.0).abs() < f64::EPSILON);

        let sofala = &stats.geographical_insights["Sofala"];
        assert_eq!(sofala.types["Concurso Público"].count, 2);
        assert!((sofala.types["Concurso Público"].percentage - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn trends_cover_six_months_oldest_first() {
        let stats = compute(
            &snapshot(vec![
                open("A", "Niassa", "Concurso Público", "2024-05-02", "2024-06-01"),
                open("B", "Niassa", "Concurso Limitado", "2024-01-10", "2024-02-01"),
                open("C", "Niassa", "Concurso Público", "2023-11-30", "2023-12-20"),
            ]),
            now(),
        );

        let months: Vec<&str> = stats
            .time_based_analytics
            .monthly_trends
            .iter()
            .map(|m| m.month.as_str())
            .collect();
        assert_eq!(
            months,
            vec!["2023-12", "2024-01", "2024-02", "2024-03", "2024-04", "2024-05"]
        );
        let counts: Vec<usize> = stats
            .time_based_analytics
            .monthly_trends
            .iter()
            .map(|m| m.open_tenders)
            .collect();
        assert_eq!(counts, vec![0, 1, 0, 0, 0, 1]);

        let january = &stats.time_based_analytics.tender_types_trend[1];
        assert_eq!(january.counts["Concurso Limitado"], 1);
        assert_eq!(january.counts["Concurso Público"], 0);
    }

    #[test]
    fn keywords_need_three_occurrences() {
        let mut tenders: Vec<TenderRecord> = (0..4)
            .map(|i| {
                open(
                    &format!("K{i}"),
                    "Tete",
                    "Concurso Público",
                    "2024-05-01",
                    "2024-05-30",
                )
            })
            .collect();
        tenders[3].subject = "Reabilitação da ponte, reabilitação! REABILITAÇÃO".to_owned();

        let stats = compute(&snapshot(tenders), now());
        let words: Vec<(&str, usize)> = stats
            .content_analytics
            .common_keywords
            .iter()
            .map(|k| (k.word.as_str(), k.count))
            .collect();

        assert_eq!(
            words,
            vec![
                ("aquisição", 3),
                ("material", 3),
                ("escolar", 3),
                ("reabilitação", 3),
            ]
        );
    }

    #[test]
    fn recent_tenders_sort_by_launch_date() {
        let stats = compute(
            &snapshot(vec![
                open("OLD", "Gaza", "Concurso Público", "2024-01-01", "2024-02-01"),
                open("NONE", "Gaza", "Concurso Público", "?", "2024-02-01"),
                open("NEW", "Gaza", "Concurso Público", "2024-05-01", "2024-06-01"),
                open("MID", "Gaza", "Concurso Público", "15/03/2024", "2024-04-01"),
            ]),
            now(),
        );
        let refs: Vec<&str> = stats
            .recent_tenders
            .iter()
            .map(|t| t.referencia.as_str())
            .collect();
        assert_eq!(refs, vec!["NEW", "MID", "OLD", "NONE"]);
    }

    #[test]
    fn serialized_keys_match_dashboard_contract() {
        let stats = compute(
            &snapshot(vec![open("A", "Maputo", "Concurso Público", "2024-05-02", "2024-05-20")]),
            now(),
        );
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["meta"]["current_date"], "2024-05-15");
        assert_eq!(
            json["secondary_metrics"]["time_to_opening_distribution"]["8-14_days"],
            0
        );
        assert_eq!(
            json["time_based_analytics"]["tender_types_trend"][5]["Concurso Público"],
            1
        );
        assert_eq!(json["recent_tenders"][0]["referencia"], "A");
    }
}
