//! Session activity summaries
//!
//! Aggregates over a user's flow sessions (time spent, busiest hour and
//! weekday), per-sample analytics over activity samples (focus anomalies,
//! recommendations, best and worst hours, daily summaries) plus the
//! lightweight focus heuristics used when no fitted model is available.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ComputeError;
use crate::types::FlowRecord;

/// Typing intervals considered by [`typing_rhythm`]
pub const RHYTHM_WINDOW: usize = 30;

/// Scores per half of the window compared by [`productivity_trend`]
pub const TREND_WINDOW: usize = 10;

/// Mean difference beyond which a trend is reported
pub const TREND_MARGIN: f64 = 5.0;

/// Focus scores outside these quantiles are anomalies
pub const ANOMALY_QUANTILES: (f64, f64) = (0.05, 0.95);

/// Idle time above this quantile triggers a distraction warning
pub const IDLE_QUANTILE: f64 = 0.75;

/// Hours of day (UTC) suited to deep work
pub const DEEP_WORK_HOURS: RangeInclusive<u32> = 9..=12;

/// Relative typing rhythm below which a break is suggested
pub const SLOW_TYPING_MARGIN: f64 = -10.0;

const DEEP_WORK: &str = "This is the best time for deep work. Focus on complex tasks!";
const TAKE_BREAK: &str = "Your typing rhythm is slower than usual. Consider taking a break.";
const HIGH_IDLE: &str = "High idle time detected. Minimize distractions.";

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Activity aggregates for a batch of sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Sum of session durations, minutes
    pub total_time_spent: f64,
    pub total_sessions: usize,
    pub average_session_duration: f64,
    /// Hour of day (UTC) with the most session starts
    pub most_active_hour: u32,
    pub sessions_at_hour: usize,
    pub most_active_day: String,
    pub sessions_on_day: usize,
}

/// Summarize a user's sessions. Ties on hour or weekday go to the earliest
/// (hour 0 first, Monday first).
pub fn summarize_sessions(records: &[FlowRecord]) -> Result<SessionSummary, ComputeError> {
    if records.is_empty() {
        return Err(ComputeError::EmptyInput(
            "cannot summarize zero sessions".to_string(),
        ));
    }

    let total_time_spent: f64 = records.iter().map(|r| r.metrics.session_duration).sum();
    let total_sessions = records.len();

    let mut by_hour = [0usize; 24];
    let mut by_day = [0usize; 7];
    for record in records {
        by_hour[record.timestamp.hour() as usize] += 1;
        by_day[record.timestamp.weekday().num_days_from_monday() as usize] += 1;
    }
    let (hour, sessions_at_hour) = busiest(&by_hour);
    let (day, sessions_on_day) = busiest(&by_day);

    Ok(SessionSummary {
        total_time_spent,
        total_sessions,
        average_session_duration: total_time_spent / total_sessions as f64,
        most_active_hour: hour as u32,
        sessions_at_hour,
        most_active_day: weekday_name(WEEKDAYS[day]).to_string(),
        sessions_on_day,
    })
}

/// First bucket with the highest count
fn busiest(counts: &[usize]) -> (usize, usize) {
    counts
        .iter()
        .enumerate()
        .fold((0, 0), |best, (i, &c)| if c > best.1 { (i, c) } else { best })
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// One timestamped activity observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySample {
    pub timestamp: DateTime<Utc>,
    pub focus_score: f64,
    pub typing_rhythm: f64,
    /// Observed typing rhythm minus the rhythm expected for this time slot
    #[serde(default)]
    pub relative_typing_rhythm: f64,
    /// Idle minutes
    #[serde(default)]
    pub idle_time: f64,
    /// Minutes spent debugging
    #[serde(default)]
    pub debugging: f64,
    #[serde(default)]
    pub errors: f64,
}

/// Which side of the focus distribution an anomaly falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyKind {
    Low,
    High,
}

/// A sample whose focus score lies outside [`ANOMALY_QUANTILES`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusAnomaly {
    /// Position of the sample in the input
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub focus_score: f64,
    pub kind: AnomalyKind,
}

/// Hours of day (UTC) with the highest and lowest mean focus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourExtremes {
    pub best_hour: u32,
    pub best_hour_focus: f64,
    pub worst_hour: u32,
    pub worst_hour_focus: f64,
}

/// Aggregates for one calendar day (UTC)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: NaiveDate,
    pub samples: usize,
    pub mean_focus_score: f64,
    pub mean_typing_rhythm: f64,
    pub total_debugging: f64,
    pub total_errors: f64,
}

/// Every per-sample analytic over one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAnalytics {
    pub anomalies: Vec<FocusAnomaly>,
    /// Recommendations for each sample, in input order
    pub recommendations: Vec<Vec<String>>,
    pub hours: HourExtremes,
    pub daily: Vec<DailySummary>,
    /// Mean of the daily mean focus scores
    pub average_daily_focus: f64,
}

/// Linearly interpolated quantile, `q` in [0, 1]
pub fn quantile(values: &[f64], q: f64) -> Result<f64, ComputeError> {
    if values.is_empty() {
        return Err(ComputeError::EmptyInput(
            "cannot take a quantile of zero values".to_string(),
        ));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

fn require_samples(samples: &[ActivitySample]) -> Result<(), ComputeError> {
    if samples.is_empty() {
        return Err(ComputeError::EmptyInput(
            "no activity samples".to_string(),
        ));
    }
    Ok(())
}

/// Samples whose focus score is strictly below the 5th or strictly above the
/// 95th percentile of the batch
pub fn focus_anomalies(samples: &[ActivitySample]) -> Result<Vec<FocusAnomaly>, ComputeError> {
    require_samples(samples)?;
    let scores: Vec<f64> = samples.iter().map(|s| s.focus_score).collect();
    let low = quantile(&scores, ANOMALY_QUANTILES.0)?;
    let high = quantile(&scores, ANOMALY_QUANTILES.1)?;

    let anomalies: Vec<FocusAnomaly> = samples
        .iter()
        .enumerate()
        .filter_map(|(index, s)| {
            let kind = if s.focus_score < low {
                AnomalyKind::Low
            } else if s.focus_score > high {
                AnomalyKind::High
            } else {
                return None;
            };
            Some(FocusAnomaly {
                index,
                timestamp: s.timestamp,
                focus_score: s.focus_score,
                kind,
            })
        })
        .collect();
    debug!(low, high, anomalies = anomalies.len(), "focus anomalies");
    Ok(anomalies)
}

/// Advice for each sample, in input order.
///
/// Idle time is judged against the batch's own 75th percentile.
pub fn recommendations(samples: &[ActivitySample]) -> Result<Vec<Vec<String>>, ComputeError> {
    require_samples(samples)?;
    let idle: Vec<f64> = samples.iter().map(|s| s.idle_time).collect();
    let idle_threshold = quantile(&idle, IDLE_QUANTILE)?;

    Ok(samples
        .iter()
        .map(|s| {
            let mut advice = Vec::new();
            if DEEP_WORK_HOURS.contains(&s.timestamp.hour()) {
                advice.push(DEEP_WORK.to_string());
            }
            if s.relative_typing_rhythm < SLOW_TYPING_MARGIN {
                advice.push(TAKE_BREAK.to_string());
            }
            if s.idle_time > idle_threshold {
                advice.push(HIGH_IDLE.to_string());
            }
            advice
        })
        .collect())
}

/// Best and worst hour by mean focus score. Ties go to the earliest hour.
pub fn hour_extremes(samples: &[ActivitySample]) -> Result<HourExtremes, ComputeError> {
    require_samples(samples)?;
    let mut by_hour: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for s in samples {
        let entry = by_hour.entry(s.timestamp.hour()).or_insert((0.0, 0));
        entry.0 += s.focus_score;
        entry.1 += 1;
    }

    let means: Vec<(u32, f64)> = by_hour
        .into_iter()
        .map(|(hour, (sum, n))| (hour, sum / n as f64))
        .collect();
    let (best_hour, best_hour_focus) = means
        .iter()
        .copied()
        .fold(means[0], |best, m| if m.1 > best.1 { m } else { best });
    let (worst_hour, worst_hour_focus) = means
        .iter()
        .copied()
        .fold(means[0], |worst, m| if m.1 < worst.1 { m } else { worst });

    Ok(HourExtremes {
        best_hour,
        best_hour_focus,
        worst_hour,
        worst_hour_focus,
    })
}

/// Per-day means of focus and typing rhythm and totals of debugging time
/// and errors. Days without samples are left out.
pub fn daily_summaries(samples: &[ActivitySample]) -> Result<Vec<DailySummary>, ComputeError> {
    require_samples(samples)?;
    let mut by_day: BTreeMap<NaiveDate, Vec<&ActivitySample>> = BTreeMap::new();
    for s in samples {
        by_day.entry(s.timestamp.date_naive()).or_default().push(s);
    }

    Ok(by_day
        .into_iter()
        .map(|(date, day)| {
            let n = day.len() as f64;
            DailySummary {
                date,
                samples: day.len(),
                mean_focus_score: day.iter().map(|s| s.focus_score).sum::<f64>() / n,
                mean_typing_rhythm: day.iter().map(|s| s.typing_rhythm).sum::<f64>() / n,
                total_debugging: day.iter().map(|s| s.debugging).sum(),
                total_errors: day.iter().map(|s| s.errors).sum(),
            }
        })
        .collect())
}

/// Run every per-sample analytic over one batch
pub fn analyze_samples(samples: &[ActivitySample]) -> Result<SessionAnalytics, ComputeError> {
    let daily = daily_summaries(samples)?;
    let average_daily_focus =
        daily.iter().map(|d| d.mean_focus_score).sum::<f64>() / daily.len() as f64;

    Ok(SessionAnalytics {
        anomalies: focus_anomalies(samples)?,
        recommendations: recommendations(samples)?,
        hours: hour_extremes(samples)?,
        daily,
        average_daily_focus,
    })
}

/// Typing consistency on a 0-100 scale from inter-keystroke intervals (ms).
///
/// Only the last [`RHYTHM_WINDOW`] intervals count, later ones weighted more.
pub fn typing_rhythm(intervals_ms: &[f64]) -> f64 {
    if intervals_ms.len() < 2 {
        return 100.0;
    }
    let window = &intervals_ms[intervals_ms.len().saturating_sub(RHYTHM_WINDOW)..];
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let weighted_variance = window
        .iter()
        .enumerate()
        .map(|(i, v)| (i + 1) as f64 / n * (v - mean).powi(2))
        .sum::<f64>()
        / n;
    100.0 - (weighted_variance.sqrt() / 8.0).min(100.0)
}

/// Direction of recent focus scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
        }
    }
}

/// Compare the mean of the last [`TREND_WINDOW`] scores with the window
/// before it. Oldest score first.
pub fn productivity_trend(scores: &[f64]) -> Trend {
    let n = scores.len();
    if n <= TREND_WINDOW {
        return Trend::Stable;
    }
    let recent = &scores[n - TREND_WINDOW..];
    let previous = &scores[n.saturating_sub(2 * TREND_WINDOW)..n - TREND_WINDOW];

    let mean = |s: &[f64]| s.iter().sum::<f64>() / s.len() as f64;
    let diff = mean(recent) - mean(previous);
    if diff > TREND_MARGIN {
        Trend::Improving
    } else if diff < -TREND_MARGIN {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Rule-of-thumb focus score for when no model is reachable
pub fn heuristic_focus_score(
    idle_minutes: f64,
    current_streak: f64,
    tab_switches: f64,
    window_switches: f64,
) -> f64 {
    let raw = 100.0 - idle_minutes * 2.0 + current_streak * 0.5
        - tab_switches * 0.2
        - window_switches * 0.5;
    raw.clamp(0.0, 100.0)
}

/// How an observed value compares with its prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelativePerformance {
    #[serde(rename = "Better than expected")]
    Better,
    #[serde(rename = "Worse than expected")]
    Worse,
    #[serde(rename = "As expected")]
    AsExpected,
}

impl RelativePerformance {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelativePerformance::Better => "Better than expected",
            RelativePerformance::Worse => "Worse than expected",
            RelativePerformance::AsExpected => "As expected",
        }
    }
}

pub fn relative_performance(actual: f64, predicted: f64) -> RelativePerformance {
    let diff = actual - predicted;
    if diff > 0.0 {
        RelativePerformance::Better
    } else if diff < 0.0 {
        RelativePerformance::Worse
    } else {
        RelativePerformance::AsExpected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FlowMetrics, MetricRecord};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn session(day: u32, hour: u32, minutes: f64) -> FlowRecord {
        MetricRecord::new(
            "user_1",
            // 2024-01-01 is a Monday
            Utc.with_ymd_and_hms(2024, 1, day, hour, 15, 0).unwrap(),
            FlowMetrics {
                focus_score: 70.0,
                session_duration: minutes,
                syntax_errors: 0.0,
                warning_count: 0.0,
                problem_count: 0.0,
            },
        )
    }

    #[test]
    fn test_summary_totals_and_busiest_slots() {
        let records = vec![
            session(2, 9, 30.0),
            session(2, 14, 60.0),
            session(3, 14, 90.0),
            session(3, 9, 20.0),
            session(3, 14, 40.0),
        ];
        let summary = summarize_sessions(&records).unwrap();
        assert_eq!(summary.total_time_spent, 240.0);
        assert_eq!(summary.total_sessions, 5);
        assert_eq!(summary.average_session_duration, 48.0);
        assert_eq!(summary.most_active_hour, 14);
        assert_eq!(summary.sessions_at_hour, 3);
        assert_eq!(summary.most_active_day, "Wednesday");
        assert_eq!(summary.sessions_on_day, 3);
    }

    #[test]
    fn test_summary_ties_pick_earliest() {
        let records = vec![session(5, 16, 10.0), session(1, 8, 10.0)];
        let summary = summarize_sessions(&records).unwrap();
        assert_eq!(summary.most_active_hour, 8);
        assert_eq!(summary.most_active_day, "Monday");
    }

    #[test]
    fn test_summary_rejects_empty() {
        assert!(matches!(
            summarize_sessions(&[]),
            Err(ComputeError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_typing_rhythm() {
        assert_eq!(typing_rhythm(&[]), 100.0);
        assert_eq!(typing_rhythm(&[120.0]), 100.0);
        assert_eq!(typing_rhythm(&[150.0; 10]), 100.0);

        // mean 200, weights 0.5 and 1.0, variance (0.5*10000 + 10000) / 2
        let score = typing_rhythm(&[100.0, 300.0]);
        assert!((score - (100.0 - 7500f64.sqrt() / 8.0)).abs() < 1e-12);

        // Wildly irregular typing bottoms out at zero
        assert_eq!(typing_rhythm(&[0.0, 5000.0, 0.0, 5000.0]), 0.0);
    }

    #[test]
    fn test_typing_rhythm_uses_recent_window() {
        let mut intervals = vec![10_000.0; 5];
        intervals.extend(std::iter::repeat(100.0).take(RHYTHM_WINDOW));
        assert_eq!(typing_rhythm(&intervals), 100.0);
    }

    #[test]
    fn test_productivity_trend() {
        let mut scores = vec![50.0; 10];
        scores.extend(vec![60.0; 10]);
        assert_eq!(productivity_trend(&scores), Trend::Improving);

        let falling: Vec<f64> = scores.iter().rev().copied().collect();
        assert_eq!(productivity_trend(&falling), Trend::Declining);

        let mut flat = vec![50.0; 10];
        flat.extend(vec![55.0; 10]);
        assert_eq!(productivity_trend(&flat), Trend::Stable);

        assert_eq!(productivity_trend(&[10.0, 90.0]), Trend::Stable);
    }

    #[test]
    fn test_heuristic_focus_is_clamped() {
        assert_eq!(heuristic_focus_score(0.0, 0.0, 0.0, 0.0), 100.0);
        assert_eq!(heuristic_focus_score(10.0, 20.0, 10.0, 2.0), 87.0);
        assert_eq!(heuristic_focus_score(80.0, 0.0, 0.0, 0.0), 0.0);
    }

    fn sample(day: u32, hour: u32, focus: f64) -> ActivitySample {
        ActivitySample {
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap(),
            focus_score: focus,
            typing_rhythm: 60.0,
            relative_typing_rhythm: 0.0,
            idle_time: 5.0,
            debugging: 10.0,
            errors: 1.0,
        }
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0, 5.0];
        assert_eq!(quantile(&values, 0.0).unwrap(), 1.0);
        assert_eq!(quantile(&values, 0.5).unwrap(), 3.0);
        assert_eq!(quantile(&values, 0.75).unwrap(), 4.0);
        assert_eq!(quantile(&values, 0.125).unwrap(), 1.5);
        assert_eq!(quantile(&[7.0], 0.95).unwrap(), 7.0);
        assert!(quantile(&[], 0.5).is_err());
    }

    #[test]
    fn test_focus_anomalies_outside_percentiles() {
        let mut samples: Vec<ActivitySample> =
            (0..19).map(|i| sample(2, 10, 50.0 + i as f64)).collect();
        samples.push(sample(2, 11, 5.0));
        samples.push(sample(2, 11, 99.0));

        let anomalies = focus_anomalies(&samples).unwrap();
        let found: Vec<(usize, AnomalyKind)> = anomalies.iter().map(|a| (a.index, a.kind)).collect();
        assert_eq!(found, vec![(19, AnomalyKind::Low), (20, AnomalyKind::High)]);

        // A flat batch has nothing strictly outside its own percentiles
        let flat = vec![sample(2, 10, 70.0); 5];
        assert!(focus_anomalies(&flat).unwrap().is_empty());
    }

    #[test]
    fn test_recommendations_per_sample() {
        let mut morning = sample(2, 9, 70.0);
        morning.relative_typing_rhythm = -12.0;
        let mut idle = sample(2, 15, 60.0);
        idle.idle_time = 40.0;
        let mut boundary = sample(2, 12, 65.0);
        boundary.relative_typing_rhythm = -10.0;
        let evening = sample(2, 13, 55.0);

        let advice = recommendations(&[morning, idle, boundary, evening]).unwrap();
        assert_eq!(
            advice,
            vec![
                vec![DEEP_WORK.to_string(), TAKE_BREAK.to_string()],
                vec![HIGH_IDLE.to_string()],
                vec![DEEP_WORK.to_string()],
                vec![],
            ]
        );
    }

    #[test]
    fn test_hour_extremes_by_mean_focus() {
        let samples = vec![
            sample(2, 9, 80.0),
            sample(3, 9, 60.0),
            sample(2, 14, 90.0),
            sample(3, 14, 40.0),
            sample(2, 16, 30.0),
            sample(2, 11, 70.0),
        ];
        let hours = hour_extremes(&samples).unwrap();
        assert_eq!(
            hours,
            HourExtremes {
                best_hour: 9,
                best_hour_focus: 70.0,
                worst_hour: 16,
                worst_hour_focus: 30.0,
            }
        );
    }

    #[test]
    fn test_daily_summaries_skip_empty_days() {
        let mut late = sample(4, 18, 50.0);
        late.debugging = 25.0;
        late.errors = 4.0;
        late.typing_rhythm = 80.0;
        let samples = vec![sample(2, 9, 70.0), late, sample(2, 15, 90.0)];

        let daily = daily_summaries(&samples).unwrap();
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(daily[0].samples, 2);
        assert_eq!(daily[0].mean_focus_score, 80.0);
        assert_eq!(daily[0].total_debugging, 20.0);
        assert_eq!(daily[0].total_errors, 2.0);
        assert_eq!(daily[1].mean_typing_rhythm, 80.0);
        assert_eq!(daily[1].total_debugging, 25.0);

        let analytics = analyze_samples(&samples).unwrap();
        assert_eq!(analytics.average_daily_focus, 65.0);
        assert_eq!(analytics.recommendations.len(), 3);
    }

    #[test]
    fn test_analytics_reject_empty() {
        assert!(matches!(
            analyze_samples(&[]),
            Err(ComputeError::EmptyInput(_))
        ));
        assert!(matches!(hour_extremes(&[]), Err(ComputeError::EmptyInput(_))));
    }

    #[test]
    fn test_relative_performance() {
        assert_eq!(relative_performance(80.0, 70.0).as_str(), "Better than expected");
        assert_eq!(relative_performance(60.0, 70.0), RelativePerformance::Worse);
        assert_eq!(relative_performance(70.0, 70.0), RelativePerformance::AsExpected);
        assert_eq!(
            serde_json::to_value(RelativePerformance::AsExpected).unwrap(),
            "As expected"
        );
    }
}
