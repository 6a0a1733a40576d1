//! Dashboard aggregations over judged questions and user sessions.
//!
//! Every series has one point per calendar day (UTC) that has data,
//! oldest first.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use billy_types::{
    Result,
    analytics::{QueryRecord, SessionRecord},
    time::parse_timestamp,
};
use crate::ports::AnalyticsPort;

/// Days covered by the accuracy and active-user charts
pub const WEEK_DAYS: i64 = 7;
/// Days covered by the session duration chart
pub const MONTH_DAYS: i64 = 30;
/// A user is active on a day with more than this many questions
pub const ACTIVE_USER_THRESHOLD: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyPoint {
    pub date: NaiveDate,
    /// Percent of the day's judged answers marked correct
    pub total: f64,
    pub buckets: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUsersPoint {
    pub date: NaiveDate,
    pub active_users: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DurationPoint {
    pub date: NaiveDate,
    /// Mean session length that day, in minutes
    pub average_minutes: f64,
    pub last_week: f64,
    pub last_two_weeks: f64,
    pub last_month: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardSummary {
    pub total_sessions: usize,
    pub total_users: usize,
    /// Mean length of sessions that have ended, in minutes
    pub average_session_minutes: f64,
    pub prompts_last_week: usize,
    pub prompts_per_day: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardData {
    pub summary: DashboardSummary,
    pub accuracy: Vec<AccuracyPoint>,
    pub accuracy_trend: Option<f64>,
    pub active_users: Vec<ActiveUsersPoint>,
    pub active_users_trend: Option<f64>,
    pub durations: Vec<DurationPoint>,
    pub duration_trend: Option<f64>,
}

fn since(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days)
}

/// Records created within the last week, with their timestamps.
fn recent<'a>(records: &'a [QueryRecord], now: DateTime<Utc>) -> Vec<(DateTime<Utc>, &'a QueryRecord)> {
    let cutoff = since(now, WEEK_DAYS);
    records
        .iter()
        .filter_map(|r| parse_timestamp(&r.created_at).map(|ts| (ts, r)))
        .filter(|(ts, _)| *ts >= cutoff)
        .collect()
}

fn percent_correct<'a>(records: impl Iterator<Item = &'a QueryRecord>) -> f64 {
    let (total, correct) = records.fold((0usize, 0usize), |(t, c), r| {
        (t + 1, c + usize::from(r.is_correct()))
    });
    if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64 * 100.0
    }
}

/// Daily answer accuracy over the last week, overall and per bucket.
pub fn accuracy_over_time(records: &[QueryRecord], now: DateTime<Utc>) -> Vec<AccuracyPoint> {
    let recent = recent(records, now);
    let buckets: BTreeSet<&str> = recent
        .iter()
        .filter_map(|(_, r)| r.bucket.as_deref())
        .collect();

    let mut by_day: BTreeMap<NaiveDate, Vec<&QueryRecord>> = BTreeMap::new();
    for (ts, record) in &recent {
        by_day.entry(ts.date_naive()).or_default().push(*record);
    }

    by_day
        .into_iter()
        .map(|(date, day)| AccuracyPoint {
            date,
            total: percent_correct(day.iter().copied()),
            buckets: buckets
                .iter()
                .map(|b| {
                    let in_bucket = day.iter().copied().filter(|r| r.bucket.as_deref() == Some(*b));
                    (b.to_string(), percent_correct(in_bucket))
                })
                .collect(),
        })
        .collect()
}

/// Users with more than five questions per day, over the last week.
pub fn active_users(records: &[QueryRecord], now: DateTime<Utc>) -> Vec<ActiveUsersPoint> {
    let mut by_day: BTreeMap<NaiveDate, HashMap<&str, usize>> = BTreeMap::new();
    for (ts, record) in recent(records, now) {
        let user = record.user_id.as_deref().unwrap_or_default();
        *by_day.entry(ts.date_naive()).or_default().entry(user).or_default() += 1;
    }
    by_day
        .into_iter()
        .map(|(date, users)| ActiveUsersPoint {
            date,
            active_users: users.values().filter(|&&n| n > ACTIVE_USER_THRESHOLD).count(),
        })
        .collect()
}

/// Seconds in a Postgres interval such as `01:02:03` or
/// `1 day 02:03:04`.
pub fn parse_interval_seconds(text: &str) -> Option<u64> {
    let mut tokens = text.split_whitespace();
    let mut total = 0u64;
    let mut seen = false;

    while let Some(token) = tokens.next() {
        if token.contains(':') {
            total = total.checked_add(parse_clock(token)?)?;
        } else {
            let days: u64 = token.parse().ok()?;
            match tokens.next() {
                Some("day" | "days") => {
                    total = total.checked_add(days.checked_mul(86_400)?)?;
                }
                _ => return None,
            }
        }
        seen = true;
    }
    seen.then_some(total)
}

fn parse_clock(clock: &str) -> Option<u64> {
    let mut parts = clock.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds.trunc() as u64)
}

/// Length of a session in seconds: the stored interval, else end minus
/// start, else time since start for a session still running.
pub fn session_seconds(session: &SessionRecord, now: DateTime<Utc>) -> Option<f64> {
    if let Some(secs) = session.duration.as_deref().and_then(parse_interval_seconds) {
        return Some(secs as f64);
    }
    let start = parse_timestamp(&session.session_start)?;
    let end = session
        .session_end
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(now);
    Some((end - start).num_milliseconds() as f64 / 1000.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Mean of the trailing `window` points ending at `index`.
fn rolling(values: &[f64], index: usize, window: usize) -> f64 {
    let start = (index + 1).saturating_sub(window);
    mean(&values[start..=index])
}

/// Daily mean session length over the last month, with rolling means.
pub fn session_durations(sessions: &[SessionRecord], now: DateTime<Utc>) -> Vec<DurationPoint> {
    let cutoff = since(now, MONTH_DAYS);
    let mut by_day: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for session in sessions {
        let Some(start) = parse_timestamp(&session.session_start) else {
            continue;
        };
        if start < cutoff {
            continue;
        }
        if let Some(secs) = session_seconds(session, now) {
            by_day.entry(start.date_naive()).or_default().push(secs);
        }
    }

    let days: Vec<(NaiveDate, f64)> = by_day
        .into_iter()
        .map(|(date, secs)| (date, mean(&secs) / 60.0))
        .collect();
    let averages: Vec<f64> = days.iter().map(|(_, avg)| *avg).collect();

    days.iter()
        .enumerate()
        .map(|(i, (date, avg))| DurationPoint {
            date: *date,
            average_minutes: *avg,
            last_week: rolling(&averages, i, 7),
            last_two_weeks: rolling(&averages, i, 14),
            last_month: rolling(&averages, i, 30),
        })
        .collect()
}

/// Percent change between the last two points. None with fewer than two
/// points or a zero previous value.
pub fn trend(series: &[f64]) -> Option<f64> {
    let [.., previous, last] = series else {
        return None;
    };
    if *previous == 0.0 {
        return None;
    }
    Some((last - previous) / previous * 100.0)
}

pub fn summarize(queries: &[QueryRecord], sessions: &[SessionRecord], now: DateTime<Utc>) -> DashboardSummary {
    let users: HashSet<&str> = sessions.iter().map(|s| s.user_id.as_str()).collect();

    let completed: Vec<f64> = sessions
        .iter()
        .filter_map(|s| {
            let start = parse_timestamp(&s.session_start)?;
            let end = parse_timestamp(s.session_end.as_deref()?)?;
            Some((end - start).num_milliseconds() as f64 / 60_000.0)
        })
        .collect();

    let prompts_last_week = recent(queries, now).len();

    DashboardSummary {
        total_sessions: sessions.len(),
        total_users: users.len(),
        average_session_minutes: mean(&completed),
        prompts_last_week,
        prompts_per_day: prompts_last_week as f64 / WEEK_DAYS as f64,
    }
}

pub fn build_dashboard(queries: &[QueryRecord], sessions: &[SessionRecord], now: DateTime<Utc>) -> DashboardData {
    let accuracy = accuracy_over_time(queries, now);
    let active = active_users(queries, now);
    let durations = session_durations(sessions, now);

    let accuracy_trend = trend(&accuracy.iter().map(|p| p.total).collect::<Vec<_>>());
    let active_users_trend = trend(&active.iter().map(|p| p.active_users as f64).collect::<Vec<_>>());
    let duration_trend = trend(&durations.iter().map(|p| p.last_week).collect::<Vec<_>>());

    DashboardData {
        summary: summarize(queries, sessions, now),
        accuracy,
        accuracy_trend,
        active_users: active,
        active_users_trend,
        durations,
        duration_trend,
    }
}

/// Fetch the last week of judged questions and every session, then
/// aggregate.
pub async fn load_dashboard(port: &dyn AnalyticsPort, now: DateTime<Utc>) -> Result<DashboardData> {
    let cutoff = since(now, WEEK_DAYS).to_rfc3339();
    let queries = port.query_records(Some(&cutoff)).await?;
    let sessions = port.session_records().await?;
    log::info!(
        "Dashboard loaded: {} judged questions, {} sessions",
        queries.len(),
        sessions.len()
    );
    Ok(build_dashboard(&queries, &sessions, now))
}
