//! Read-only projections over the dialog log and stored profiles.
//!
//! Only assistant turns count as answers; quality and safety figures are
//! computed over them.

use crate::classify::Phase;
use crate::error::StoreError;
use crate::profile::PsychoProfile;
use crate::store::{DialogEvent, ProfileStore, Role};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

pub const SUMMARY_WINDOW_DAYS: i64 = 30;
pub const USER_EVENTS_LIMIT: usize = 30;
pub const QUALITY_SERIES_DAYS: i64 = 14;
const CONFIDENCE_BUCKETS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseCount {
    pub phase: Phase,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub avg_quality_30d: Option<f32>,
    /// 1 − (safety-flagged answers / answers).
    pub safety_rate_30d: Option<f32>,
    pub answers_30d: usize,
    pub phases: Vec<PhaseCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceBucket {
    /// Half-open range such as `"0.4-0.5"`; the last bucket includes 1.0.
    pub range: String,
    pub users: usize,
}

/// Users whose first event falls 14 to 7 days ago, and how many of them came
/// back during the last 7 days.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Retention {
    pub cohort: usize,
    pub retained: usize,
    pub rate: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub kpi: Kpi,
    pub confidence_hist: Vec<ConfidenceBucket>,
    pub retention7d: Retention,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyQuality {
    pub day: NaiveDate,
    pub avg_quality: Option<f32>,
    pub safety_rate: Option<f32>,
    pub answers_total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserReport {
    pub profile: Option<PsychoProfile>,
    /// Newest first.
    pub last_events: Vec<DialogEvent>,
    /// Days with at least one answer, newest first.
    pub quality_14d: Vec<DailyQuality>,
}

#[derive(Debug, Default)]
struct Tally {
    answers: usize,
    flagged: usize,
    quality_sum: f32,
    quality_n: usize,
}

impl Tally {
    fn add(&mut self, event: &DialogEvent) {
        if event.role != Role::Assistant {
            return;
        }
        self.answers += 1;
        if event.safety {
            self.flagged += 1;
        }
        if let Some(q) = event.quality {
            self.quality_sum += q;
            self.quality_n += 1;
        }
    }

    fn avg_quality(&self) -> Option<f32> {
        (self.quality_n > 0).then(|| self.quality_sum / self.quality_n as f32)
    }

    fn safety_rate(&self) -> Option<f32> {
        (self.answers > 0).then(|| 1.0 - self.flagged as f32 / self.answers as f32)
    }
}

pub fn summary(store: &ProfileStore, now: DateTime<Utc>) -> Result<SummaryReport, StoreError> {
    let since = (now - Duration::days(SUMMARY_WINDOW_DAYS)).timestamp_millis();
    let mut tally = Tally::default();
    let mut phase_counts = [0usize; 5];
    for event in store.events_since(since)? {
        if event.role == Role::Assistant {
            if let Some(i) = Phase::all().iter().position(|p| *p == event.phase) {
                phase_counts[i] += 1;
            }
        }
        tally.add(&event);
    }
    let phases = Phase::all()
        .into_iter()
        .zip(phase_counts)
        .map(|(phase, count)| PhaseCount { phase, count })
        .collect();

    let report = SummaryReport {
        kpi: Kpi {
            avg_quality_30d: tally.avg_quality(),
            safety_rate_30d: tally.safety_rate(),
            answers_30d: tally.answers,
            phases,
        },
        confidence_hist: confidence_histogram(&store.profiles()?),
        retention7d: retention(store, now)?,
    };
    tracing::info!(
        target: "anima::reports",
        answers = report.kpi.answers_30d,
        cohort = report.retention7d.cohort,
        "summary report built"
    );
    Ok(report)
}

fn confidence_histogram(profiles: &[PsychoProfile]) -> Vec<ConfidenceBucket> {
    let mut counts = [0usize; CONFIDENCE_BUCKETS];
    for profile in profiles {
        // Small epsilon keeps values like 0.7 out of the bucket below.
        let idx = ((profile.confidence.clamp(0.0, 1.0) * 10.0 + 1e-4).floor() as usize).min(CONFIDENCE_BUCKETS - 1);
        counts[idx] += 1;
    }
    counts
        .iter()
        .enumerate()
        .filter(|(_, n)| **n > 0)
        .map(|(i, n)| ConfidenceBucket {
            range: format!("{:.1}-{:.1}", i as f32 / 10.0, (i + 1) as f32 / 10.0),
            users: *n,
        })
        .collect()
}

fn retention(store: &ProfileStore, now: DateTime<Utc>) -> Result<Retention, StoreError> {
    let cohort_start = (now - Duration::days(14)).timestamp_millis();
    let cohort_end = (now - Duration::days(7)).timestamp_millis();
    let mut out = Retention::default();
    for user_id in store.user_ids()? {
        let Some(first) = store.first_event(user_id)? else {
            continue;
        };
        if first.created_at_ms < cohort_start || first.created_at_ms >= cohort_end {
            continue;
        }
        out.cohort += 1;
        if !store.user_events_since(user_id, cohort_end)?.is_empty() {
            out.retained += 1;
        }
    }
    out.rate = (out.cohort > 0).then(|| out.retained as f32 / out.cohort as f32);
    Ok(out)
}

pub fn user_report(store: &ProfileStore, user_id: i64, now: DateTime<Utc>) -> Result<UserReport, StoreError> {
    let since = (now - Duration::days(QUALITY_SERIES_DAYS)).timestamp_millis();
    let mut days: BTreeMap<NaiveDate, Tally> = BTreeMap::new();
    for event in store.user_events_since(user_id, since)? {
        if event.role != Role::Assistant {
            continue;
        }
        let Some(at) = DateTime::<Utc>::from_timestamp_millis(event.created_at_ms) else {
            continue;
        };
        days.entry(at.date_naive()).or_default().add(&event);
    }
    let quality_14d = days
        .into_iter()
        .rev()
        .map(|(day, tally)| DailyQuality {
            day,
            avg_quality: tally.avg_quality(),
            safety_rate: tally.safety_rate(),
            answers_total: tally.answers,
        })
        .collect();

    let report = UserReport {
        profile: store.profile(user_id)?,
        last_events: store.recent_events(user_id, USER_EVENTS_LIMIT)?,
        quality_14d,
    };
    tracing::info!(target: "anima::reports", user_id, events = report.last_events.len(), "user report built");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap()
    }

    fn days_ago(n: i64) -> i64 {
        (now() - Duration::days(n)).timestamp_millis()
    }

    fn answer(user_id: i64, phase: Phase, quality: f32, days: i64) -> DialogEvent {
        DialogEvent::assistant(user_id, "reply", phase).with_quality(quality).at(days_ago(days))
    }

    fn seeded_store() -> ProfileStore {
        let store = ProfileStore::temporary().unwrap();
        for uid in [1, 2, 3] {
            store.ensure_user(uid, None, None, None).unwrap();
        }
        store.log_event(DialogEvent::user(1, "hello", Phase::Engage).at(days_ago(10))).unwrap();
        store.log_event(answer(1, Phase::Engage, 1.0, 10)).unwrap();
        store.log_event(answer(1, Phase::Support, 0.5, 2).flagged_safety()).unwrap();
        store.log_event(answer(2, Phase::Focus, 0.75, 9)).unwrap();
        store.log_event(DialogEvent::user(3, "long ago", Phase::Engage).at(days_ago(40))).unwrap();
        store.log_event(answer(3, Phase::Engage, 1.0, 1)).unwrap();

        for (uid, confidence) in [(1, 0.4), (2, 0.45), (3, 0.99)] {
            let mut profile = PsychoProfile::neutral(uid);
            profile.confidence = confidence;
            store.put_profile(&profile).unwrap();
        }
        store
    }

    fn close(a: Option<f32>, b: f32) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-5)
    }

    #[test]
    fn summary_kpis() {
        let store = seeded_store();
        let report = summary(&store, now()).unwrap();
        assert_eq!(report.kpi.answers_30d, 4);
        assert!(close(report.kpi.avg_quality_30d, 0.8125));
        assert!(close(report.kpi.safety_rate_30d, 0.75));
        let count = |phase| report.kpi.phases.iter().find(|p| p.phase == phase).unwrap().count;
        assert_eq!(count(Phase::Engage), 2);
        assert_eq!(count(Phase::Focus), 1);
        assert_eq!(count(Phase::Support), 1);
        assert_eq!(count(Phase::Plan), 0);
    }

    #[test]
    fn confidence_histogram_buckets() {
        let report = summary(&seeded_store(), now()).unwrap();
        assert_eq!(
            report.confidence_hist,
            vec![
                ConfidenceBucket { range: "0.4-0.5".into(), users: 2 },
                ConfidenceBucket { range: "0.9-1.0".into(), users: 1 },
            ]
        );
    }

    #[test]
    fn retention_counts_the_cohort_that_came_back() {
        let report = summary(&seeded_store(), now()).unwrap();
        assert_eq!(report.retention7d.cohort, 2);
        assert_eq!(report.retention7d.retained, 1);
        assert!(close(report.retention7d.rate, 0.5));
    }

    #[test]
    fn empty_store_has_no_rates() {
        let store = ProfileStore::temporary().unwrap();
        let report = summary(&store, now()).unwrap();
        assert_eq!(report.kpi.answers_30d, 0);
        assert!(report.kpi.avg_quality_30d.is_none());
        assert!(report.retention7d.rate.is_none());
        assert!(report.confidence_hist.is_empty());
    }

    #[test]
    fn user_report_series_is_daily_and_newest_first() {
        let store = seeded_store();
        let report = user_report(&store, 1, now()).unwrap();
        assert!(report.profile.is_some());
        assert_eq!(report.last_events.len(), 3);
        assert_eq!(report.last_events[0].phase, Phase::Support);
        assert_eq!(report.quality_14d.len(), 2);
        let latest = &report.quality_14d[0];
        assert_eq!(latest.day, (now() - Duration::days(2)).date_naive());
        assert!(close(latest.avg_quality, 0.5));
        assert!(close(latest.safety_rate, 0.0));
        assert!(close(report.quality_14d[1].safety_rate, 1.0));
    }

    #[test]
    fn unknown_user_report_is_empty() {
        let report = user_report(&ProfileStore::temporary().unwrap(), 99, now()).unwrap();
        assert!(report.profile.is_none());
        assert!(report.last_events.is_empty());
        assert!(report.quality_14d.is_empty());
    }
}
