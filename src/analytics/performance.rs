use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;

use crate::activities::types::{Activity, ActivityFilter};
use crate::core::shared::enums::{LeadStage, LeadStatus, Role, StaffTier};
use crate::core::shared::error::CrmError;
use crate::leads::types::LeadFilter;
use crate::store::{CrmStore, Page};
use crate::users::types::User;

pub const WEEK_DAYS: i64 = 7;
pub const RECENT_ACTIVITY_LIMIT: i64 = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceProfile {
    pub name: String,
    pub role: Role,
    pub tier: Option<StaffTier>,
    pub performance_score: f64,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LeadStats {
    Warmer { hot: i64, warm: i64, cold: i64 },
    #[serde(rename_all = "camelCase")]
    Closer {
        scheduled: i64,
        active_pipeline: i64,
        closed: i64,
    },
    None {},
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub user: PerformanceProfile,
    pub weekly_activity: Vec<i64>,
    pub lead_stats: LeadStats,
    pub recent_activities: Vec<Activity>,
}

fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// `[start, end)` bounds of the last seven UTC days ending with `now`'s day, oldest first.
pub fn week_buckets(now: DateTime<Utc>) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let today = start_of_day(now);
    (0..WEEK_DAYS)
        .rev()
        .map(|back| {
            let start = today - Duration::days(back);
            (start, start + Duration::days(1))
        })
        .collect()
}

pub async fn weekly_activity(
    store: &dyn CrmStore,
    user: &User,
    now: DateTime<Utc>,
) -> Result<Vec<i64>, CrmError> {
    let mut counts = Vec::with_capacity(WEEK_DAYS as usize);
    for (start, end) in week_buckets(now) {
        let filter = ActivityFilter::for_user(user.id).between(start, end);
        counts.push(store.count_activities(&filter).await?);
    }
    Ok(counts)
}

pub async fn lead_stats(store: &dyn CrmStore, user: &User) -> Result<LeadStats, CrmError> {
    Ok(match user.role {
        Role::Warmer => {
            let mine = || LeadFilter::all().warmer(user.id);
            LeadStats::Warmer {
                hot: store.count_leads(&mine().status(LeadStatus::Hot)).await?,
                warm: store.count_leads(&mine().status(LeadStatus::Warm)).await?,
                cold: store.count_leads(&mine().status(LeadStatus::Cold)).await?,
            }
        }
        Role::Closer => {
            let mine = || LeadFilter::all().closer(user.id);
            LeadStats::Closer {
                scheduled: store
                    .count_leads(&mine().status(LeadStatus::Scheduled))
                    .await?,
                active_pipeline: store
                    .count_leads(&mine().any_stage(LeadStage::ACTIVE))
                    .await?,
                closed: store
                    .count_leads(&mine().any_status(&[LeadStatus::ClosedWon, LeadStatus::ClosedLost]))
                    .await?,
            }
        }
        Role::Admin => LeadStats::None {},
    })
}

pub async fn performance_report(
    store: &dyn CrmStore,
    user: &User,
    now: DateTime<Utc>,
) -> Result<PerformanceReport, CrmError> {
    let recent = store
        .list_activities(
            &ActivityFilter::for_user(user.id),
            Page::first(RECENT_ACTIVITY_LIMIT),
        )
        .await?;

    Ok(PerformanceReport {
        user: PerformanceProfile {
            name: user.name.clone(),
            role: user.role,
            tier: user.tier,
            performance_score: user.performance_score,
        },
        weekly_activity: weekly_activity(store, user, now).await?,
        lead_stats: lead_stats(store, user).await?,
        recent_activities: recent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::enums::ActivityType;
    use crate::store::InMemoryStore;
    use chrono::TimeZone;

    #[test]
    fn test_week_buckets_oldest_first() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 15, 30, 0).unwrap();
        let buckets = week_buckets(now);
        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets[0].0, Utc.with_ymd_and_hms(2026, 3, 4, 0, 0, 0).unwrap());
        assert_eq!(buckets[6].0, Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap());
        assert_eq!(buckets[6].1, Utc.with_ymd_and_hms(2026, 3, 11, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_weekly_activity_counts_per_day() {
        let store = InMemoryStore::new();
        let user = store
            .insert_user(User::new("Wendy".into(), "w@gnosis.test".into(), "x".into(), Role::Warmer))
            .await
            .unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 15, 30, 0).unwrap();

        let log = |at: DateTime<Utc>| {
            Activity::new(ActivityType::MessageSent, Some(user.id), "Message sent to lead").at(at)
        };
        store.insert_activity(log(now)).await.unwrap();
        store.insert_activity(log(now - Duration::hours(2))).await.unwrap();
        store.insert_activity(log(now - Duration::days(6))).await.unwrap();
        store.insert_activity(log(now - Duration::days(7))).await.unwrap();
        store
            .insert_activity(Activity::new(ActivityType::UserLogin, None, "someone else").at(now))
            .await
            .unwrap();

        let counts = weekly_activity(&store, &user, now).await.unwrap();
        assert_eq!(counts, vec![1, 0, 0, 0, 0, 0, 2]);
    }

    #[tokio::test]
    async fn test_admin_has_empty_lead_stats() {
        let store = InMemoryStore::new();
        let admin = User::new("Ada".into(), "a@gnosis.test".into(), "x".into(), Role::Admin);
        let stats = lead_stats(&store, &admin).await.unwrap();
        assert_eq!(serde_json::to_value(stats).unwrap(), serde_json::json!({}));
    }
}
