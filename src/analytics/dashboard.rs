//! Role-specific dashboard summaries.
//!
//! Each role gets its own function and its own summary shape; the handler
//! picks one with a `match` on the caller's role.

use serde::Serialize;

use crate::core::shared::enums::{LeadStage, LeadStatus, Presence, Role};
use crate::core::shared::error::CrmError;
use crate::core::shared::utils::percent;
use crate::leads::types::LeadFilter;
use crate::store::CrmStore;
use crate::users::types::{User, UserFilter};

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DashboardSummary {
    Admin(AdminDashboard),
    Warmer(WarmerDashboard),
    Closer(CloserDashboard),
}

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub leads: AdminLeadCounts,
    pub revenue: Revenue,
    pub team: Team,
}

#[derive(Debug, Serialize)]
pub struct AdminLeadCounts {
    pub total: i64,
    pub hot: i64,
    pub scheduled: i64,
    pub closed: i64,
    pub unassigned: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Revenue {
    pub mrr: f64,
    pub estimated_mrr: f64,
}

#[derive(Debug, Serialize)]
pub struct Team {
    pub warmers: Headcount,
    pub closers: Headcount,
}

#[derive(Debug, Serialize)]
pub struct Headcount {
    pub total: i64,
    pub online: i64,
}

#[derive(Debug, Serialize)]
pub struct WarmerDashboard {
    pub leads: WarmerLeadCounts,
    pub performance: WarmerPerformance,
}

#[derive(Debug, Serialize)]
pub struct WarmerLeadCounts {
    pub total: i64,
    pub hot: i64,
    pub warm: i64,
    pub cold: i64,
    pub scheduled: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmerPerformance {
    pub response_rate: i64,
    pub score: f64,
    pub leads_per_day: i32,
}

#[derive(Debug, Serialize)]
pub struct CloserDashboard {
    pub leads: CloserLeadCounts,
    pub performance: CloserPerformance,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloserLeadCounts {
    pub total: i64,
    pub scheduled: i64,
    pub active_pipeline: i64,
    pub closed_won: i64,
    pub closed_lost: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloserPerformance {
    pub conversion_rate: i64,
    pub pipeline_value: f64,
    pub avg_deal_size: f64,
    pub score: f64,
}

pub async fn dashboard(store: &dyn CrmStore, caller: &User) -> Result<DashboardSummary, CrmError> {
    Ok(match caller.role {
        Role::Admin => DashboardSummary::Admin(admin_dashboard(store).await?),
        Role::Warmer => DashboardSummary::Warmer(warmer_dashboard(store, caller).await?),
        Role::Closer => DashboardSummary::Closer(closer_dashboard(store, caller).await?),
    })
}

/// Sum of `estimatedValue` over won deals.
pub async fn current_mrr(store: &dyn CrmStore) -> Result<f64, CrmError> {
    Ok(store
        .sum_lead_value(&LeadFilter::all().status(LeadStatus::ClosedWon))
        .await?)
}

async fn headcount(store: &dyn CrmStore, role: Role) -> Result<Headcount, CrmError> {
    Ok(Headcount {
        total: store.count_users(&UserFilter::role(role)).await?,
        online: store
            .count_users(&UserFilter::role(role).with_status(Presence::Online))
            .await?,
    })
}

pub async fn admin_dashboard(store: &dyn CrmStore) -> Result<AdminDashboard, CrmError> {
    let count = |filter: LeadFilter| async move { store.count_leads(&filter).await };

    let leads = AdminLeadCounts {
        total: count(LeadFilter::all()).await?,
        hot: count(LeadFilter::all().status(LeadStatus::Hot)).await?,
        scheduled: count(LeadFilter::all().status(LeadStatus::Scheduled)).await?,
        closed: count(LeadFilter::all().status(LeadStatus::ClosedWon)).await?,
        unassigned: count(LeadFilter::unassigned()).await?,
    };
    let mrr = current_mrr(store).await?;

    Ok(AdminDashboard {
        leads,
        revenue: Revenue {
            mrr,
            estimated_mrr: mrr,
        },
        team: Team {
            warmers: headcount(store, Role::Warmer).await?,
            closers: headcount(store, Role::Closer).await?,
        },
    })
}

pub async fn warmer_dashboard(
    store: &dyn CrmStore,
    warmer: &User,
) -> Result<WarmerDashboard, CrmError> {
    let mine = || LeadFilter::all().warmer(warmer.id);
    let count = |filter: LeadFilter| async move { store.count_leads(&filter).await };

    let total = count(mine()).await?;
    let contacted = count(mine().contacted(true)).await?;

    Ok(WarmerDashboard {
        leads: WarmerLeadCounts {
            total,
            hot: count(mine().status(LeadStatus::Hot)).await?,
            warm: count(mine().status(LeadStatus::Warm)).await?,
            cold: count(mine().status(LeadStatus::Cold)).await?,
            scheduled: count(mine().status(LeadStatus::Scheduled)).await?,
        },
        performance: WarmerPerformance {
            response_rate: percent(contacted, total),
            score: warmer.performance_score,
            leads_per_day: warmer.leads_handled,
        },
    })
}

pub async fn closer_dashboard(
    store: &dyn CrmStore,
    closer: &User,
) -> Result<CloserDashboard, CrmError> {
    let mine = || LeadFilter::all().closer(closer.id);
    let count = |filter: LeadFilter| async move { store.count_leads(&filter).await };

    let won = count(mine().status(LeadStatus::ClosedWon)).await?;
    let lost = count(mine().status(LeadStatus::ClosedLost)).await?;
    let pipeline = mine().any_stage(LeadStage::ACTIVE);

    Ok(CloserDashboard {
        leads: CloserLeadCounts {
            total: count(mine()).await?,
            scheduled: count(mine().status(LeadStatus::Scheduled)).await?,
            active_pipeline: count(pipeline.clone()).await?,
            closed_won: won,
            closed_lost: lost,
        },
        performance: CloserPerformance {
            conversion_rate: percent(won, won + lost),
            pipeline_value: store.sum_lead_value(&pipeline).await?,
            avg_deal_size: closer.avg_deal_size,
            score: closer.performance_score,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::types::Lead;
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn user(name: &str, role: Role) -> User {
        User::new(name.into(), format!("{name}@gnosis.test"), "x".into(), role)
    }

    #[tokio::test]
    async fn test_admin_dashboard_counts() {
        let store = InMemoryStore::new();
        let warmer = store
            .insert_user(user("wendy", Role::Warmer).with_status(Presence::Online))
            .await
            .unwrap();
        store
            .insert_user(user("walt", Role::Warmer).with_status(Presence::Away))
            .await
            .unwrap();
        let closer = store
            .insert_user(user("cleo", Role::Closer).with_status(Presence::Online))
            .await
            .unwrap();

        for value in [500.0, 800.0, 1200.0] {
            store
                .insert_lead(
                    Lead::new("won", "won@lead.test")
                        .with_status(LeadStatus::ClosedWon)
                        .with_estimated_value(value)
                        .assigned_to(Some(warmer.id), Some(closer.id)),
                )
                .await
                .unwrap();
        }
        store
            .insert_lead(Lead::new("hot", "hot@lead.test").with_status(LeadStatus::Hot))
            .await
            .unwrap();
        store
            .insert_lead(
                Lead::new("lost", "lost@lead.test")
                    .with_status(LeadStatus::ClosedLost)
                    .with_estimated_value(9000.0)
                    .assigned_to(Some(warmer.id), None),
            )
            .await
            .unwrap();

        let summary = admin_dashboard(&store).await.unwrap();
        assert_eq!(summary.leads.total, 5);
        assert_eq!(summary.leads.hot, 1);
        assert_eq!(summary.leads.closed, 3);
        assert_eq!(summary.leads.unassigned, 2);
        assert_eq!(summary.revenue.mrr, 2500.0);
        assert_eq!(summary.revenue.estimated_mrr, 2500.0);
        assert_eq!(summary.team.warmers.total, 2);
        assert_eq!(summary.team.warmers.online, 1);
        assert_eq!(summary.team.closers.online, 1);
    }

    #[tokio::test]
    async fn test_warmer_response_rate() {
        let store = InMemoryStore::new();
        let warmer = store.insert_user(user("wendy", Role::Warmer)).await.unwrap();

        let empty = warmer_dashboard(&store, &warmer).await.unwrap();
        assert_eq!(empty.leads.total, 0);
        assert_eq!(empty.performance.response_rate, 0);

        for i in 0..3 {
            let mut lead = Lead::new(format!("lead {i}"), format!("l{i}@lead.test"))
                .with_status(LeadStatus::Warm)
                .assigned_to(Some(warmer.id), None);
            if i == 0 {
                lead.last_contacted_at = Some(chrono::Utc::now());
            }
            store.insert_lead(lead).await.unwrap();
        }

        let summary = warmer_dashboard(&store, &warmer).await.unwrap();
        assert_eq!(summary.leads.total, 3);
        assert_eq!(summary.leads.warm, 3);
        assert_eq!(summary.performance.response_rate, 33);
    }

    #[tokio::test]
    async fn test_closer_conversion_and_pipeline() {
        let store = InMemoryStore::new();
        let closer = store.insert_user(user("cleo", Role::Closer)).await.unwrap();
        let other = store.insert_user(user("carl", Role::Closer)).await.unwrap();

        let mine = |lead: Lead| lead.assigned_to(None, Some(closer.id));
        for i in 0..17 {
            store
                .insert_lead(mine(Lead::new(format!("w{i}"), "w@lead.test").with_status(LeadStatus::ClosedWon)))
                .await
                .unwrap();
        }
        for i in 0..33 {
            store
                .insert_lead(mine(Lead::new(format!("l{i}"), "l@lead.test").with_status(LeadStatus::ClosedLost)))
                .await
                .unwrap();
        }
        store
            .insert_lead(mine(
                Lead::new("demo", "d@lead.test")
                    .with_stage(LeadStage::Demo)
                    .with_estimated_value(700.0),
            ))
            .await
            .unwrap();
        store
            .insert_lead(mine(
                Lead::new("new", "n@lead.test")
                    .with_stage(LeadStage::New)
                    .with_estimated_value(50.0),
            ))
            .await
            .unwrap();
        store
            .insert_lead(
                Lead::new("theirs", "t@lead.test")
                    .with_stage(LeadStage::Proposal)
                    .with_estimated_value(999.0)
                    .assigned_to(None, Some(other.id)),
            )
            .await
            .unwrap();

        let summary = closer_dashboard(&store, &closer).await.unwrap();
        assert_eq!(summary.leads.total, 52);
        assert_eq!(summary.leads.closed_won, 17);
        assert_eq!(summary.leads.closed_lost, 33);
        assert_eq!(summary.leads.active_pipeline, 1);
        assert_eq!(summary.performance.conversion_rate, 34);
        assert_eq!(summary.performance.pipeline_value, 700.0);
    }

    #[tokio::test]
    async fn test_dispatch_serializes_role_shape() {
        let store = InMemoryStore::new();
        let closer = store.insert_user(user("cleo", Role::Closer)).await.unwrap();

        let value = serde_json::to_value(dashboard(&store, &closer).await.unwrap()).unwrap();
        assert_eq!(value["leads"]["activePipeline"], json!(0));
        assert_eq!(value["performance"]["conversionRate"], json!(0));
        assert!(value["leads"].get("hot").is_none());
    }
}
