//! Demo data for `gnosis seed`.

use anyhow::Result;
use chrono::{Duration, Utc};
use rand::Rng;
use tracing::info;

use crate::activities::types::Activity;
use crate::core::shared::enums::{
    ActivityType, LeadStage, LeadStatus, Presence, Role, StaffTier, TaskPriority, TaskStatus,
};
use crate::leads::types::Lead;
use crate::security::password::hash_password;
use crate::store::CrmStore;
use crate::tasks::types::Task;
use crate::users::types::User;

pub const ADMIN_EMAIL: &str = "admin@gnosis.io";
pub const ADMIN_PASSWORD: &str = "admin123";
pub const WARMER_PASSWORD: &str = "warmer123";
pub const CLOSER_PASSWORD: &str = "closer123";

#[derive(Debug, Default)]
pub struct SeedSummary {
    pub users: usize,
    pub leads: usize,
    pub tasks: usize,
    pub activities: usize,
}

struct Staff<'a> {
    name: &'a str,
    tier: StaffTier,
    status: Presence,
    score: f64,
}

fn email(name: &str) -> String {
    format!("{}@gnosis.io", name.to_lowercase())
}

/// Clears every table and loads the demo team, leads, tasks and activity log.
pub async fn seed(store: &dyn CrmStore) -> Result<SeedSummary> {
    store.reset().await?;
    info!("Cleared existing data");

    let admin_hash = hash_password(ADMIN_PASSWORD.to_string()).await?;
    let warmer_hash = hash_password(WARMER_PASSWORD.to_string()).await?;
    let closer_hash = hash_password(CLOSER_PASSWORD.to_string()).await?;

    let mut summary = SeedSummary::default();

    let admin = store
        .insert_user(
            User::new("Admin User".into(), ADMIN_EMAIL.into(), admin_hash, Role::Admin)
                .with_status(Presence::Online)
                .with_performance_score(100.0),
        )
        .await?;
    summary.users += 1;

    let warmer_roster = [
        (Staff { name: "Maya", tier: StaffTier::W3, status: Presence::Online, score: 78.0 }, 22, 6),
        (Staff { name: "Ava", tier: StaffTier::W1, status: Presence::Away, score: 66.0 }, 18, 4),
        (Staff { name: "Rin", tier: StaffTier::W2, status: Presence::Online, score: 58.0 }, 16, 3),
        (Staff { name: "Noah", tier: StaffTier::W1, status: Presence::Online, score: 56.0 }, 14, 2),
    ];
    let mut warmers = Vec::new();
    for (member, handled, referrals) in warmer_roster {
        let mut user = User::new(member.name.into(), email(member.name), warmer_hash.clone(), Role::Warmer)
            .with_tier(member.tier)
            .with_status(member.status)
            .with_performance_score(member.score);
        user.leads_handled = handled;
        user.referrals = referrals;
        warmers.push(store.insert_user(user).await?);
    }

    let closer_roster = [
        (Staff { name: "Ivy", tier: StaffTier::C1, status: Presence::Online, score: 106.0 }, 34.0, 800.0),
        (Staff { name: "Zoe", tier: StaffTier::C3, status: Presence::Online, score: 103.0 }, 38.0, 720.0),
        (Staff { name: "Sam", tier: StaffTier::C2, status: Presence::Away, score: 81.0 }, 28.0, 650.0),
        (Staff { name: "Max", tier: StaffTier::C1, status: Presence::Online, score: 62.0 }, 22.0, 530.0),
    ];
    let mut closers = Vec::new();
    for (member, conversion, deal) in closer_roster {
        let mut user = User::new(member.name.into(), email(member.name), closer_hash.clone(), Role::Closer)
            .with_tier(member.tier)
            .with_status(member.status)
            .with_performance_score(member.score);
        user.conversion_rate = conversion;
        user.avg_deal_size = deal;
        closers.push(store.insert_user(user).await?);
    }
    summary.users += warmers.len() + closers.len();
    info!("Created {} users", summary.users);

    let (maya, ava, rin, noah) = (&warmers[0], &warmers[1], &warmers[2], &warmers[3]);
    let (ivy, zoe, sam) = (&closers[0], &closers[1], &closers[2]);
    let now = Utc::now();

    let mut planned = vec![
        Lead::new("Jordan P", "jordan@example.com")
            .with_tier(1)
            .with_score(0.9)
            .with_status(LeadStatus::Hot)
            .with_estimated_value(850.0)
            .assigned_to(Some(maya.id), Some(ivy.id)),
        Lead::new("Alex M", "alex@example.com")
            .with_tier(2)
            .with_score(0.58)
            .with_status(LeadStatus::Hot)
            .with_estimated_value(650.0)
            .assigned_to(Some(ava.id), Some(zoe.id)),
        Lead::new("Taylor S", "taylor@example.com")
            .with_tier(3)
            .with_score(0.75)
            .with_status(LeadStatus::Warm)
            .with_estimated_value(450.0)
            .assigned_to(Some(rin.id), Some(sam.id)),
        Lead::new("Casey R", "casey@example.com")
            .with_tier(1)
            .with_score(0.27)
            .with_status(LeadStatus::Warm)
            .with_estimated_value(920.0)
            .assigned_to(Some(maya.id), Some(ivy.id)),
        Lead::new("Sam Q", "samq@example.com")
            .with_tier(2)
            .with_score(0.65)
            .with_status(LeadStatus::Contacted)
            .with_stage(LeadStage::Negotiation)
            .with_estimated_value(1200.0)
            .assigned_to(Some(noah.id), Some(ivy.id)),
        Lead::new("Morgan T", "morgan@example.com")
            .with_tier(3)
            .with_score(0.55)
            .with_status(LeadStatus::Contacted)
            .with_stage(LeadStage::Demo)
            .with_estimated_value(800.0)
            .assigned_to(Some(ava.id), Some(zoe.id)),
        Lead::new("Riley K", "riley@example.com")
            .with_tier(2)
            .with_score(0.48)
            .with_status(LeadStatus::Contacted)
            .with_stage(LeadStage::Proposal)
            .with_estimated_value(950.0)
            .assigned_to(Some(maya.id), Some(sam.id)),
        Lead::new("Charlie B", "charlie@example.com").with_tier(1).with_score(0.82),
        Lead::new("Dana L", "dana@example.com").with_tier(3).with_score(0.35),
        Lead::new("Jessie W", "jessie@example.com").with_tier(2).with_score(0.71),
    ];
    let phones = ["+1-555-0101", "+1-555-0102", "+1-555-0103", "+1-555-0104", "+1-555-0105", "+1-555-0106", "+1-555-0107"];
    for (lead, phone) in planned.iter_mut().zip(phones) {
        lead.phone = Some(phone.to_string());
    }
    planned[0].scheduled_call_time = Some(now + Duration::hours(2));
    planned[1].scheduled_call_time = Some(now + Duration::hours(5));
    planned[4].probability = Some("75%".into());
    planned[5].probability = Some("60%".into());
    planned[6].probability = Some("45%".into());

    let (close_offsets, activity_offsets): (Vec<i64>, Vec<i64>) = {
        let mut rng = rand::thread_rng();
        (
            (0..3).map(|_| rng.gen_range(0..24 * 6)).collect(),
            (0..7).map(|_| rng.gen_range(0..60 * 24 * 7)).collect(),
        )
    };

    // A few won deals spread over the week so the MRR trend has a shape.
    for (i, value) in [500.0, 800.0, 1200.0].into_iter().enumerate() {
        let mut won = Lead::new(format!("Won Deal {}", i + 1), format!("won{}@example.com", i + 1))
            .with_tier(1)
            .with_score(0.95)
            .with_status(LeadStatus::ClosedWon)
            .with_stage(LeadStage::Closed)
            .with_estimated_value(value)
            .assigned_to(Some(warmers[i].id), Some(closers[i].id));
        won.closed_at = Some(now - Duration::hours(close_offsets[i]));
        planned.push(won);
    }

    let mut leads = Vec::with_capacity(planned.len());
    for lead in planned {
        leads.push(store.insert_lead(lead).await?);
    }
    summary.leads = leads.len();
    info!("Created {} leads", summary.leads);

    let task = |title: &str, priority, status, assignee: &User, due: &str| {
        let mut t = Task::new(title, assignee.id);
        t.priority = priority;
        t.status = status;
        t.due_date = due.to_string();
        t.created_by = Some(admin.id);
        t
    };
    let mut tasks = vec![
        task("Follow up with Jordan P", TaskPriority::High, TaskStatus::Pending, maya, "Today"),
        task("Send proposal to Alex M", TaskPriority::High, TaskStatus::Pending, ivy, "Today"),
        task("Review warmer scripts", TaskPriority::Medium, TaskStatus::InProgress, &admin, "Tomorrow"),
        task("Update CRM data", TaskPriority::Low, TaskStatus::Pending, zoe, "Friday"),
        task("Prepare demo for Taylor S", TaskPriority::Medium, TaskStatus::Completed, sam, "Yesterday"),
    ];
    tasks[0].related_lead = Some(leads[0].id);
    tasks[1].related_lead = Some(leads[1].id);
    tasks[4].related_lead = Some(leads[2].id);
    for t in tasks {
        store.insert_task(t).await?;
        summary.tasks += 1;
    }
    info!("Created {} tasks", summary.tasks);

    let events = [
        (ActivityType::LeadAssigned, Some(maya.id), 0, "Lead assigned to warmer"),
        (ActivityType::CallScheduled, Some(ivy.id), 1, "Call scheduled for 3:30 PM"),
        (ActivityType::DealClosed, Some(zoe.id), 2, "Deal closed won - $850"),
        (ActivityType::LeadResponded, None, 3, "Lead responded to message"),
        (ActivityType::LeadAssigned, Some(ava.id), 4, "Lead assigned to warmer"),
        (ActivityType::CallCompleted, Some(ivy.id), 5, "Demo call completed"),
        (ActivityType::LeadMarkedHot, Some(maya.id), 6, "Lead marked as hot"),
    ];
    for ((kind, actor, lead_idx, details), offset) in events.into_iter().zip(activity_offsets) {
        let lead = &leads[lead_idx];
        let at = now - Duration::minutes(offset);
        store
            .insert_activity(
                Activity::new(kind, actor, details)
                    .with_target(lead.name.clone())
                    .with_lead(lead.id)
                    .at(at),
            )
            .await?;
        summary.activities += 1;
    }
    store
        .insert_activity(
            Activity::new(ActivityType::UserLogin, Some(admin.id), "User logged in")
                .with_target(admin.name.clone()),
        )
        .await?;
    summary.activities += 1;
    info!("Created {} activities", summary.activities);

    Ok(summary)
}
