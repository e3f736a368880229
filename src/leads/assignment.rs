//! Round-robin lead assignment.
//!
//! Leads missing a warmer or a closer are ordered by priority and walked once.
//! Each missing slot takes the next staff member of that role from a cursor
//! over the available pool, which is sorted by performance score. The warmer
//! and closer cursors advance independently, so a lead that already has a
//! warmer does not consume a warmer turn.
//!
//! The pairing itself is the pure [`pair`] function; [`auto_assign`] wraps it
//! with the store reads, the guarded writes and the audit trail.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::activities::types::Activity;
use crate::core::shared::enums::{ActivityType, Role};
use crate::core::shared::error::CrmError;
use crate::leads::types::{Lead, LeadFilter};
use crate::store::CrmStore;
use crate::users::types::{User, UserFilter};

pub const NO_LEADS_MESSAGE: &str = "No leads to assign";

/// Slots to fill on one lead. `None` means the slot is already taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAssignment {
    pub lead_id: Uuid,
    pub warmer: Option<Uuid>,
    pub closer: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResult {
    pub lead_id: Uuid,
    pub lead_name: String,
    pub tier: i16,
    pub score: f64,
    pub warmer: String,
    pub closer: String,
}

#[derive(Debug, Clone)]
pub struct AssignmentOutcome {
    pub assignments: Vec<AssignmentResult>,
    pub message: String,
}

/// Ascending tier then descending score when `prioritize_high_tier`,
/// otherwise descending score. Stable: input order breaks ties.
pub fn sort_for_assignment(leads: &mut [Lead], prioritize_high_tier: bool) {
    if prioritize_high_tier {
        leads.sort_by(|a, b| a.tier.cmp(&b.tier).then(b.score.total_cmp(&a.score)));
    } else {
        leads.sort_by(|a, b| b.score.total_cmp(&a.score));
    }
}

/// Best performers first; earlier accounts win ties.
pub fn sort_staff(staff: &mut [User]) {
    staff.sort_by(|a, b| {
        b.performance_score
            .total_cmp(&a.performance_score)
            .then(a.created_at.cmp(&b.created_at))
    });
}

/// Walks `leads` in order and hands out staff round-robin from the cursors.
/// Returns the plan and the cursors after the walk.
pub fn pair(
    leads: &[Lead],
    warmers: &[User],
    closers: &[User],
    mut warmer_cursor: usize,
    mut closer_cursor: usize,
) -> (Vec<PlannedAssignment>, usize, usize) {
    let mut plan = Vec::with_capacity(leads.len());
    for lead in leads {
        let mut warmer = None;
        if lead.assigned_warmer.is_none() && !warmers.is_empty() {
            warmer = Some(warmers[warmer_cursor % warmers.len()].id);
            warmer_cursor += 1;
        }
        let mut closer = None;
        if lead.assigned_closer.is_none() && !closers.is_empty() {
            closer = Some(closers[closer_cursor % closers.len()].id);
            closer_cursor += 1;
        }
        plan.push(PlannedAssignment {
            lead_id: lead.id,
            warmer,
            closer,
        });
    }
    (plan, warmer_cursor, closer_cursor)
}

/// Assigns every incompletely assigned lead. `actor` is recorded on the
/// audit entries. A failed write stops the batch; earlier leads keep their
/// assignment.
pub async fn auto_assign(
    store: &dyn CrmStore,
    prioritize_high_tier: bool,
    actor: &User,
) -> Result<AssignmentOutcome, CrmError> {
    let mut leads = store.list_leads(&LeadFilter::unassigned()).await?;
    if leads.is_empty() {
        debug!("Auto-assign requested by {} with nothing to do", actor.id);
        return Ok(AssignmentOutcome {
            assignments: Vec::new(),
            message: NO_LEADS_MESSAGE.to_string(),
        });
    }
    sort_for_assignment(&mut leads, prioritize_high_tier);

    let mut warmers = store.list_users(&UserFilter::available(Role::Warmer)).await?;
    let mut closers = store.list_users(&UserFilter::available(Role::Closer)).await?;
    if warmers.is_empty() || closers.is_empty() {
        warn!(
            "Auto-assign aborted: {} warmers and {} closers available",
            warmers.len(),
            closers.len()
        );
        return Err(CrmError::NoAvailableStaff);
    }
    sort_staff(&mut warmers);
    sort_staff(&mut closers);

    let (plan, _, _) = pair(&leads, &warmers, &closers, 0, 0);

    let mut names: HashMap<Uuid, String> = warmers
        .iter()
        .chain(closers.iter())
        .map(|u| (u.id, u.name.clone()))
        .collect();

    let mut assignments = Vec::with_capacity(plan.len());
    for planned in plan {
        let Some(write) = store
            .fill_assignment(planned.lead_id, planned.warmer, planned.closer)
            .await?
        else {
            debug!("Lead {} disappeared before assignment", planned.lead_id);
            continue;
        };
        if !write.changed {
            debug!("Lead {} was assigned concurrently, skipping", planned.lead_id);
            continue;
        }
        let lead = write.lead;

        store
            .insert_activity(
                Activity::new(
                    ActivityType::LeadAssigned,
                    Some(actor.id),
                    "Lead assigned to warmer and closer",
                )
                .with_target(lead.name.clone())
                .with_lead(lead.id)
                .with_metadata(serde_json::json!({
                    "warmer": lead.assigned_warmer,
                    "closer": lead.assigned_closer,
                    "prioritizeHighTier": prioritize_high_tier,
                })),
            )
            .await?;

        let warmer = staff_name(store, &mut names, lead.assigned_warmer).await?;
        let closer = staff_name(store, &mut names, lead.assigned_closer).await?;
        assignments.push(AssignmentResult {
            lead_id: lead.id,
            lead_name: lead.name,
            tier: lead.tier,
            score: lead.score,
            warmer,
            closer,
        });
    }

    info!(
        "Auto-assigned {} leads ({} warmers, {} closers available)",
        assignments.len(),
        warmers.len(),
        closers.len()
    );
    Ok(AssignmentOutcome {
        message: format!("{} leads assigned successfully", assignments.len()),
        assignments,
    })
}

/// Name of the persisted assignee; staff outside the available pool are
/// looked up once and cached.
async fn staff_name(
    store: &dyn CrmStore,
    names: &mut HashMap<Uuid, String>,
    id: Option<Uuid>,
) -> Result<String, CrmError> {
    let Some(id) = id else {
        return Ok(String::new());
    };
    if let Some(name) = names.get(&id) {
        return Ok(name.clone());
    }
    let name = store
        .get_user(id)
        .await?
        .map(|u| u.name)
        .unwrap_or_else(|| "Unknown".to_string());
    names.insert(id, name.clone());
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activities::types::ActivityFilter;
    use crate::core::shared::enums::Presence;
    use crate::store::{InMemoryStore, Page};
    use chrono::{Duration, Utc};

    fn staff(name: &str, role: Role, score: f64) -> User {
        User::new(name.into(), format!("{name}@gnosis.test"), "x".into(), role)
            .with_performance_score(score)
            .with_status(Presence::Online)
    }

    fn lead(name: &str, tier: i16, score: f64, age_secs: i64) -> Lead {
        let mut lead = Lead::new(name, format!("{name}@lead.test"))
            .with_tier(tier)
            .with_score(score);
        lead.created_at = Utc::now() - Duration::seconds(age_secs);
        lead
    }

    fn names(leads: &[Lead]) -> Vec<&str> {
        leads.iter().map(|l| l.name.as_str()).collect()
    }

    #[test]
    fn test_sort_prioritizes_tier_then_score() {
        let mut leads = vec![
            lead("t3-high", 3, 0.99, 40),
            lead("t1-low", 1, 0.10, 30),
            lead("t2", 2, 0.50, 20),
            lead("t1-high", 1, 0.90, 10),
        ];
        sort_for_assignment(&mut leads, true);
        assert_eq!(names(&leads), ["t1-high", "t1-low", "t2", "t3-high"]);
    }

    #[test]
    fn test_sort_by_score_is_stable() {
        let mut leads = vec![
            lead("first", 3, 0.5, 30),
            lead("best", 2, 0.9, 20),
            lead("second", 1, 0.5, 10),
        ];
        sort_for_assignment(&mut leads, false);
        assert_eq!(names(&leads), ["best", "first", "second"]);
    }

    #[test]
    fn test_pair_is_fair_round_robin() {
        let warmers = vec![staff("w1", Role::Warmer, 90.0), staff("w2", Role::Warmer, 80.0)];
        let closers = vec![
            staff("c1", Role::Closer, 90.0),
            staff("c2", Role::Closer, 80.0),
            staff("c3", Role::Closer, 70.0),
        ];
        let leads: Vec<Lead> = (0..5).map(|i| lead(&format!("l{i}"), 1, 0.5, 0)).collect();

        let (plan, wc, cc) = pair(&leads, &warmers, &closers, 0, 0);
        assert_eq!((wc, cc), (5, 5));

        let warmed = |id: Uuid| plan.iter().filter(|p| p.warmer == Some(id)).count();
        let closed = |id: Uuid| plan.iter().filter(|p| p.closer == Some(id)).count();
        assert_eq!(warmed(warmers[0].id), 3);
        assert_eq!(warmed(warmers[1].id), 2);
        assert_eq!(closed(closers[0].id), 2);
        assert_eq!(closed(closers[1].id), 2);
        assert_eq!(closed(closers[2].id), 1);
    }

    #[test]
    fn test_pair_skips_filled_slots_without_advancing() {
        let warmers = vec![staff("w1", Role::Warmer, 90.0), staff("w2", Role::Warmer, 80.0)];
        let closers = vec![staff("c1", Role::Closer, 90.0)];
        let existing = Uuid::new_v4();
        let leads = vec![
            lead("has-warmer", 1, 0.5, 0).assigned_to(Some(existing), None),
            lead("empty", 1, 0.5, 0),
        ];

        let (plan, wc, cc) = pair(&leads, &warmers, &closers, 0, 0);
        assert_eq!(plan[0].warmer, None);
        assert_eq!(plan[0].closer, Some(closers[0].id));
        assert_eq!(plan[1].warmer, Some(warmers[0].id));
        assert_eq!((wc, cc), (1, 2));
    }

    #[test]
    fn test_pair_continues_from_cursors() {
        let warmers = vec![staff("w1", Role::Warmer, 90.0), staff("w2", Role::Warmer, 80.0)];
        let closers = vec![staff("c1", Role::Closer, 90.0)];
        let leads = vec![lead("a", 1, 0.5, 0)];
        let (plan, wc, _) = pair(&leads, &warmers, &closers, 3, 0);
        assert_eq!(plan[0].warmer, Some(warmers[1].id));
        assert_eq!(wc, 4);
    }

    async fn seeded() -> (InMemoryStore, User, User, User) {
        let store = InMemoryStore::new();
        let admin = store.insert_user(staff("admin", Role::Admin, 0.0)).await.unwrap();
        let warmer = store.insert_user(staff("Wendy", Role::Warmer, 80.0)).await.unwrap();
        let closer = store.insert_user(staff("Carl", Role::Closer, 70.0)).await.unwrap();
        (store, admin, warmer, closer)
    }

    #[tokio::test]
    async fn test_two_leads_single_pool() {
        let (store, admin, warmer, closer) = seeded().await;
        store.insert_lead(lead("A", 1, 0.9, 20)).await.unwrap();
        store.insert_lead(lead("B", 2, 0.5, 10)).await.unwrap();

        let outcome = auto_assign(&store, true, &admin).await.unwrap();
        assert_eq!(outcome.message, "2 leads assigned successfully");
        let got: Vec<_> = outcome
            .assignments
            .iter()
            .map(|a| (a.lead_name.as_str(), a.warmer.as_str(), a.closer.as_str()))
            .collect();
        assert_eq!(got, [("A", "Wendy", "Carl"), ("B", "Wendy", "Carl")]);

        for lead in store.list_leads(&LeadFilter::all()).await.unwrap() {
            assert_eq!(lead.assigned_warmer, Some(warmer.id));
            assert_eq!(lead.assigned_closer, Some(closer.id));
        }

        let logged = store
            .list_activities(&ActivityFilter::for_user(admin.id), Page::first(10))
            .await
            .unwrap();
        assert_eq!(logged.len(), 2);
        assert!(logged
            .iter()
            .all(|a| a.activity_type == ActivityType::LeadAssigned));
    }

    #[tokio::test]
    async fn test_summary_reports_persisted_staff() {
        let (store, admin, _, _) = seeded().await;
        store.insert_user(staff("Walt", Role::Warmer, 60.0)).await.unwrap();
        for (i, name) in ["x", "y", "z"].iter().enumerate() {
            store
                .insert_lead(lead(name, 1, 0.9 - i as f64 * 0.1, 30 - i as i64))
                .await
                .unwrap();
        }

        let outcome = auto_assign(&store, false, &admin).await.unwrap();
        let warmers: Vec<_> = outcome.assignments.iter().map(|a| a.warmer.as_str()).collect();
        assert_eq!(warmers, ["Wendy", "Walt", "Wendy"]);

        for result in &outcome.assignments {
            let lead = store.get_lead(result.lead_id).await.unwrap().unwrap();
            let persisted = store.get_user(lead.assigned_warmer.unwrap()).await.unwrap().unwrap();
            assert_eq!(persisted.name, result.warmer);
        }
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let (store, admin, _, _) = seeded().await;
        store.insert_lead(lead("A", 1, 0.9, 0)).await.unwrap();

        auto_assign(&store, false, &admin).await.unwrap();
        let before = store.count_activities(&ActivityFilter::default()).await.unwrap();

        let outcome = auto_assign(&store, false, &admin).await.unwrap();
        assert!(outcome.assignments.is_empty());
        assert_eq!(outcome.message, NO_LEADS_MESSAGE);
        let after = store.count_activities(&ActivityFilter::default()).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_no_leads_does_not_require_staff() {
        let store = InMemoryStore::new();
        let admin = store.insert_user(staff("admin", Role::Admin, 0.0)).await.unwrap();
        let outcome = auto_assign(&store, true, &admin).await.unwrap();
        assert!(outcome.assignments.is_empty());
        assert_eq!(outcome.message, NO_LEADS_MESSAGE);
    }

    #[tokio::test]
    async fn test_missing_closers_assigns_nothing() {
        let store = InMemoryStore::new();
        let admin = store.insert_user(staff("admin", Role::Admin, 0.0)).await.unwrap();
        store.insert_user(staff("Wendy", Role::Warmer, 80.0)).await.unwrap();
        store
            .insert_user(staff("Offline", Role::Closer, 99.0).with_status(Presence::Offline))
            .await
            .unwrap();
        store.insert_lead(lead("A", 1, 0.9, 0)).await.unwrap();

        let err = auto_assign(&store, true, &admin).await.unwrap_err();
        assert!(matches!(err, CrmError::NoAvailableStaff));
        assert_eq!(store.count_leads(&LeadFilter::unassigned()).await.unwrap(), 1);
        assert_eq!(store.count_activities(&ActivityFilter::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_existing_assignee_outside_pool_is_named() {
        let (store, admin, _, closer) = seeded().await;
        let away = store
            .insert_user(staff("Olga", Role::Warmer, 10.0).with_status(Presence::Offline))
            .await
            .unwrap();
        store
            .insert_lead(lead("A", 1, 0.9, 0).assigned_to(Some(away.id), None))
            .await
            .unwrap();

        let outcome = auto_assign(&store, true, &admin).await.unwrap();
        assert_eq!(outcome.assignments.len(), 1);
        assert_eq!(outcome.assignments[0].warmer, "Olga");
        assert_eq!(outcome.assignments[0].closer, closer.name);
    }
}
