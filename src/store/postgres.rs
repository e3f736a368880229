use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use uuid::Uuid;

use super::{AssignmentWrite, CrmStore, Page, StoreResult};
use crate::activities::types::{Activity, ActivityFilter};
use crate::core::shared::schema::{activities, lead_messages, lead_notes, leads, tasks, users};
use crate::core::shared::utils::DbPool;
use crate::leads::types::{Lead, LeadChanges, LeadFilter, LeadMessage, LeadNote};
use crate::tasks::types::{Task, TaskChanges, TaskFilter};
use crate::users::types::{User, UserChanges, UserFilter};

/// Diesel-backed store. Every call checks a connection out of the pool on a
/// blocking thread.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }
}

fn user_query(filter: &UserFilter) -> users::BoxedQuery<'static, Pg> {
    let mut query = users::table.into_boxed();
    if let Some(role) = filter.role {
        query = query.filter(users::role.eq(role));
    }
    if !filter.statuses.is_empty() {
        query = query.filter(users::status.eq_any(filter.statuses.clone()));
    }
    query
}

fn lead_query(filter: &LeadFilter) -> leads::BoxedQuery<'static, Pg> {
    let mut query = leads::table.into_boxed();
    if let Some(status) = filter.status {
        query = query.filter(leads::status.eq(status));
    }
    if !filter.statuses.is_empty() {
        query = query.filter(leads::status.eq_any(filter.statuses.clone()));
    }
    if !filter.stages.is_empty() {
        query = query.filter(leads::stage.eq_any(filter.stages.clone()));
    }
    if let Some(tier) = filter.tier {
        query = query.filter(leads::tier.eq(tier));
    }
    if let Some(warmer) = filter.assigned_warmer {
        query = query.filter(leads::assigned_warmer.eq(warmer));
    }
    if let Some(closer) = filter.assigned_closer {
        query = query.filter(leads::assigned_closer.eq(closer));
    }
    if filter.incomplete_assignment {
        query = query.filter(
            leads::assigned_warmer
                .is_null()
                .or(leads::assigned_closer.is_null()),
        );
    }
    match filter.contacted {
        Some(true) => query = query.filter(leads::last_contacted_at.is_not_null()),
        Some(false) => query = query.filter(leads::last_contacted_at.is_null()),
        None => {}
    }
    if let Some(cutoff) = filter.closed_before {
        query = query.filter(leads::closed_at.le(cutoff));
    }
    query
}

fn activity_query(filter: &ActivityFilter) -> activities::BoxedQuery<'static, Pg> {
    let mut query = activities::table.into_boxed();
    if let Some(kind) = filter.activity_type {
        query = query.filter(activities::activity_type.eq(kind));
    }
    if let Some(user_id) = filter.user_id {
        query = query.filter(activities::user_id.eq(user_id));
    }
    if let Some(search) = filter.search.as_deref() {
        query = query.filter(activities::target.ilike(like_pattern(search)));
    }
    if let Some(since) = filter.since {
        query = query.filter(activities::created_at.ge(since));
    }
    if let Some(until) = filter.until {
        query = query.filter(activities::created_at.lt(until));
    }
    query
}

fn task_query(filter: &TaskFilter) -> tasks::BoxedQuery<'static, Pg> {
    let mut query = tasks::table.into_boxed();
    if let Some(assignee) = filter.assignee {
        query = query.filter(tasks::assignee.eq(assignee));
    }
    if let Some(status) = filter.status {
        query = query.filter(tasks::status.eq(status));
    }
    query
}

/// `%term%` with LIKE metacharacters escaped.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl CrmStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            diesel::sql_query("SELECT 1").execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn reset(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.transaction(|conn| {
                diesel::delete(activities::table).execute(conn)?;
                diesel::delete(tasks::table).execute(conn)?;
                diesel::delete(lead_messages::table).execute(conn)?;
                diesel::delete(lead_notes::table).execute(conn)?;
                diesel::delete(leads::table).execute(conn)?;
                diesel::delete(users::table).execute(conn)?;
                Ok(())
            })
        })
        .await
    }

    async fn insert_user(&self, user: User) -> StoreResult<User> {
        self.with_conn(move |conn| {
            Ok(diesel::insert_into(users::table)
                .values(&user)
                .get_result(conn)?)
        })
        .await
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.with_conn(move |conn| Ok(users::table.find(id).first(conn).optional()?))
            .await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim().to_lowercase();
        self.with_conn(move |conn| {
            Ok(users::table
                .filter(users::email.eq(email))
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            Ok(user_query(&filter)
                .order((users::performance_score.desc(), users::created_at.asc()))
                .load(conn)?)
        })
        .await
    }

    async fn count_users(&self, filter: &UserFilter) -> StoreResult<i64> {
        let filter = filter.clone();
        self.with_conn(move |conn| Ok(user_query(&filter).count().get_result(conn)?))
            .await
    }

    async fn update_user(&self, id: Uuid, mut changes: UserChanges) -> StoreResult<Option<User>> {
        changes.updated_at.get_or_insert_with(Utc::now);
        self.with_conn(move |conn| {
            Ok(diesel::update(users::table.find(id))
                .set(&changes)
                .get_result(conn)
                .optional()?)
        })
        .await
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            Ok(diesel::delete(users::table.find(id)).execute(conn)? > 0)
        })
        .await
    }

    async fn insert_lead(&self, lead: Lead) -> StoreResult<Lead> {
        self.with_conn(move |conn| {
            Ok(diesel::insert_into(leads::table)
                .values(&lead)
                .get_result(conn)?)
        })
        .await
    }

    async fn get_lead(&self, id: Uuid) -> StoreResult<Option<Lead>> {
        self.with_conn(move |conn| Ok(leads::table.find(id).first(conn).optional()?))
            .await
    }

    async fn list_leads(&self, filter: &LeadFilter) -> StoreResult<Vec<Lead>> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            Ok(lead_query(&filter)
                .order((leads::created_at.asc(), leads::id.asc()))
                .load(conn)?)
        })
        .await
    }

    async fn count_leads(&self, filter: &LeadFilter) -> StoreResult<i64> {
        let filter = filter.clone();
        self.with_conn(move |conn| Ok(lead_query(&filter).count().get_result(conn)?))
            .await
    }

    async fn sum_lead_value(&self, filter: &LeadFilter) -> StoreResult<f64> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let total: Option<f64> = lead_query(&filter)
                .select(diesel::dsl::sum(leads::estimated_value))
                .first(conn)?;
            Ok(total.unwrap_or(0.0))
        })
        .await
    }

    async fn update_lead(&self, id: Uuid, mut changes: LeadChanges) -> StoreResult<Option<Lead>> {
        changes.updated_at.get_or_insert_with(Utc::now);
        self.with_conn(move |conn| {
            Ok(diesel::update(leads::table.find(id))
                .set(&changes)
                .get_result(conn)
                .optional()?)
        })
        .await
    }

    async fn delete_lead(&self, id: Uuid) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            Ok(diesel::delete(leads::table.find(id)).execute(conn)? > 0)
        })
        .await
    }

    async fn fill_assignment(
        &self,
        id: Uuid,
        warmer: Option<Uuid>,
        closer: Option<Uuid>,
    ) -> StoreResult<Option<AssignmentWrite>> {
        self.with_conn(move |conn| {
            conn.transaction(|conn| {
                let current: Option<Lead> = leads::table
                    .find(id)
                    .for_update()
                    .first(conn)
                    .optional()?;
                let Some(current) = current else {
                    return Ok(None);
                };

                let next_warmer = current.assigned_warmer.or(warmer);
                let next_closer = current.assigned_closer.or(closer);
                if next_warmer == current.assigned_warmer && next_closer == current.assigned_closer {
                    return Ok(Some(AssignmentWrite {
                        lead: current,
                        changed: false,
                    }));
                }

                let lead = diesel::update(leads::table.find(id))
                    .set((
                        leads::assigned_warmer.eq(next_warmer),
                        leads::assigned_closer.eq(next_closer),
                        leads::updated_at.eq(Utc::now()),
                    ))
                    .get_result(conn)?;
                Ok(Some(AssignmentWrite {
                    lead,
                    changed: true,
                }))
            })
        })
        .await
    }

    async fn insert_note(&self, note: LeadNote) -> StoreResult<LeadNote> {
        self.with_conn(move |conn| {
            Ok(diesel::insert_into(lead_notes::table)
                .values(&note)
                .get_result(conn)?)
        })
        .await
    }

    async fn list_notes(&self, lead_id: Uuid, page: Page) -> StoreResult<(Vec<LeadNote>, i64)> {
        self.with_conn(move |conn| {
            let total = lead_notes::table
                .filter(lead_notes::lead_id.eq(lead_id))
                .count()
                .get_result(conn)?;
            let notes = lead_notes::table
                .filter(lead_notes::lead_id.eq(lead_id))
                .order((lead_notes::created_at.desc(), lead_notes::id.desc()))
                .limit(page.limit)
                .offset(page.offset)
                .load(conn)?;
            Ok((notes, total))
        })
        .await
    }

    async fn insert_message(&self, message: LeadMessage) -> StoreResult<LeadMessage> {
        self.with_conn(move |conn| {
            conn.transaction(|conn| {
                let stored: LeadMessage = diesel::insert_into(lead_messages::table)
                    .values(&message)
                    .get_result(conn)?;
                diesel::update(leads::table.find(stored.lead_id))
                    .set((
                        leads::last_contacted_at.eq(Some(stored.created_at)),
                        leads::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)?;
                Ok(stored)
            })
        })
        .await
    }

    async fn list_messages(
        &self,
        lead_id: Uuid,
        page: Page,
    ) -> StoreResult<(Vec<LeadMessage>, i64)> {
        self.with_conn(move |conn| {
            let total = lead_messages::table
                .filter(lead_messages::lead_id.eq(lead_id))
                .count()
                .get_result(conn)?;
            let messages = lead_messages::table
                .filter(lead_messages::lead_id.eq(lead_id))
                .order((lead_messages::created_at.asc(), lead_messages::id.asc()))
                .limit(page.limit)
                .offset(page.offset)
                .load(conn)?;
            Ok((messages, total))
        })
        .await
    }

    async fn insert_activity(&self, activity: Activity) -> StoreResult<Activity> {
        self.with_conn(move |conn| {
            Ok(diesel::insert_into(activities::table)
                .values(&activity)
                .get_result(conn)?)
        })
        .await
    }

    async fn list_activities(
        &self,
        filter: &ActivityFilter,
        page: Page,
    ) -> StoreResult<Vec<Activity>> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            Ok(activity_query(&filter)
                .order((activities::created_at.desc(), activities::id.desc()))
                .limit(page.limit)
                .offset(page.offset)
                .load(conn)?)
        })
        .await
    }

    async fn count_activities(&self, filter: &ActivityFilter) -> StoreResult<i64> {
        let filter = filter.clone();
        self.with_conn(move |conn| Ok(activity_query(&filter).count().get_result(conn)?))
            .await
    }

    async fn insert_task(&self, task: Task) -> StoreResult<Task> {
        self.with_conn(move |conn| {
            Ok(diesel::insert_into(tasks::table)
                .values(&task)
                .get_result(conn)?)
        })
        .await
    }

    async fn get_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        self.with_conn(move |conn| Ok(tasks::table.find(id).first(conn).optional()?))
            .await
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            Ok(task_query(&filter)
                .order((tasks::created_at.desc(), tasks::id.desc()))
                .load(conn)?)
        })
        .await
    }

    async fn update_task(&self, id: Uuid, mut changes: TaskChanges) -> StoreResult<Option<Task>> {
        changes.updated_at.get_or_insert_with(Utc::now);
        self.with_conn(move |conn| {
            Ok(diesel::update(tasks::table.find(id))
                .set(&changes)
                .get_result(conn)
                .optional()?)
        })
        .await
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            Ok(diesel::delete(tasks::table.find(id)).execute(conn)? > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("acme"), "%acme%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
