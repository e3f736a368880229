//! Persistence seam.
//!
//! Handlers and the assignment engine only see [`CrmStore`]. Production uses
//! [`PgStore`] (diesel over an r2d2 pool); tests and local experiments use
//! [`InMemoryStore`]. Both must return identical orderings, so the sort keys
//! for every `list_*` method are documented on the trait.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::activities::types::{Activity, ActivityFilter};
use crate::core::shared::error::StoreError;
use crate::leads::types::{Lead, LeadChanges, LeadFilter, LeadMessage, LeadNote};
use crate::tasks::types::{Task, TaskChanges, TaskFilter};
use crate::users::types::{User, UserChanges, UserFilter};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 500;

/// Offset window over a sorted listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// From 1-based `page` and `limit` query parameters. Bad values fall back
    /// to the first page of `default_limit` items.
    pub fn from_query(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        let limit = match limit {
            Some(l) if l > 0 => l.min(MAX_PAGE_SIZE),
            _ => default_limit,
        };
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        Self {
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }

    pub fn first(limit: i64) -> Self {
        Self { limit, offset: 0 }
    }

    pub fn number(&self) -> i64 {
        self.offset / self.limit.max(1) + 1
    }

    pub fn pages(&self, total: i64) -> i64 {
        (total + self.limit - 1) / self.limit.max(1)
    }

    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset.max(0) as usize)
            .take(self.limit.max(0) as usize)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Result of a guarded assignment write.
#[derive(Debug, Clone)]
pub struct AssignmentWrite {
    pub lead: Lead,
    /// False when both slots were already taken by the time the write ran.
    pub changed: bool,
}

#[async_trait]
pub trait CrmStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    /// Deletes every row in every table. Used by the seeder.
    async fn reset(&self) -> StoreResult<()>;

    // users

    async fn insert_user(&self, user: User) -> StoreResult<User>;
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Sorted by `performance_score` desc, then `created_at` asc.
    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>>;
    async fn count_users(&self, filter: &UserFilter) -> StoreResult<i64>;
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool>;

    // leads

    async fn insert_lead(&self, lead: Lead) -> StoreResult<Lead>;
    async fn get_lead(&self, id: Uuid) -> StoreResult<Option<Lead>>;
    /// Sorted by `created_at` asc. Callers apply their own ordering.
    async fn list_leads(&self, filter: &LeadFilter) -> StoreResult<Vec<Lead>>;
    async fn count_leads(&self, filter: &LeadFilter) -> StoreResult<i64>;
    /// Sum of `estimated_value` over matching leads; null values count as 0.
    async fn sum_lead_value(&self, filter: &LeadFilter) -> StoreResult<f64>;
    async fn update_lead(&self, id: Uuid, changes: LeadChanges) -> StoreResult<Option<Lead>>;
    async fn delete_lead(&self, id: Uuid) -> StoreResult<bool>;

    /// Sets `warmer`/`closer` only on slots that are still empty.
    async fn fill_assignment(
        &self,
        id: Uuid,
        warmer: Option<Uuid>,
        closer: Option<Uuid>,
    ) -> StoreResult<Option<AssignmentWrite>>;

    // lead notes and messages

    async fn insert_note(&self, note: LeadNote) -> StoreResult<LeadNote>;
    /// Newest first.
    async fn list_notes(&self, lead_id: Uuid, page: Page) -> StoreResult<(Vec<LeadNote>, i64)>;
    /// Also stamps `last_contacted_at` on the lead.
    async fn insert_message(&self, message: LeadMessage) -> StoreResult<LeadMessage>;
    /// Oldest first, conversation order.
    async fn list_messages(
        &self,
        lead_id: Uuid,
        page: Page,
    ) -> StoreResult<(Vec<LeadMessage>, i64)>;

    // activities

    async fn insert_activity(&self, activity: Activity) -> StoreResult<Activity>;
    /// Newest first.
    async fn list_activities(&self, filter: &ActivityFilter, page: Page)
        -> StoreResult<Vec<Activity>>;
    async fn count_activities(&self, filter: &ActivityFilter) -> StoreResult<i64>;

    // tasks

    async fn insert_task(&self, task: Task) -> StoreResult<Task>;
    async fn get_task(&self, id: Uuid) -> StoreResult<Option<Task>>;
    /// Newest first.
    async fn list_tasks(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>>;
    async fn update_task(&self, id: Uuid, changes: TaskChanges) -> StoreResult<Option<Task>>;
    async fn delete_task(&self, id: Uuid) -> StoreResult<bool>;
}

/// Last microsecond of the UTC day containing `at`.
pub fn end_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    let start = at
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(at);
    start + chrono::Duration::days(1) - chrono::Duration::microseconds(1)
}
