use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AssignmentWrite, CrmStore, Page, StoreResult};
use crate::activities::types::{Activity, ActivityFilter};
use crate::core::shared::error::StoreError;
use crate::leads::types::{Lead, LeadChanges, LeadFilter, LeadMessage, LeadNote};
use crate::tasks::types::{Task, TaskChanges, TaskFilter};
use crate::users::types::{User, UserChanges, UserFilter};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    leads: Vec<Lead>,
    notes: Vec<LeadNote>,
    messages: Vec<LeadMessage>,
    activities: Vec<Activity>,
    tasks: Vec<Task>,
}

/// Process-local store with the same ordering guarantees as [`super::PgStore`].
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn by_performance(a: &User, b: &User) -> Ordering {
    b.performance_score
        .total_cmp(&a.performance_score)
        .then(a.created_at.cmp(&b.created_at))
}

#[async_trait]
impl CrmStore for InMemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn reset(&self) -> StoreResult<()> {
        *self.tables.write().await = Tables::default();
        Ok(())
    }

    async fn insert_user(&self, user: User) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "duplicate key value violates unique constraint \"users_email_key\" ({})",
                user.email
            )));
        }
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim().to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .users
            .iter()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();
        users.sort_by(by_performance);
        Ok(users)
    }

    async fn count_users(&self, filter: &UserFilter) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().filter(|u| filter.matches(u)).count() as i64)
    }

    async fn update_user(&self, id: Uuid, mut changes: UserChanges) -> StoreResult<Option<User>> {
        changes.updated_at.get_or_insert_with(Utc::now);
        let mut tables = self.tables.write().await;
        if let Some(email) = &changes.email {
            if tables.users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::Conflict(format!("email {email} already in use")));
            }
        }
        Ok(tables.users.iter_mut().find(|u| u.id == id).map(|user| {
            changes.apply(user);
            user.clone()
        }))
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        if tables.users.len() == before {
            return Ok(false);
        }
        // Mirrors the ON DELETE SET NULL foreign keys.
        for lead in tables.leads.iter_mut() {
            if lead.assigned_warmer == Some(id) {
                lead.assigned_warmer = None;
            }
            if lead.assigned_closer == Some(id) {
                lead.assigned_closer = None;
            }
        }
        for note in tables.notes.iter_mut().filter(|n| n.author_id == Some(id)) {
            note.author_id = None;
        }
        for task in tables.tasks.iter_mut().filter(|t| t.created_by == Some(id)) {
            task.created_by = None;
        }
        tables.tasks.retain(|t| t.assignee != id);
        Ok(true)
    }

    async fn insert_lead(&self, lead: Lead) -> StoreResult<Lead> {
        self.tables.write().await.leads.push(lead.clone());
        Ok(lead)
    }

    async fn get_lead(&self, id: Uuid) -> StoreResult<Option<Lead>> {
        let tables = self.tables.read().await;
        Ok(tables.leads.iter().find(|l| l.id == id).cloned())
    }

    async fn list_leads(&self, filter: &LeadFilter) -> StoreResult<Vec<Lead>> {
        let tables = self.tables.read().await;
        let mut leads: Vec<Lead> = tables
            .leads
            .iter()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        leads.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(leads)
    }

    async fn count_leads(&self, filter: &LeadFilter) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables.leads.iter().filter(|l| filter.matches(l)).count() as i64)
    }

    async fn sum_lead_value(&self, filter: &LeadFilter) -> StoreResult<f64> {
        let tables = self.tables.read().await;
        Ok(tables
            .leads
            .iter()
            .filter(|l| filter.matches(l))
            .filter_map(|l| l.estimated_value)
            .sum())
    }

    async fn update_lead(&self, id: Uuid, mut changes: LeadChanges) -> StoreResult<Option<Lead>> {
        changes.updated_at.get_or_insert_with(Utc::now);
        let mut tables = self.tables.write().await;
        Ok(tables.leads.iter_mut().find(|l| l.id == id).map(|lead| {
            changes.apply(lead);
            lead.clone()
        }))
    }

    async fn delete_lead(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.leads.len();
        tables.leads.retain(|l| l.id != id);
        if tables.leads.len() == before {
            return Ok(false);
        }
        tables.notes.retain(|n| n.lead_id != id);
        tables.messages.retain(|m| m.lead_id != id);
        for task in tables.tasks.iter_mut().filter(|t| t.related_lead == Some(id)) {
            task.related_lead = None;
        }
        Ok(true)
    }

    async fn fill_assignment(
        &self,
        id: Uuid,
        warmer: Option<Uuid>,
        closer: Option<Uuid>,
    ) -> StoreResult<Option<AssignmentWrite>> {
        let mut tables = self.tables.write().await;
        let Some(lead) = tables.leads.iter_mut().find(|l| l.id == id) else {
            return Ok(None);
        };
        let mut changed = false;
        if lead.assigned_warmer.is_none() && warmer.is_some() {
            lead.assigned_warmer = warmer;
            changed = true;
        }
        if lead.assigned_closer.is_none() && closer.is_some() {
            lead.assigned_closer = closer;
            changed = true;
        }
        if changed {
            lead.updated_at = Utc::now();
        }
        Ok(Some(AssignmentWrite {
            lead: lead.clone(),
            changed,
        }))
    }

    async fn insert_note(&self, note: LeadNote) -> StoreResult<LeadNote> {
        self.tables.write().await.notes.push(note.clone());
        Ok(note)
    }

    async fn list_notes(&self, lead_id: Uuid, page: Page) -> StoreResult<(Vec<LeadNote>, i64)> {
        let tables = self.tables.read().await;
        let mut notes: Vec<LeadNote> = tables
            .notes
            .iter()
            .filter(|n| n.lead_id == lead_id)
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok((page.slice(&notes), notes.len() as i64))
    }

    async fn insert_message(&self, message: LeadMessage) -> StoreResult<LeadMessage> {
        let mut tables = self.tables.write().await;
        if let Some(lead) = tables.leads.iter_mut().find(|l| l.id == message.lead_id) {
            lead.last_contacted_at = Some(message.created_at);
            lead.updated_at = Utc::now();
        }
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(
        &self,
        lead_id: Uuid,
        page: Page,
    ) -> StoreResult<(Vec<LeadMessage>, i64)> {
        let tables = self.tables.read().await;
        let mut messages: Vec<LeadMessage> = tables
            .messages
            .iter()
            .filter(|m| m.lead_id == lead_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok((page.slice(&messages), messages.len() as i64))
    }

    async fn insert_activity(&self, activity: Activity) -> StoreResult<Activity> {
        self.tables.write().await.activities.push(activity.clone());
        Ok(activity)
    }

    async fn list_activities(
        &self,
        filter: &ActivityFilter,
        page: Page,
    ) -> StoreResult<Vec<Activity>> {
        let tables = self.tables.read().await;
        let mut activities: Vec<Activity> = tables
            .activities
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        activities.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page.slice(&activities))
    }

    async fn count_activities(&self, filter: &ActivityFilter) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables.activities.iter().filter(|a| filter.matches(a)).count() as i64)
    }

    async fn insert_task(&self, task: Task) -> StoreResult<Task> {
        self.tables.write().await.tasks.push(task.clone());
        Ok(task)
    }

    async fn get_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let tables = self.tables.read().await;
        Ok(tables.tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<Task> = tables
            .tasks
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    async fn update_task(&self, id: Uuid, mut changes: TaskChanges) -> StoreResult<Option<Task>> {
        changes.updated_at.get_or_insert_with(Utc::now);
        let mut tables = self.tables.write().await;
        Ok(tables.tasks.iter_mut().find(|t| t.id == id).map(|task| {
            changes.apply(task);
            task.clone()
        }))
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.tasks.len();
        tables.tasks.retain(|t| t.id != id);
        Ok(tables.tasks.len() != before)
    }
}
