//! Types for the tasks module
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::enums::{TaskPriority, TaskStatus};
use crate::core::shared::schema::tasks;

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = tasks)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub assignee: Uuid,
    /// Free text such as "Today" or "Fri".
    pub due_date: String,
    pub related_lead: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(title: impl Into<String>, assignee: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            priority: TaskPriority::Medium,
            status: TaskStatus::Pending,
            assignee,
            due_date: "Today".to_string(),
            related_lead: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = tasks)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub assignee: Option<Uuid>,
    pub due_date: Option<String>,
    pub related_lead: Option<Option<Uuid>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TaskChanges {
    pub fn apply(&self, task: &mut Task) {
        if let Some(v) = &self.title {
            task.title = v.clone();
        }
        if let Some(v) = &self.description {
            task.description = v.clone();
        }
        if let Some(v) = self.priority {
            task.priority = v;
        }
        if let Some(v) = self.status {
            task.status = v;
        }
        if let Some(v) = self.assignee {
            task.assignee = v;
        }
        if let Some(v) = &self.due_date {
            task.due_date = v.clone();
        }
        if let Some(v) = self.related_lead {
            task.related_lead = v;
        }
        if let Some(v) = self.updated_at {
            task.updated_at = v;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub assignee: Option<Uuid>,
    pub status: Option<TaskStatus>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.assignee.map_or(true, |a| task.assignee == a)
            && self.status.map_or(true, |s| task.status == s)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub assignee: Option<Uuid>,
    pub due_date: Option<String>,
    pub related_lead: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub assignee: Option<Uuid>,
    pub due_date: Option<String>,
    pub related_lead: Option<Uuid>,
}

impl From<UpdateTaskRequest> for TaskChanges {
    fn from(req: UpdateTaskRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            priority: req.priority,
            status: req.status,
            assignee: req.assignee,
            due_date: req.due_date,
            related_lead: req.related_lead.map(Some),
            updated_at: Some(Utc::now()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    pub status: Option<TaskStatus>,
}

/// A task with the names the task board shows next to the ids.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub assignee_name: Option<String>,
    pub created_by_name: Option<String>,
    pub related_lead_name: Option<String>,
}
