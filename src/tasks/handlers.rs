use axum::extract::{Path, Query, State};
use axum::Json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::types::{
    CreateTaskRequest, ListTasksQuery, Task, TaskChanges, TaskFilter, TaskView, UpdateTaskRequest,
};
use crate::activities::types::Activity;
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::enums::{ActivityType, TaskStatus};
use crate::core::shared::error::CrmError;
use crate::core::shared::response::ApiResponse;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::required;
use crate::users::types::User;

type ApiResult = Result<ApiResponse, CrmError>;

async fn load_task(state: &AppState, id: Uuid) -> Result<Task, CrmError> {
    state
        .store
        .get_task(id)
        .await?
        .ok_or_else(|| CrmError::not_found("Task"))
}

fn ensure_assignee_or_admin(auth: &AuthenticatedUser, task: &Task, action: &str) -> Result<(), CrmError> {
    if auth.is_admin() || task.assignee == auth.id() {
        Ok(())
    } else {
        Err(CrmError::Forbidden(format!(
            "Not authorized to {action} this task"
        )))
    }
}

async fn existing_user(state: &AppState, id: Uuid) -> Result<User, CrmError> {
    state
        .store
        .get_user(id)
        .await?
        .ok_or_else(|| CrmError::Validation("Assignee does not exist".to_string()))
}

async fn check_related_lead(state: &AppState, id: Option<Uuid>) -> Result<(), CrmError> {
    if let Some(id) = id {
        if state.store.get_lead(id).await?.is_none() {
            return Err(CrmError::Validation("Related lead does not exist".to_string()));
        }
    }
    Ok(())
}

async fn views(state: &AppState, tasks: Vec<Task>) -> Result<Vec<TaskView>, CrmError> {
    let mut users: HashMap<Uuid, Option<String>> = HashMap::new();
    let mut leads: HashMap<Uuid, Option<String>> = HashMap::new();
    let mut out = Vec::with_capacity(tasks.len());

    for task in tasks {
        for id in std::iter::once(task.assignee).chain(task.created_by) {
            if !users.contains_key(&id) {
                let name = state.store.get_user(id).await?.map(|u| u.name);
                users.insert(id, name);
            }
        }
        if let Some(id) = task.related_lead {
            if !leads.contains_key(&id) {
                let name = state.store.get_lead(id).await?.map(|l| l.name);
                leads.insert(id, name);
            }
        }
        out.push(TaskView {
            assignee_name: users.get(&task.assignee).cloned().flatten(),
            created_by_name: task.created_by.and_then(|id| users.get(&id).cloned().flatten()),
            related_lead_name: task.related_lead.and_then(|id| leads.get(&id).cloned().flatten()),
            task,
        });
    }
    Ok(out)
}

async fn view(state: &AppState, task: Task) -> Result<TaskView, CrmError> {
    views(state, vec![task])
        .await?
        .pop()
        .ok_or_else(|| CrmError::Internal("task expansion returned nothing".into()))
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult {
    let filter = TaskFilter {
        assignee: (!auth.is_admin()).then(|| auth.id()),
        status: query.status,
    };
    let tasks = state.store.list_tasks(&filter).await?;
    Ok(ApiResponse::list(views(&state, tasks).await?))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult {
    let task = load_task(&state, id).await?;
    ensure_assignee_or_admin(&auth, &task, "access")?;
    Ok(ApiResponse::ok(view(&state, task).await?))
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult {
    let title = required(req.title, "a task title")?;
    let assignee = existing_user(&state, req.assignee.unwrap_or_else(|| auth.id())).await?;
    check_related_lead(&state, req.related_lead).await?;

    let mut task = Task::new(title, assignee.id);
    task.description = req.description.unwrap_or_default();
    task.priority = req.priority.unwrap_or_default();
    task.status = req.status.unwrap_or_default();
    if let Some(due) = req.due_date {
        task.due_date = due;
    }
    task.related_lead = req.related_lead;
    task.created_by = Some(auth.id());

    let task = state.store.insert_task(task).await?;
    state
        .store
        .insert_activity(
            Activity::new(
                ActivityType::TaskCreated,
                Some(auth.id()),
                format!("Task created: {}", task.title),
            )
            .with_target(assignee.name),
        )
        .await?;
    Ok(ApiResponse::created(view(&state, task).await?))
}

pub async fn update_task(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult {
    let task = load_task(&state, id).await?;
    ensure_assignee_or_admin(&auth, &task, "update")?;
    if let Some(assignee) = req.assignee {
        existing_user(&state, assignee).await?;
    }
    check_related_lead(&state, req.related_lead).await?;

    let completing = req.status == Some(TaskStatus::Completed) && !task.is_completed();
    let mut changes = TaskChanges::from(req);
    changes.title = changes.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());

    let updated = state
        .store
        .update_task(id, changes)
        .await?
        .ok_or_else(|| CrmError::not_found("Task"))?;

    if completing {
        let assignee = state.store.get_user(updated.assignee).await?;
        state
            .store
            .insert_activity(
                Activity::new(
                    ActivityType::TaskCompleted,
                    Some(auth.id()),
                    format!("Task completed: {}", updated.title),
                )
                .with_target(assignee.map(|u| u.name).unwrap_or_default()),
            )
            .await?;
    }
    Ok(ApiResponse::ok(view(&state, updated).await?))
}

pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult {
    let task = load_task(&state, id).await?;
    if !auth.is_admin() && task.created_by != Some(auth.id()) {
        return Err(CrmError::Forbidden(
            "Not authorized to delete this task".to_string(),
        ));
    }
    state.store.delete_task(id).await?;
    Ok(ApiResponse::message("Task deleted successfully"))
}
