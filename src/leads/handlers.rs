use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::assignment::auto_assign;
use super::types::{
    validate_score, validate_tier, AssignRequest, CreateLeadRequest, Lead, LeadChanges,
    LeadFilter, LeadMessage, LeadNote, LeadView, ListLeadsQuery, MessageRequest, NoteRequest,
    StaffRef, UpdateLeadRequest,
};
use crate::activities::types::Activity;
use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::enums::{ActivityType, MessageSender, Role};
use crate::core::shared::error::CrmError;
use crate::core::shared::response::ApiResponse;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{required, validated_email};
use crate::store::{Page, PageQuery, DEFAULT_PAGE_SIZE};

type ApiResult = Result<ApiResponse, CrmError>;

async fn load_lead(state: &AppState, id: Uuid) -> Result<Lead, CrmError> {
    state
        .store
        .get_lead(id)
        .await?
        .ok_or_else(|| CrmError::not_found("Lead"))
}

/// Loads a lead the caller is allowed to touch. `action` ends up in the 403 message.
async fn load_visible_lead(
    state: &AppState,
    auth: &AuthenticatedUser,
    id: Uuid,
    action: &str,
) -> Result<Lead, CrmError> {
    let lead = load_lead(state, id).await?;
    if !lead.visible_to(&auth.user) {
        return Err(CrmError::Forbidden(format!(
            "Not authorized to {action} this lead"
        )));
    }
    Ok(lead)
}

/// Expands `assigned_warmer`/`assigned_closer` into staff summaries.
async fn expand(state: &AppState, leads: Vec<Lead>) -> Result<Vec<LeadView>, CrmError> {
    let ids: HashSet<Uuid> = leads
        .iter()
        .flat_map(|l| [l.assigned_warmer, l.assigned_closer])
        .flatten()
        .collect();
    let mut staff: HashMap<Uuid, Option<StaffRef>> = HashMap::with_capacity(ids.len());
    for id in ids {
        let user = state.store.get_user(id).await?;
        staff.insert(id, user.as_ref().map(StaffRef::from));
    }
    let lookup = |id: Option<Uuid>| id.and_then(|id| staff.get(&id).cloned().flatten());
    Ok(leads
        .into_iter()
        .map(|lead| LeadView {
            warmer: lookup(lead.assigned_warmer),
            closer: lookup(lead.assigned_closer),
            lead,
        })
        .collect())
}

async fn expand_one(state: &AppState, lead: Lead) -> Result<LeadView, CrmError> {
    expand(state, vec![lead])
        .await?
        .pop()
        .ok_or_else(|| CrmError::Internal("lead expansion returned nothing".into()))
}

/// Checks that an assignment target exists and holds `role`.
async fn check_assignee(state: &AppState, id: Option<Uuid>, role: Role) -> Result<(), CrmError> {
    let Some(id) = id else {
        return Ok(());
    };
    match state.store.get_user(id).await? {
        Some(user) if user.role == role => Ok(()),
        Some(_) => Err(CrmError::Validation(format!("Assigned {role} must have the {role} role"))),
        None => Err(CrmError::Validation(format!("Assigned {role} does not exist"))),
    }
}

pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Query(query): Query<ListLeadsQuery>,
) -> ApiResult {
    let mut filter = LeadFilter::all().scoped_to(&auth.user);
    if let Some(status) = query.status {
        filter = filter.status(status);
    }
    if let Some(tier) = query.tier {
        filter = filter.tier(tier);
    }

    let mut leads = state.store.list_leads(&filter).await?;
    leads.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(b.created_at.cmp(&a.created_at))
    });
    Ok(ApiResponse::list(expand(&state, leads).await?))
}

pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult {
    let lead = load_visible_lead(&state, &auth, id, "access").await?;
    Ok(ApiResponse::ok(expand_one(&state, lead).await?))
}

pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Json(req): Json<CreateLeadRequest>,
) -> ApiResult {
    auth.require_admin()?;

    let mut lead = Lead::new(
        required(req.name, "a lead name")?,
        validated_email(req.email)?,
    );
    if let Some(tier) = req.tier {
        lead.tier = validate_tier(tier).map_err(CrmError::Validation)?;
    }
    if let Some(score) = req.score {
        lead.score = validate_score(score).map_err(CrmError::Validation)?;
    }
    check_assignee(&state, req.assigned_warmer, Role::Warmer).await?;
    check_assignee(&state, req.assigned_closer, Role::Closer).await?;

    lead.phone = req.phone;
    lead.stage = req.stage.unwrap_or_default();
    lead.assigned_warmer = req.assigned_warmer;
    lead.assigned_closer = req.assigned_closer;
    lead.estimated_value = req.estimated_value;
    lead.probability = req.probability;
    lead.scheduled_call_time = req.scheduled_call_time;
    if let Some(intent) = req.intent {
        lead.intent = intent;
    }
    if let Some(speed) = req.response_speed {
        lead.response_speed = speed;
    }
    if let Some(source) = req.source {
        lead.source = source;
    }
    if let Some(status) = req.status {
        lead = lead.with_status(status);
    }

    let lead = state.store.insert_lead(lead).await?;
    state
        .store
        .insert_activity(
            Activity::new(ActivityType::LeadAssigned, Some(auth.id()), "New lead created")
                .with_target(lead.name.clone())
                .with_lead(lead.id),
        )
        .await?;

    info!("Lead {} created by {}", lead.id, auth.id());
    Ok(ApiResponse::created(expand_one(&state, lead).await?))
}

pub async fn update_lead(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateLeadRequest>,
) -> ApiResult {
    let lead = load_visible_lead(&state, &auth, id, "update").await?;

    let mut changes = LeadChanges {
        name: req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        email: match req.email {
            Some(email) => Some(validated_email(Some(email))?),
            None => None,
        },
        phone: req.phone,
        tier: req
            .tier
            .map(validate_tier)
            .transpose()
            .map_err(CrmError::Validation)?,
        score: req
            .score
            .map(validate_score)
            .transpose()
            .map_err(CrmError::Validation)?,
        status: req.status,
        stage: req.stage,
        assigned_warmer: req.assigned_warmer,
        assigned_closer: req.assigned_closer,
        intent: req.intent,
        response_speed: req.response_speed,
        estimated_value: req.estimated_value,
        probability: req.probability,
        scheduled_call_time: req.scheduled_call_time,
        source: req.source,
        ..LeadChanges::default()
    };

    if changes.touches_assignment() {
        if !auth.is_admin() {
            return Err(CrmError::Forbidden(
                "Only admins can change lead assignment".to_string(),
            ));
        }
        check_assignee(&state, changes.assigned_warmer.flatten(), Role::Warmer).await?;
        check_assignee(&state, changes.assigned_closer.flatten(), Role::Closer).await?;
    }

    if let Some(status) = req.status.filter(|s| *s != lead.status) {
        if status.is_closed() && !lead.status.is_closed() {
            changes.closed_at = Some(Some(Utc::now()));
        } else if !status.is_closed() {
            changes.closed_at = Some(None);
        }
        state
            .store
            .insert_activity(
                Activity::new(
                    status.activity_type(),
                    Some(auth.id()),
                    format!("Lead marked as {status}"),
                )
                .with_target(lead.name.clone())
                .with_lead(lead.id)
                .with_metadata(serde_json::json!({ "from": lead.status, "to": status })),
            )
            .await?;
    }

    let updated = state
        .store
        .update_lead(id, changes)
        .await?
        .ok_or_else(|| CrmError::not_found("Lead"))?;
    Ok(ApiResponse::ok(expand_one(&state, updated).await?))
}

pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult {
    auth.require_admin()?;
    if !state.store.delete_lead(id).await? {
        return Err(CrmError::not_found("Lead"));
    }
    info!("Lead {id} deleted by {}", auth.id());
    Ok(ApiResponse::message("Lead deleted successfully"))
}

pub async fn assign_leads(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    body: Option<Json<AssignRequest>>,
) -> ApiResult {
    auth.require_admin()?;
    let prioritize = body.map(|Json(b)| b.prioritize_high_tier).unwrap_or(false);

    let outcome = auto_assign(state.store.as_ref(), prioritize, &auth.user).await?;
    Ok(ApiResponse::ok(outcome.assignments).with_message(outcome.message))
}

pub async fn add_note(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<NoteRequest>,
) -> ApiResult {
    let lead = load_visible_lead(&state, &auth, id, "update").await?;
    let text = required(req.text, "note text")?;
    let note = state
        .store
        .insert_note(LeadNote::new(lead.id, Some(auth.id()), text))
        .await?;
    Ok(ApiResponse::created(note))
}

pub async fn list_notes(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> ApiResult {
    let lead = load_visible_lead(&state, &auth, id, "access").await?;
    let page = Page::from_query(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let (notes, total) = state.store.list_notes(lead.id, page).await?;
    Ok(paged(notes, total, page))
}

pub async fn add_message(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<MessageRequest>,
) -> ApiResult {
    let lead = load_visible_lead(&state, &auth, id, "update").await?;
    let text = required(req.text, "message text")?;
    let sender = req.sender.unwrap_or(MessageSender::User);

    let message = state
        .store
        .insert_message(LeadMessage::new(lead.id, sender, text))
        .await?;
    let (kind, details) = match sender {
        MessageSender::User => (ActivityType::MessageSent, "Message sent to lead"),
        MessageSender::Lead => (ActivityType::LeadResponded, "Lead responded"),
    };
    state
        .store
        .insert_activity(
            Activity::new(kind, Some(auth.id()), details)
                .with_target(lead.name.clone())
                .with_lead(lead.id),
        )
        .await?;
    Ok(ApiResponse::created(message))
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> ApiResult {
    let lead = load_visible_lead(&state, &auth, id, "access").await?;
    let page = Page::from_query(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let (messages, total) = state.store.list_messages(lead.id, page).await?;
    Ok(paged(messages, total, page))
}

fn paged<T: serde::Serialize>(items: Vec<T>, total: i64, page: Page) -> ApiResponse {
    ApiResponse::list(items)
        .with("total", total)
        .with("page", page.number())
        .with("pages", page.pages(total))
}
