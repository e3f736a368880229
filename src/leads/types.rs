use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::enums::{LeadStage, LeadStatus, MessageSender, Role, StaffTier};
use crate::core::shared::schema::{lead_messages, lead_notes, leads};
use crate::users::types::User;

pub const DEFAULT_LEAD_TIER: i16 = 3;
pub const DEFAULT_LEAD_SCORE: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = leads)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// 1 is the highest priority.
    pub tier: i16,
    pub score: f64,
    pub status: LeadStatus,
    pub stage: LeadStage,
    pub assigned_warmer: Option<Uuid>,
    pub assigned_closer: Option<Uuid>,
    pub intent: String,
    pub response_speed: String,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub estimated_value: Option<f64>,
    pub probability: Option<String>,
    pub scheduled_call_time: Option<DateTime<Utc>>,
    pub source: String,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            phone: None,
            tier: DEFAULT_LEAD_TIER,
            score: DEFAULT_LEAD_SCORE,
            status: LeadStatus::Cold,
            stage: LeadStage::New,
            assigned_warmer: None,
            assigned_closer: None,
            intent: "--".to_string(),
            response_speed: "--".to_string(),
            last_contacted_at: None,
            estimated_value: None,
            probability: None,
            scheduled_call_time: None,
            source: "manual".to_string(),
            closed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_tier(mut self, tier: i16) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn with_status(mut self, status: LeadStatus) -> Self {
        self.status = status;
        if status.is_closed() {
            self.closed_at = Some(self.updated_at);
        }
        self
    }

    pub fn with_stage(mut self, stage: LeadStage) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_estimated_value(mut self, value: f64) -> Self {
        self.estimated_value = Some(value);
        self
    }

    pub fn assigned_to(mut self, warmer: Option<Uuid>, closer: Option<Uuid>) -> Self {
        self.assigned_warmer = warmer;
        self.assigned_closer = closer;
        self
    }

    pub fn is_fully_assigned(&self) -> bool {
        self.assigned_warmer.is_some() && self.assigned_closer.is_some()
    }

    /// Warmers see leads they warm, closers leads they close, admins everything.
    pub fn visible_to(&self, user: &User) -> bool {
        match user.role {
            Role::Admin => true,
            Role::Warmer => self.assigned_warmer == Some(user.id),
            Role::Closer => self.assigned_closer == Some(user.id),
        }
    }
}

pub fn validate_tier(tier: i16) -> Result<i16, String> {
    if (1..=3).contains(&tier) {
        Ok(tier)
    } else {
        Err(format!("Tier must be 1, 2 or 3 (got {tier})"))
    }
}

pub fn validate_score(score: f64) -> Result<f64, String> {
    if (0.0..=1.0).contains(&score) {
        Ok(score)
    } else {
        Err(format!("Score must be between 0 and 1 (got {score})"))
    }
}

/// Column updates for a single lead. Nullable columns use `Option<Option<_>>`
/// so a request can clear them.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = leads)]
pub struct LeadChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Option<String>>,
    pub tier: Option<i16>,
    pub score: Option<f64>,
    pub status: Option<LeadStatus>,
    pub stage: Option<LeadStage>,
    pub assigned_warmer: Option<Option<Uuid>>,
    pub assigned_closer: Option<Option<Uuid>>,
    pub intent: Option<String>,
    pub response_speed: Option<String>,
    pub last_contacted_at: Option<Option<DateTime<Utc>>>,
    pub estimated_value: Option<Option<f64>>,
    pub probability: Option<Option<String>>,
    pub scheduled_call_time: Option<Option<DateTime<Utc>>>,
    pub source: Option<String>,
    pub closed_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl LeadChanges {
    pub fn touches_assignment(&self) -> bool {
        self.assigned_warmer.is_some() || self.assigned_closer.is_some()
    }

    pub fn apply(&self, lead: &mut Lead) {
        macro_rules! set {
            ($($field:ident),+) => {
                $(if let Some(v) = &self.$field { lead.$field = v.clone(); })+
            };
        }
        set!(
            name,
            email,
            phone,
            tier,
            score,
            status,
            stage,
            assigned_warmer,
            assigned_closer,
            intent,
            response_speed,
            last_contacted_at,
            estimated_value,
            probability,
            scheduled_call_time,
            source,
            closed_at,
            updated_at
        );
    }
}

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = lead_notes)]
#[serde(rename_all = "camelCase")]
pub struct LeadNote {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub author_id: Option<Uuid>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl LeadNote {
    pub fn new(lead_id: Uuid, author_id: Option<Uuid>, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id,
            author_id,
            text,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = lead_messages)]
#[serde(rename_all = "camelCase")]
pub struct LeadMessage {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub sender: MessageSender,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl LeadMessage {
    pub fn new(lead_id: Uuid, sender: MessageSender, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id,
            sender,
            text,
            created_at: Utc::now(),
        }
    }
}

/// Store-side lead selection. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    pub statuses: Vec<LeadStatus>,
    pub stages: Vec<LeadStage>,
    pub tier: Option<i16>,
    pub assigned_warmer: Option<Uuid>,
    pub assigned_closer: Option<Uuid>,
    /// Leads missing a warmer or a closer.
    pub incomplete_assignment: bool,
    pub contacted: Option<bool>,
    pub closed_before: Option<DateTime<Utc>>,
}

impl LeadFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn unassigned() -> Self {
        Self {
            incomplete_assignment: true,
            ..Self::default()
        }
    }

    pub fn status(mut self, status: LeadStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn any_status(mut self, statuses: &[LeadStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn any_stage(mut self, stages: &[LeadStage]) -> Self {
        self.stages = stages.to_vec();
        self
    }

    pub fn tier(mut self, tier: i16) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn warmer(mut self, id: Uuid) -> Self {
        self.assigned_warmer = Some(id);
        self
    }

    pub fn closer(mut self, id: Uuid) -> Self {
        self.assigned_closer = Some(id);
        self
    }

    pub fn contacted(mut self, contacted: bool) -> Self {
        self.contacted = Some(contacted);
        self
    }

    pub fn closed_before(mut self, at: DateTime<Utc>) -> Self {
        self.closed_before = Some(at);
        self
    }

    /// Restricts the filter to what `user` may see.
    pub fn scoped_to(self, user: &User) -> Self {
        match user.role {
            Role::Admin => self,
            Role::Warmer => self.warmer(user.id),
            Role::Closer => self.closer(user.id),
        }
    }

    pub fn matches(&self, lead: &Lead) -> bool {
        if self.status.is_some_and(|s| lead.status != s) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&lead.status) {
            return false;
        }
        if !self.stages.is_empty() && !self.stages.contains(&lead.stage) {
            return false;
        }
        if self.tier.is_some_and(|t| lead.tier != t) {
            return false;
        }
        if self.assigned_warmer.is_some() && lead.assigned_warmer != self.assigned_warmer {
            return false;
        }
        if self.assigned_closer.is_some() && lead.assigned_closer != self.assigned_closer {
            return false;
        }
        if self.incomplete_assignment && lead.is_fully_assigned() {
            return false;
        }
        if self
            .contacted
            .is_some_and(|c| lead.last_contacted_at.is_some() != c)
        {
            return false;
        }
        if let Some(cutoff) = self.closed_before {
            match lead.closed_at {
                Some(at) if at <= cutoff => {}
                _ => return false,
            }
        }
        true
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub tier: Option<i16>,
    pub score: Option<f64>,
    pub status: Option<LeadStatus>,
    pub stage: Option<LeadStage>,
    pub assigned_warmer: Option<Uuid>,
    pub assigned_closer: Option<Uuid>,
    pub intent: Option<String>,
    pub response_speed: Option<String>,
    pub estimated_value: Option<f64>,
    pub probability: Option<String>,
    pub scheduled_call_time: Option<DateTime<Utc>>,
    pub source: Option<String>,
}

/// `Some(None)` on a nullable field clears it; a missing field is untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default, with = "double_option")]
    pub phone: Option<Option<String>>,
    pub tier: Option<i16>,
    pub score: Option<f64>,
    pub status: Option<LeadStatus>,
    pub stage: Option<LeadStage>,
    #[serde(default, with = "double_option")]
    pub assigned_warmer: Option<Option<Uuid>>,
    #[serde(default, with = "double_option")]
    pub assigned_closer: Option<Option<Uuid>>,
    pub intent: Option<String>,
    pub response_speed: Option<String>,
    #[serde(default, with = "double_option")]
    pub estimated_value: Option<Option<f64>>,
    #[serde(default, with = "double_option")]
    pub probability: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub scheduled_call_time: Option<Option<DateTime<Utc>>>,
    pub source: Option<String>,
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListLeadsQuery {
    pub status: Option<LeadStatus>,
    pub tier: Option<i16>,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: Option<String>,
    pub sender: Option<MessageSender>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    #[serde(default)]
    pub prioritize_high_tier: bool,
}

/// Staff summary embedded in lead responses.
#[derive(Debug, Clone, Serialize)]
pub struct StaffRef {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub tier: Option<StaffTier>,
}

impl From<&User> for StaffRef {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            tier: u.tier,
        }
    }
}

/// A lead with its assigned staff expanded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadView {
    #[serde(flatten)]
    pub lead: Lead,
    pub warmer: Option<StaffRef>,
    pub closer: Option<StaffRef>,
}
