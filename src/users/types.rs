use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::enums::{Presence, Role, StaffTier};
use crate::core::shared::schema::users;

/// Staff member. The password hash is loaded with the row but never serialized.
#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = users)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub tier: Option<StaffTier>,
    pub status: Presence,
    pub phone: Option<String>,
    pub performance_score: f64,
    pub leads_handled: i32,
    pub conversion_rate: f64,
    pub avg_deal_size: f64,
    pub referrals: i32,
    pub available_start: String,
    pub available_end: String,
    pub timezone: String,
    pub notify_new_lead_assignments: bool,
    pub notify_lead_responses: bool,
    pub notify_performance_reports: bool,
    pub notify_training_updates: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            email: email.to_lowercase(),
            password_hash,
            role,
            tier: None,
            status: Presence::Offline,
            phone: None,
            performance_score: 0.0,
            leads_handled: 0,
            conversion_rate: 0.0,
            avg_deal_size: 0.0,
            referrals: 0,
            available_start: "09:00".to_string(),
            available_end: "17:00".to_string(),
            timezone: "EST".to_string(),
            notify_new_lead_assignments: true,
            notify_lead_responses: true,
            notify_performance_reports: false,
            notify_training_updates: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_tier(mut self, tier: StaffTier) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn with_status(mut self, status: Presence) -> Self {
        self.status = status;
        self
    }

    pub fn with_performance_score(mut self, score: f64) -> Self {
        self.performance_score = score;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub tier: Option<StaffTier>,
    pub status: Option<Presence>,
    pub phone: Option<String>,
    pub performance_score: Option<f64>,
    pub leads_handled: Option<i32>,
    pub conversion_rate: Option<f64>,
    pub avg_deal_size: Option<f64>,
    pub referrals: Option<i32>,
    pub available_start: Option<String>,
    pub available_end: Option<String>,
    pub timezone: Option<String>,
    pub notify_new_lead_assignments: Option<bool>,
    pub notify_lead_responses: Option<bool>,
    pub notify_performance_reports: Option<bool>,
    pub notify_training_updates: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserChanges {
    pub fn apply(&self, user: &mut User) {
        macro_rules! set {
            ($($field:ident),+) => {
                $(if let Some(v) = &self.$field { user.$field = v.clone(); })+
            };
        }
        set!(
            name,
            email,
            role,
            status,
            performance_score,
            leads_handled,
            conversion_rate,
            avg_deal_size,
            referrals,
            available_start,
            available_end,
            timezone,
            notify_new_lead_assignments,
            notify_lead_responses,
            notify_performance_reports,
            notify_training_updates,
            updated_at
        );
        if let Some(tier) = self.tier {
            user.tier = Some(tier);
        }
        if let Some(phone) = &self.phone {
            user.phone = Some(phone.clone());
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub statuses: Vec<Presence>,
}

impl UserFilter {
    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            statuses: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: Presence) -> Self {
        self.statuses.push(status);
        self
    }

    /// Staff of `role` who can take new leads.
    pub fn available(role: Role) -> Self {
        Self::role(role)
            .with_status(Presence::Online)
            .with_status(Presence::Away)
    }

    pub fn matches(&self, user: &User) -> bool {
        if let Some(role) = self.role {
            if user.role != role {
                return false;
            }
        }
        self.statuses.is_empty() || self.statuses.contains(&user.status)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub tier: Option<StaffTier>,
    pub status: Option<Presence>,
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub tier: Option<StaffTier>,
    pub status: Option<Presence>,
    pub phone: Option<String>,
    pub performance_score: Option<f64>,
    pub leads_handled: Option<i32>,
    pub conversion_rate: Option<f64>,
    pub avg_deal_size: Option<f64>,
    pub referrals: Option<i32>,
    pub available_start: Option<String>,
    pub available_end: Option<String>,
    pub timezone: Option<String>,
    pub notify_new_lead_assignments: Option<bool>,
    pub notify_lead_responses: Option<bool>,
    pub notify_performance_reports: Option<bool>,
    pub notify_training_updates: Option<bool>,
    /// Accepted and ignored; passwords never change through this route.
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<Role>,
}

/// User record plus the number of leads currently assigned to them.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithLeadCount {
    #[serde(flatten)]
    pub user: User,
    pub leads_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmerRanking {
    pub id: Uuid,
    pub name: String,
    pub tier: Option<StaffTier>,
    pub performance_score: f64,
    pub leads_handled: i32,
    pub referrals: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloserRanking {
    pub id: Uuid,
    pub name: String,
    pub tier: Option<StaffTier>,
    pub performance_score: f64,
    pub conversion_rate: f64,
    pub avg_deal_size: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub top_warmers: Vec<WarmerRanking>,
    pub top_closers: Vec<CloserRanking>,
}

impl From<&User> for WarmerRanking {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            tier: u.tier,
            performance_score: u.performance_score,
            leads_handled: u.leads_handled,
            referrals: u.referrals,
        }
    }
}

impl From<&User> for CloserRanking {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            tier: u.tier,
            performance_score: u.performance_score,
            conversion_rate: u.conversion_rate,
            avg_deal_size: u.avg_deal_size,
        }
    }
}
