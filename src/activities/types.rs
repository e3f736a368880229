use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::enums::{ActivityType, Role};
use crate::core::shared::schema::activities;

/// Append-only audit entry.
#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = activities)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    #[serde(rename = "user")]
    pub user_id: Option<Uuid>,
    pub target: String,
    pub details: String,
    pub related_lead: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    pub fn new(activity_type: ActivityType, user_id: Option<Uuid>, details: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            activity_type,
            user_id,
            target: String::new(),
            details: details.into(),
            related_lead: None,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_lead(mut self, lead_id: Uuid) -> Self {
        self.related_lead = Some(lead_id);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub activity_type: Option<ActivityType>,
    pub user_id: Option<Uuid>,
    /// Case-insensitive substring of `target`.
    pub search: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl ActivityFilter {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn between(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    pub fn matches(&self, activity: &Activity) -> bool {
        if self.activity_type.is_some_and(|t| activity.activity_type != t) {
            return false;
        }
        if self.user_id.is_some() && activity.user_id != self.user_id {
            return false;
        }
        if let Some(search) = &self.search {
            if !activity
                .target
                .to_lowercase()
                .contains(&search.to_lowercase())
            {
                return false;
            }
        }
        if self.since.is_some_and(|since| activity.created_at < since) {
            return false;
        }
        if self.until.is_some_and(|until| activity.created_at >= until) {
            return false;
        }
        true
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListActivitiesQuery {
    #[serde(rename = "type")]
    pub activity_type: Option<ActivityType>,
    pub user: Option<Uuid>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityRequest {
    #[serde(rename = "type")]
    pub activity_type: Option<ActivityType>,
    pub target: Option<String>,
    pub details: Option<String>,
    pub related_lead: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
}

/// Activity with the actor and lead names resolved for the feed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    #[serde(flatten)]
    pub activity: Activity,
    pub user_name: Option<String>,
    pub user_role: Option<Role>,
    pub related_lead_name: Option<String>,
}
