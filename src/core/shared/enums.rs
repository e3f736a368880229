//! Database enum types.
//!
//! Every enum here is stored as a `SMALLINT` column and travels over the API
//! as its lowercase label. The numeric values are part of the schema; never
//! renumber an existing variant.

use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::SmallInt;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use std::io::Write;

macro_rules! small_int_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident (default $default:ident) {
            $($variant:ident = $value:literal => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
        #[diesel(sql_type = SmallInt)]
        #[repr(i16)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant = $value,
            )+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl ToSql<SmallInt, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                let v = *self as i16;
                out.write_all(&v.to_be_bytes())?;
                Ok(serialize::IsNull::No)
            }
        }

        impl FromSql<SmallInt, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let value = i16::from_sql(bytes)?;
                match value {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(format!("Unknown {}: {}", stringify!($name), value).into()),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| format!("Unknown {}: {}", stringify!($name), s))
            }
        }
    };
}

// ============================================================================
// STAFF
// ============================================================================

small_int_enum! {
    /// Fixed at account creation; only admins may change it.
    pub enum Role (default Warmer) {
        Admin = 0 => "admin",
        Warmer = 1 => "warmer",
        Closer = 2 => "closer",
    }
}

small_int_enum! {
    /// Presence, not lifecycle. Online and away staff receive new leads.
    pub enum Presence (default Offline) {
        Online = 0 => "online",
        Away = 1 => "away",
        Offline = 2 => "offline",
    }
}

impl Presence {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Online | Self::Away)
    }
}

small_int_enum! {
    /// Seniority label. W-tiers belong to warmers, C-tiers to closers.
    pub enum StaffTier (default W1) {
        W1 = 1 => "W1",
        W2 = 2 => "W2",
        W3 = 3 => "W3",
        C1 = 11 => "C1",
        C2 = 12 => "C2",
        C3 = 13 => "C3",
    }
}

impl StaffTier {
    pub fn fits_role(&self, role: Role) -> bool {
        match role {
            Role::Warmer => matches!(self, Self::W1 | Self::W2 | Self::W3),
            Role::Closer => matches!(self, Self::C1 | Self::C2 | Self::C3),
            Role::Admin => false,
        }
    }
}

// ============================================================================
// LEADS
// ============================================================================

small_int_enum! {
    /// Warmer-side lifecycle of a lead.
    pub enum LeadStatus (default Cold) {
        Cold = 0 => "cold",
        Warm = 1 => "warm",
        Hot = 2 => "hot",
        Contacted = 3 => "contacted",
        Scheduled = 4 => "scheduled",
        ClosedWon = 5 => "closed_won",
        ClosedLost = 6 => "closed_lost",
    }
}

impl LeadStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ClosedWon | Self::ClosedLost)
    }

    /// Audit event recorded when a lead moves into this status.
    pub fn activity_type(&self) -> ActivityType {
        match self {
            Self::Hot => ActivityType::LeadMarkedHot,
            Self::Warm => ActivityType::LeadMarkedWarm,
            Self::Cold => ActivityType::LeadMarkedCold,
            Self::Scheduled => ActivityType::CallScheduled,
            Self::ClosedWon | Self::ClosedLost => ActivityType::DealClosed,
            Self::Contacted => ActivityType::LeadAssigned,
        }
    }
}

small_int_enum! {
    /// Closer-side pipeline position.
    pub enum LeadStage (default New) {
        New = 0 => "new",
        Contacted = 1 => "contacted",
        Qualified = 2 => "qualified",
        Demo = 3 => "demo",
        Proposal = 4 => "proposal",
        Negotiation = 5 => "negotiation",
        Closed = 6 => "closed",
    }
}

impl LeadStage {
    /// Stages that count towards a closer's open pipeline.
    pub const ACTIVE: &'static [Self] = &[
        Self::Contacted,
        Self::Qualified,
        Self::Demo,
        Self::Proposal,
        Self::Negotiation,
    ];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }
}

small_int_enum! {
    pub enum MessageSender (default User) {
        User = 0 => "user",
        Lead = 1 => "lead",
    }
}

// ============================================================================
// AUDIT LOG
// ============================================================================

small_int_enum! {
    pub enum ActivityType (default LeadAssigned) {
        LeadAssigned = 0 => "lead_assigned",
        CallScheduled = 1 => "call_scheduled",
        DealClosed = 2 => "deal_closed",
        LeadResponded = 3 => "lead_responded",
        CallCompleted = 4 => "call_completed",
        LeadMarkedHot = 5 => "lead_marked_hot",
        LeadMarkedWarm = 6 => "lead_marked_warm",
        LeadMarkedCold = 7 => "lead_marked_cold",
        MessageSent = 8 => "message_sent",
        TaskCreated = 9 => "task_created",
        TaskCompleted = 10 => "task_completed",
        UserLogin = 11 => "user_login",
        UserLogout = 12 => "user_logout",
    }
}

// ============================================================================
// TASKS
// ============================================================================

small_int_enum! {
    pub enum TaskPriority (default Medium) {
        Low = 0 => "low",
        Medium = 1 => "medium",
        High = 2 => "high",
    }
}

small_int_enum! {
    pub enum TaskStatus (default Pending) {
        Pending = 0 => "pending",
        InProgress = 1 => "in_progress",
        Completed = 2 => "completed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_round_trip_through_from_str() {
        for status in LeadStatus::ALL {
            assert_eq!(status.as_str().parse::<LeadStatus>().unwrap(), *status);
        }
        assert_eq!("In_Progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("w2".parse::<StaffTier>().unwrap(), StaffTier::W2);
        assert!("lukewarm".parse::<LeadStatus>().is_err());
    }

    #[test]
    fn test_serde_uses_labels() {
        let json = serde_json::to_string(&LeadStatus::ClosedWon).unwrap();
        assert_eq!(json, "\"closed_won\"");
        let tier: StaffTier = serde_json::from_str("\"C3\"").unwrap();
        assert_eq!(tier, StaffTier::C3);
    }

    #[test]
    fn test_presence_availability() {
        assert!(Presence::Online.is_available());
        assert!(Presence::Away.is_available());
        assert!(!Presence::Offline.is_available());
    }

    #[test]
    fn test_status_activity_mapping() {
        assert_eq!(LeadStatus::Hot.activity_type(), ActivityType::LeadMarkedHot);
        assert_eq!(LeadStatus::ClosedLost.activity_type(), ActivityType::DealClosed);
        assert_eq!(LeadStatus::Contacted.activity_type(), ActivityType::LeadAssigned);
    }

    #[test]
    fn test_staff_tier_role_fit() {
        assert!(StaffTier::W3.fits_role(Role::Warmer));
        assert!(!StaffTier::W3.fits_role(Role::Closer));
        assert!(StaffTier::C1.fits_role(Role::Closer));
        assert!(!StaffTier::C1.fits_role(Role::Admin));
    }

    #[test]
    fn test_active_stages() {
        assert!(LeadStage::Demo.is_active());
        assert!(!LeadStage::New.is_active());
        assert!(!LeadStage::Closed.is_active());
    }
}
