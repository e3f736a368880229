use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::core::shared::enums::LeadStatus;
use crate::core::shared::error::CrmError;
use crate::leads::types::LeadFilter;
use crate::store::{end_of_day, CrmStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MrrPoint {
    pub day: String,
    pub value: f64,
}

pub fn day_label(days_back: i64) -> String {
    if days_back == 0 {
        "Today".to_string()
    } else {
        format!("D-{days_back}")
    }
}

/// Cumulative won revenue at the end of each of the last seven days.
/// The last point always equals the current MRR.
pub async fn mrr_trend(store: &dyn CrmStore, now: DateTime<Utc>) -> Result<Vec<MrrPoint>, CrmError> {
    let mut points = Vec::with_capacity(7);
    for back in (0..7).rev() {
        let cutoff = end_of_day(now - Duration::days(back));
        let filter = LeadFilter::all()
            .status(LeadStatus::ClosedWon)
            .closed_before(cutoff);
        points.push(MrrPoint {
            day: day_label(back),
            value: store.sum_lead_value(&filter).await?,
        });
    }
    Ok(points)
}
