//! Aggregate incident statistics for dashboards.

use std::collections::HashMap;

use serde::Serialize;

use crate::classification::Category;
use crate::dispatch::IncidentStatus;
use crate::storage::models::IncidentRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentStats {
    pub total: usize,
    pub open: usize,
    /// Accepted or on scene.
    pub in_progress: usize,
    pub resolved: usize,
    pub cancelled: usize,
    /// Highest count first; ties in category precedence order.
    pub by_category: Vec<CategoryCount>,
    pub police_involved_percentage: f64,
    pub community_resolution_percentage: f64,
}

/// Percentage rounded to one decimal place; zero when `total` is zero.
fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((part as f64 * 1000.0) / total as f64).round() / 10.0
}

pub fn compute<'a>(records: impl IntoIterator<Item = &'a IncidentRecord>) -> IncidentStats {
    let mut total = 0;
    let mut open = 0;
    let mut in_progress = 0;
    let mut resolved = 0;
    let mut cancelled = 0;
    let mut police = 0;
    let mut community = 0;
    let mut counts: HashMap<Category, usize> = HashMap::new();

    for record in records {
        total += 1;
        match record.status {
            IncidentStatus::Open => open += 1,
            IncidentStatus::Accepted | IncidentStatus::OnScene => in_progress += 1,
            IncidentStatus::Resolved => resolved += 1,
            IncidentStatus::Cancelled => cancelled += 1,
        }
        if record.police_needed {
            police += 1;
        }
        if record.community_resolution {
            community += 1;
        }
        *counts.entry(record.category).or_insert(0) += 1;
    }

    let mut by_category: Vec<CategoryCount> = Category::ALL
        .iter()
        .filter_map(|c| counts.get(c).map(|&count| CategoryCount { category: *c, count }))
        .collect();
    by_category.sort_by(|a, b| b.count.cmp(&a.count));

    IncidentStats {
        total,
        open,
        in_progress,
        resolved,
        cancelled,
        by_category,
        police_involved_percentage: percentage(police, total),
        community_resolution_percentage: percentage(community, total),
    }
}
