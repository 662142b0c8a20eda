//! JSON export/import of a whole planner.
//!
//! Document layout:
//!
//! ```text
//! { "activities": { "<week>-<year>": { "activities": [...], "achievements": [...] } },
//!   "transactions": [...] }
//! ```
//!
//! Every exported activity carries a `dayData` map from weekday slot (0..=6,
//! matching the week's displayed dates) to that day's journal.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::calendar::{CalendarError, WeekKey};
use crate::domain::{Activity, DayJournal, Planner, PlannerError, Transaction};

const DAY_DATA_FIELD: &str = "dayData";

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("invalid document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document has no \"activities\" object")]
    MissingActivities,
    #[error("bad week key in document: {0}")]
    Calendar(#[from] CalendarError),
    #[error("activity in week {week} is invalid: {source}")]
    InvalidActivity {
        week: WeekKey,
        #[source]
        source: PlannerError,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct WeekBucket {
    #[serde(default)]
    activities: Vec<Value>,
    #[serde(default)]
    achievements: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    activities: BTreeMap<String, WeekBucket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transactions: Option<Vec<Transaction>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub weeks: usize,
    pub activities: usize,
    pub journals: usize,
    pub transactions: usize,
}

/// Serializes every week bucket that holds activities or achievements.
pub fn export_document(planner: &Planner) -> Result<String, ExchangeError> {
    let weeks = planner
        .activities
        .iter()
        .map(Activity::week)
        .chain(planner.achievements.keys().copied())
        .collect::<BTreeSet<_>>();

    let mut buckets = BTreeMap::new();
    for week in weeks {
        let dates = week.dates()?;
        let day_data = dates
            .iter()
            .enumerate()
            .map(|(slot, date)| {
                let journal = planner.journal(*date).cloned().unwrap_or_default();
                serde_json::to_value(journal).map(|value| (slot.to_string(), value))
            })
            .collect::<Result<serde_json::Map<_, _>, _>>()?;

        let mut activities = Vec::new();
        for activity in planner.activities_for_week(week) {
            let mut value = serde_json::to_value(activity)?;
            if let Value::Object(fields) = &mut value {
                fields.insert(DAY_DATA_FIELD.to_string(), Value::Object(day_data.clone()));
            }
            activities.push(value);
        }

        buckets.insert(
            week.to_string(),
            WeekBucket {
                activities,
                achievements: planner.achievements(week).to_vec(),
            },
        );
    }

    let document = Document {
        activities: buckets,
        transactions: Some(planner.transactions.clone()),
    };
    info!(weeks = document.activities.len(), "planner exported");
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Replaces the planner's activities with the document's and merges the rest.
///
/// Achievements are replaced for each imported week, journals for each day
/// that carries text, and transactions wholesale when the document has them.
pub fn import_document(planner: &mut Planner, raw: &str) -> Result<ImportSummary, ExchangeError> {
    let value: Value = serde_json::from_str(raw)?;
    if !value.get("activities").is_some_and(Value::is_object) {
        return Err(ExchangeError::MissingActivities);
    }
    let document: Document = serde_json::from_value(value)?;

    let mut summary = ImportSummary::default();
    let mut activities = Vec::new();
    let mut journals = BTreeMap::new();
    let mut achievements = BTreeMap::new();

    for (key, bucket) in document.activities {
        let week: WeekKey = key.parse()?;
        let dates = week.dates()?;
        summary.weeks += 1;

        for mut value in bucket.activities {
            let day_data = match value.as_object_mut().and_then(|fields| fields.remove(DAY_DATA_FIELD)) {
                Some(day_data) => serde_json::from_value::<BTreeMap<u8, DayJournal>>(day_data)?,
                None => BTreeMap::new(),
            };
            let mut activity: Activity = serde_json::from_value(value)?;
            activity.week_number = week.week;
            activity.year = week.year;
            activity
                .validate()
                .map_err(|source| ExchangeError::InvalidActivity { week, source })?;

            for (slot, journal) in day_data {
                if let Some(date) = dates.get(usize::from(slot)) {
                    if !journal.is_empty() {
                        journals.insert(*date, journal);
                    }
                }
            }
            activities.push(activity);
        }

        achievements.insert(week, bucket.achievements);
    }

    summary.activities = activities.len();
    summary.journals = journals.len();
    planner.activities = activities;
    planner.journals.extend(journals);
    for (week, items) in achievements {
        if items.is_empty() {
            planner.achievements.remove(&week);
        } else {
            planner.achievements.insert(week, items);
        }
    }
    if let Some(transactions) = document.transactions {
        summary.transactions = transactions.len();
        planner.transactions = transactions;
    }

    info!(
        weeks = summary.weeks,
        activities = summary.activities,
        journals = summary.journals,
        transactions = summary.transactions,
        "planner imported"
    );
    Ok(summary)
}
