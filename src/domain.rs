use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Utc};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::calendar::{CalendarError, WeekKey, weekday_index};

const ID_LEN: usize = 8;
pub const POSITIVE_NOTES: usize = 5;
const INCOME_TITLE_PREFIX: &str = "إيرادات";
const EXPENSE_TITLE_PREFIX: &str = "نفقات";
const AMOUNT_LABEL: &str = "المبلغ";

#[derive(Debug, Error, PartialEq)]
pub enum PlannerError {
    #[error("activity not found: {0}")]
    ActivityNotFound(String),
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("weekday index {0} is out of range 0..=6")]
    InvalidWeekday(u8),
    #[error("invalid reminder time '{0}': expected HH:MM")]
    InvalidReminderTime(String),
    #[error("positive note index {0} is out of range 0..5")]
    InvalidNoteIndex(usize),
    #[error("no achievement at index {index} for week {week}")]
    AchievementNotFound { week: WeekKey, index: usize },
    #[error("amount must be a positive number, got {0}")]
    InvalidAmount(f64),
    #[error("unknown life domain: {0}")]
    UnknownDomain(String),
    #[error("utc offset of {0} minutes is out of range")]
    InvalidOffset(i32),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifeDomain {
    Professional,
    Educational,
    Health,
    Family,
    Social,
    Financial,
    Personal,
    Spiritual,
}

/// Display metadata attached to every life domain.
#[derive(Debug)]
pub struct DomainInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub label: &'static str,
    pub color: &'static str,
    pub keywords: &'static [&'static str],
}

static DOMAIN_TABLE: [DomainInfo; 8] = [
    DomainInfo {
        id: "professional",
        name: "مهني",
        label: "Professional",
        color: "indigo",
        keywords: &["عمل", "وظيفة", "مشروع", "مهنة", "تدريب"],
    },
    DomainInfo {
        id: "educational",
        name: "علمي",
        label: "Educational",
        color: "emerald",
        keywords: &["دراسة", "تعلم", "قراءة", "بحث", "دورة"],
    },
    DomainInfo {
        id: "health",
        name: "صحي",
        label: "Health",
        color: "rose",
        keywords: &["رياضة", "تغذية", "طبيب", "صحة", "نوم"],
    },
    DomainInfo {
        id: "family",
        name: "عائلي",
        label: "Family",
        color: "cyan",
        keywords: &["عائلة", "أطفال", "والدين", "أسرة"],
    },
    DomainInfo {
        id: "social",
        name: "اجتماعي",
        label: "Social",
        color: "purple",
        keywords: &["صديق", "زيارة", "لقاء", "تواصل"],
    },
    DomainInfo {
        id: "financial",
        name: "مالي",
        label: "Financial",
        color: "amber",
        keywords: &["ميزانية", "استثمار", "ادخار", "مصروف"],
    },
    DomainInfo {
        id: "personal",
        name: "شخصي",
        label: "Personal",
        color: "blue",
        keywords: &["تطوير", "هواية", "ترفيه", "راحة"],
    },
    DomainInfo {
        id: "spiritual",
        name: "روحي",
        label: "Spiritual",
        color: "teal",
        keywords: &["صلاة", "تأمل", "عبادة", "ذكر"],
    },
];

impl LifeDomain {
    pub const ALL: [LifeDomain; 8] = [
        LifeDomain::Professional,
        LifeDomain::Educational,
        LifeDomain::Health,
        LifeDomain::Family,
        LifeDomain::Social,
        LifeDomain::Financial,
        LifeDomain::Personal,
        LifeDomain::Spiritual,
    ];

    pub fn info(self) -> &'static DomainInfo {
        &DOMAIN_TABLE[self as usize]
    }

    pub fn id(self) -> &'static str {
        self.info().id
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }
}

impl Display for LifeDomain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for LifeDomain {
    type Err = PlannerError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let needle = input.trim().to_lowercase();
        LifeDomain::ALL
            .into_iter()
            .find(|domain| domain.id() == needle)
            .ok_or_else(|| PlannerError::UnknownDomain(input.to_string()))
    }
}

/// Picks the domain whose keywords appear most often in the text.
/// Ties go to the earlier domain; no match falls back to personal.
pub fn classify_activity(title: &str, description: &str) -> LifeDomain {
    let text = format!("{title} {description}").to_lowercase();
    let mut best = (LifeDomain::Personal, 0usize);

    for domain in LifeDomain::ALL {
        let matches = domain
            .info()
            .keywords
            .iter()
            .filter(|keyword| text.contains(&keyword.to_lowercase()))
            .count();
        if matches > best.1 {
            best = (domain, matches);
        }
    }

    best.0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub time: String,
    /// One-off reminder instant; plain `YYYY-MM-DD` input is read as UTC midnight.
    #[serde(
        default,
        deserialize_with = "deserialize_reminder_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub days: Vec<u8>,
}

fn deserialize_reminder_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(instant) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(instant.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map(|date| Some(date.and_time(NaiveTime::MIN).and_utc()))
        .map_err(|_| serde::de::Error::custom(format!("invalid reminder date '{raw}'")))
}

impl Reminder {
    fn validated(self) -> Result<Self, PlannerError> {
        NaiveTime::parse_from_str(&self.time, "%H:%M")
            .map_err(|_| PlannerError::InvalidReminderTime(self.time.clone()))?;
        Ok(Self {
            days: normalize_days(self.days)?,
            ..self
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub domain_id: LifeDomain,
    pub week_number: u32,
    pub year: i32,
    #[serde(default)]
    pub selected_days: Vec<u8>,
    #[serde(default)]
    pub completed_days: BTreeMap<u8, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_count: Option<u32>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub allow_sunday: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder: Option<Reminder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    pub fn week(&self) -> WeekKey {
        WeekKey {
            week: self.week_number,
            year: self.year,
        }
    }

    pub fn is_day_completed(&self, day: u8) -> bool {
        self.completed_days.get(&day).copied().unwrap_or(false)
    }

    /// Checks records that did not come through `add_activity`.
    pub fn validate(&self) -> Result<(), PlannerError> {
        required_text(&self.title, "title")?;
        WeekKey::new(self.week_number, self.year)?;
        for day in self.selected_days.iter().chain(self.completed_days.keys()) {
            validate_day(*day)?;
        }
        if let Some(reminder) = &self.reminder {
            reminder.clone().validated()?;
        }
        Ok(())
    }

    /// Scheduled days that carry a completion mark.
    pub fn completed_selected_days(&self) -> usize {
        self.selected_days
            .iter()
            .filter(|day| self.is_day_completed(**day))
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub title: String,
    pub description: Option<String>,
    pub domain: Option<LifeDomain>,
    pub week: WeekKey,
    pub selected_days: Vec<u8>,
    pub completed_days: BTreeMap<u8, bool>,
    pub target_count: Option<u32>,
    pub allow_sunday: bool,
    pub reminder: Option<Reminder>,
    pub notes: Option<String>,
}

impl NewActivity {
    pub fn new(title: impl Into<String>, week: WeekKey) -> Self {
        Self {
            title: title.into(),
            description: None,
            domain: None,
            week,
            selected_days: Vec::new(),
            completed_days: BTreeMap::new(),
            target_count: None,
            allow_sunday: false,
            reminder: None,
            notes: None,
        }
    }
}

/// Partial update merged into an existing activity. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct ActivityPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub domain: Option<LifeDomain>,
    pub selected_days: Option<Vec<u8>>,
    pub completed_days: Option<BTreeMap<u8, bool>>,
    pub target_count: Option<Option<u32>>,
    pub current_count: Option<Option<u32>>,
    pub completed: Option<bool>,
    pub allow_sunday: Option<bool>,
    pub reminder: Option<Option<Reminder>>,
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayJournal {
    #[serde(default)]
    pub positive_notes: Vec<String>,
    #[serde(default)]
    pub free_writing: String,
    #[serde(default)]
    pub decisions: String,
}

impl DayJournal {
    pub fn is_empty(&self) -> bool {
        self.positive_notes.iter().all(|note| note.trim().is_empty())
            && self.free_writing.trim().is_empty()
            && self.decisions.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    fn title_prefix(self) -> &'static str {
        match self {
            TransactionKind::Income => INCOME_TITLE_PREFIX,
            TransactionKind::Expense => EXPENSE_TITLE_PREFIX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub name: String,
    pub amount: f64,
    pub date: NaiveDate,
    #[serde(default)]
    pub create_activity: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
}

impl Transaction {
    fn signed_amount(&self) -> f64 {
        match self.kind {
            TransactionKind::Income => self.amount,
            TransactionKind::Expense => -self.amount,
        }
    }

    fn activity_title(&self) -> String {
        format!("{} - {}", self.kind.title_prefix(), self.name)
    }

    fn activity_description(&self) -> String {
        format!("{AMOUNT_LABEL}: {}", self.amount)
    }
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub name: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub create_activity: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub kind: Option<TransactionKind>,
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub percentage: u32,
}

impl Progress {
    fn from_counts(completed: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        };
        Self {
            completed,
            total,
            percentage,
        }
    }
}

/// Scheduled-day completion for one week bucket, driven by `completed_days`.
#[derive(Debug, Clone)]
pub struct WeekEvaluation {
    pub week: WeekKey,
    pub overall: Progress,
    pub domains: Vec<(LifeDomain, Progress)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerHeader {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl PlannerHeader {
    pub fn new() -> Self {
        Self {
            schema_version: 1,
            created_at: Utc::now(),
            utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Planner {
    pub header: PlannerHeader,
    pub activities: Vec<Activity>,
    pub journals: BTreeMap<NaiveDate, DayJournal>,
    pub achievements: BTreeMap<WeekKey, Vec<String>>,
    pub transactions: Vec<Transaction>,
}

impl Planner {
    pub fn new() -> Self {
        Self {
            header: PlannerHeader::new(),
            activities: Vec::new(),
            journals: BTreeMap::new(),
            achievements: BTreeMap::new(),
            transactions: Vec::new(),
        }
    }

    pub fn utc_offset(&self) -> Result<FixedOffset, PlannerError> {
        let minutes = self.header.utc_offset_minutes;
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(PlannerError::InvalidOffset(minutes))
    }

    pub fn set_utc_offset_minutes(&mut self, minutes: i32) -> Result<(), PlannerError> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(PlannerError::InvalidOffset(minutes))?;
        self.header.utc_offset_minutes = minutes;
        Ok(())
    }

    /// Calendar date of `now` in the planner's configured offset.
    pub fn today(&self, now: DateTime<Utc>) -> Result<NaiveDate, PlannerError> {
        Ok(now.with_timezone(&self.utc_offset()?).date_naive())
    }

    pub fn activity(&self, id: &str) -> Option<&Activity> {
        self.activities.iter().find(|activity| activity.id == id)
    }

    fn activity_mut(&mut self, id: &str) -> Result<&mut Activity, PlannerError> {
        self.activities
            .iter_mut()
            .find(|activity| activity.id == id)
            .ok_or_else(|| PlannerError::ActivityNotFound(id.to_string()))
    }

    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.transactions
            .iter()
            .find(|transaction| transaction.id == id)
    }

    pub fn activities_for_week(&self, week: WeekKey) -> Vec<&Activity> {
        self.activities
            .iter()
            .filter(|activity| activity.week() == week)
            .collect()
    }

    pub fn add_activity(
        &mut self,
        new: NewActivity,
        now: DateTime<Utc>,
    ) -> Result<String, PlannerError> {
        let title = required_text(&new.title, "title")?;
        let description = optional_text(new.description.as_deref());
        let domain = new.domain.unwrap_or_else(|| {
            classify_activity(&title, description.as_deref().unwrap_or_default())
        });
        let reminder = new.reminder.map(Reminder::validated).transpose()?;

        let id = generate_id();
        self.activities.push(Activity {
            id: id.clone(),
            title,
            description,
            domain_id: domain,
            week_number: new.week.week,
            year: new.week.year,
            selected_days: normalize_days(new.selected_days)?,
            completed_days: validate_completed_days(new.completed_days)?,
            target_count: new.target_count,
            current_count: new.target_count.map(|_| 0),
            completed: false,
            allow_sunday: new.allow_sunday,
            reminder,
            notes: optional_text(new.notes.as_deref()),
            transaction_id: None,
            created_at: now,
        });

        debug!(id = %id, week = %new.week, domain = %domain, "activity added");
        Ok(id)
    }

    pub fn update_activity(&mut self, id: &str, patch: ActivityPatch) -> Result<(), PlannerError> {
        let title = patch
            .title
            .as_deref()
            .map(|title| required_text(title, "title"))
            .transpose()?;
        let selected_days = patch.selected_days.map(normalize_days).transpose()?;
        let completed_days = patch
            .completed_days
            .map(validate_completed_days)
            .transpose()?;
        let reminder = match patch.reminder {
            Some(Some(reminder)) => Some(Some(reminder.validated()?)),
            other => other,
        };

        let activity = self.activity_mut(id)?;
        if let Some(title) = title {
            activity.title = title;
        }
        if let Some(description) = patch.description {
            activity.description = optional_text(description.as_deref());
        }
        if let Some(domain) = patch.domain {
            activity.domain_id = domain;
        }
        if let Some(selected_days) = selected_days {
            activity.selected_days = selected_days;
        }
        if let Some(completed_days) = completed_days {
            activity.completed_days = completed_days;
        }
        if let Some(target_count) = patch.target_count {
            activity.target_count = target_count;
        }
        if let Some(current_count) = patch.current_count {
            activity.current_count = current_count;
        }
        if let Some(completed) = patch.completed {
            activity.completed = completed;
        }
        if let Some(allow_sunday) = patch.allow_sunday {
            activity.allow_sunday = allow_sunday;
        }
        if let Some(reminder) = reminder {
            activity.reminder = reminder;
        }
        if let Some(notes) = patch.notes {
            activity.notes = optional_text(notes.as_deref());
        }

        debug!(id, "activity updated");
        Ok(())
    }

    pub fn delete_activity(&mut self, id: &str) -> Result<Activity, PlannerError> {
        let index = self
            .activities
            .iter()
            .position(|activity| activity.id == id)
            .ok_or_else(|| PlannerError::ActivityNotFound(id.to_string()))?;
        let removed = self.activities.remove(index);

        for transaction in &mut self.transactions {
            if transaction.activity_id.as_deref() == Some(id) {
                transaction.activity_id = None;
            }
        }

        debug!(id, "activity deleted");
        Ok(removed)
    }

    pub fn toggle_completed(&mut self, id: &str) -> Result<bool, PlannerError> {
        let activity = self.activity_mut(id)?;
        activity.completed = !activity.completed;
        Ok(activity.completed)
    }

    pub fn set_day_completed(&mut self, id: &str, day: u8, done: bool) -> Result<(), PlannerError> {
        validate_day(day)?;
        let activity = self.activity_mut(id)?;
        activity.completed_days.insert(day, done);
        Ok(())
    }

    /// Moves the progress counter and re-derives `completed` from the target.
    pub fn increment_count(&mut self, id: &str, delta: i64) -> Result<u32, PlannerError> {
        let activity = self.activity_mut(id)?;
        let current = i64::from(activity.current_count.unwrap_or(0));
        let next = current.saturating_add(delta).clamp(0, i64::from(u32::MAX)) as u32;
        activity.current_count = Some(next);
        activity.completed = match activity.target_count {
            Some(target) => next >= target,
            None if delta == 0 => activity.completed,
            None => delta > 0,
        };
        Ok(next)
    }

    pub fn evaluate_week(&self, week: WeekKey) -> WeekEvaluation {
        let activities = self.activities_for_week(week);
        let tally = |filter: &dyn Fn(&Activity) -> bool| -> Progress {
            let (completed, total) = activities
                .iter()
                .filter(|activity| filter(activity))
                .fold((0, 0), |(completed, total), activity| {
                    (
                        completed + activity.completed_selected_days(),
                        total + activity.selected_days.len(),
                    )
                });
            Progress::from_counts(completed, total)
        };

        let domains = LifeDomain::ALL
            .into_iter()
            .map(|domain| (domain, tally(&|activity: &Activity| activity.domain_id == domain)))
            .collect();

        WeekEvaluation {
            week,
            overall: tally(&|_: &Activity| true),
            domains,
        }
    }

    pub fn journal(&self, date: NaiveDate) -> Option<&DayJournal> {
        self.journals.get(&date)
    }

    pub fn set_positive_note(
        &mut self,
        date: NaiveDate,
        index: usize,
        text: impl Into<String>,
    ) -> Result<(), PlannerError> {
        if index >= POSITIVE_NOTES {
            return Err(PlannerError::InvalidNoteIndex(index));
        }
        let journal = self.journals.entry(date).or_default();
        if journal.positive_notes.len() < POSITIVE_NOTES {
            journal.positive_notes.resize(POSITIVE_NOTES, String::new());
        }
        journal.positive_notes[index] = text.into();
        self.prune_journal(date);
        Ok(())
    }

    pub fn set_free_writing(&mut self, date: NaiveDate, text: impl Into<String>) {
        self.journals.entry(date).or_default().free_writing = text.into();
        self.prune_journal(date);
    }

    pub fn set_decisions(&mut self, date: NaiveDate, text: impl Into<String>) {
        self.journals.entry(date).or_default().decisions = text.into();
        self.prune_journal(date);
    }

    fn prune_journal(&mut self, date: NaiveDate) {
        if self.journals.get(&date).is_some_and(DayJournal::is_empty) {
            self.journals.remove(&date);
        }
    }

    pub fn achievements(&self, week: WeekKey) -> &[String] {
        self.achievements
            .get(&week)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn add_achievement(&mut self, week: WeekKey, text: &str) -> Result<usize, PlannerError> {
        let text = required_text(text, "achievement")?;
        let entries = self.achievements.entry(week).or_default();
        entries.push(text);
        Ok(entries.len() - 1)
    }

    pub fn update_achievement(
        &mut self,
        week: WeekKey,
        index: usize,
        text: &str,
    ) -> Result<(), PlannerError> {
        let text = required_text(text, "achievement")?;
        let slot = self
            .achievements
            .get_mut(&week)
            .and_then(|entries| entries.get_mut(index))
            .ok_or(PlannerError::AchievementNotFound { week, index })?;
        *slot = text;
        Ok(())
    }

    pub fn remove_achievement(&mut self, week: WeekKey, index: usize) -> Result<String, PlannerError> {
        let entries = self
            .achievements
            .get_mut(&week)
            .filter(|entries| index < entries.len())
            .ok_or(PlannerError::AchievementNotFound { week, index })?;
        let removed = entries.remove(index);
        if entries.is_empty() {
            self.achievements.remove(&week);
        }
        Ok(removed)
    }

    pub fn add_transaction(
        &mut self,
        new: NewTransaction,
        now: DateTime<Utc>,
    ) -> Result<String, PlannerError> {
        let name = required_text(&new.name, "transaction name")?;
        validate_amount(new.amount)?;

        let mut transaction = Transaction {
            id: generate_id(),
            kind: new.kind,
            name,
            amount: new.amount,
            date: new.date,
            create_activity: new.create_activity,
            activity_id: None,
        };

        if transaction.create_activity {
            let day = weekday_index(transaction.date);
            let mut activity = NewActivity::new(
                transaction.activity_title(),
                WeekKey::containing(transaction.date),
            );
            activity.description = Some(transaction.activity_description());
            activity.domain = Some(LifeDomain::Financial);
            activity.selected_days = vec![day];
            activity.completed_days = BTreeMap::from([(day, true)]);
            activity.allow_sunday = true;

            let activity_id = self.add_activity(activity, now)?;
            self.activity_mut(&activity_id)?.transaction_id = Some(transaction.id.clone());
            transaction.activity_id = Some(activity_id);
        }

        let id = transaction.id.clone();
        debug!(id = %id, kind = ?transaction.kind, amount = transaction.amount, "transaction added");
        self.transactions.push(transaction);
        Ok(id)
    }

    pub fn update_transaction(&mut self, id: &str, patch: TransactionPatch) -> Result<(), PlannerError> {
        let name = patch
            .name
            .as_deref()
            .map(|name| required_text(name, "transaction name"))
            .transpose()?;
        if let Some(amount) = patch.amount {
            validate_amount(amount)?;
        }

        let transaction = self
            .transactions
            .iter_mut()
            .find(|transaction| transaction.id == id)
            .ok_or_else(|| PlannerError::TransactionNotFound(id.to_string()))?;
        if let Some(kind) = patch.kind {
            transaction.kind = kind;
        }
        if let Some(name) = name {
            transaction.name = name;
        }
        if let Some(amount) = patch.amount {
            transaction.amount = amount;
        }
        if let Some(date) = patch.date {
            transaction.date = date;
        }

        let linked = transaction.activity_id.clone();
        let title = transaction.activity_title();
        let description = transaction.activity_description();
        if let Some(activity) = linked
            .as_deref()
            .and_then(|activity_id| self.activities.iter_mut().find(|a| a.id == activity_id))
        {
            activity.title = title;
            activity.description = Some(description);
        }

        Ok(())
    }

    pub fn delete_transaction(&mut self, id: &str) -> Result<Transaction, PlannerError> {
        let index = self
            .transactions
            .iter()
            .position(|transaction| transaction.id == id)
            .ok_or_else(|| PlannerError::TransactionNotFound(id.to_string()))?;
        let removed = self.transactions.remove(index);

        if let Some(activity_id) = &removed.activity_id {
            self.activities.retain(|activity| &activity.id != activity_id);
        }

        debug!(id, "transaction deleted");
        Ok(removed)
    }

    pub fn monthly_balance(&self, year: i32, month: u32) -> f64 {
        self.transactions
            .iter()
            .filter(|transaction| transaction.date.year() == year && transaction.date.month() == month)
            .map(Transaction::signed_amount)
            .sum()
    }
}

pub fn generate_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

fn required_text(input: &str, field: &'static str) -> Result<String, PlannerError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PlannerError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

fn optional_text(input: Option<&str>) -> Option<String> {
    input
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn validate_day(day: u8) -> Result<u8, PlannerError> {
    if day > 6 {
        return Err(PlannerError::InvalidWeekday(day));
    }
    Ok(day)
}

fn normalize_days(mut days: Vec<u8>) -> Result<Vec<u8>, PlannerError> {
    for day in &days {
        validate_day(*day)?;
    }
    days.sort_unstable();
    days.dedup();
    Ok(days)
}

fn validate_completed_days(days: BTreeMap<u8, bool>) -> Result<BTreeMap<u8, bool>, PlannerError> {
    for day in days.keys() {
        validate_day(*day)?;
    }
    Ok(days)
}

// Stricter than NaN-only: the kind carries the sign, so zero or negative
// amounts would double-negate in `monthly_balance`.
fn validate_amount(amount: f64) -> Result<(), PlannerError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(PlannerError::InvalidAmount(amount));
    }
    Ok(())
}
