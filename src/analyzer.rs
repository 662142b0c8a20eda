use std::fmt::{Display, Formatter};

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Timelike, Utc};
use serde::Serialize;

use crate::calendar::WEEKDAY_NAMES;
use crate::domain::{Activity, LifeDomain};

const FOCUSED_DOMAIN_COUNT: usize = 3;
const LOW_COMPLETION_RATE: f64 = 50.0;
const HIGH_COMPLETION_RATE: f64 = 80.0;

const LOW_COMPLETION_TIPS: [&str; 3] = [
    "حاول تقسيم المهام إلى خطوات أصغر لتسهيل الإنجاز.",
    "خصص أوقاتًا محددة للعمل على الأنشطة والتزم بها.",
    "استخدم تقنيات إدارة الوقت مثل تقنية بومودورو لزيادة التركيز.",
];
const HIGH_COMPLETION_TIPS: [&str; 3] = [
    "أداء ممتاز! حاول زيادة مستوى التحدي في الأنشطة.",
    "شارك استراتيجيات نجاحك مع الآخرين لتحفيزهم.",
    "استكشف مجالات جديدة لتطوير مهاراتك.",
];
const BALANCE_TIP: &str = "خصص وقتًا متساويًا لكل مجال لتحقيق التوازن.";
const MORNING_TIPS: [&str; 2] = [
    "أنت أكثر إنتاجية في الصباح، حاول استغلال هذه الفترة لإنجاز المهام الصعبة.",
    "ابدأ يومك بالمهام الأكثر أهمية لزيادة الإنتاجية.",
];
const AFTERNOON_TIPS: [&str; 2] = [
    "فترة الظهيرة هي الأنسب لك، حاول التركيز على الأنشطة التي تتطلب تركيزًا أقل في الصباح.",
    "استغل فترة الظهيرة لإنجاز المهام الروتينية.",
];
const EVENING_TIPS: [&str; 2] = [
    "أنت أكثر إنتاجية في المساء، حاول استغلال هذه الفترة لإنجاز المهام التي تتطلب إبداعًا.",
    "خصص وقتًا للاسترخاء قبل البدء في مهام المساء.",
];
const DIVERSIFY_TIP: &str =
    "حاول تنويع أنواع الأنشطة التي تقوم بها، فقد تكون هناك مجالات أخرى تستحق الاستكشاف.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        if hour < 12 {
            TimeOfDay::Morning
        } else if hour < 17 {
            TimeOfDay::Afternoon
        } else {
            TimeOfDay::Evening
        }
    }

    fn tips(self) -> &'static [&'static str; 2] {
        match self {
            TimeOfDay::Morning => &MORNING_TIPS,
            TimeOfDay::Afternoon => &AFTERNOON_TIPS,
            TimeOfDay::Evening => &EVENING_TIPS,
        }
    }
}

impl Display for TimeOfDay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TimeOfDay::Morning => "Morning",
            TimeOfDay::Afternoon => "Afternoon",
            TimeOfDay::Evening => "Evening",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimeDistribution {
    pub morning: usize,
    pub afternoon: usize,
    pub evening: usize,
}

impl TimeDistribution {
    fn record(&mut self, slot: TimeOfDay) {
        match slot {
            TimeOfDay::Morning => self.morning += 1,
            TimeOfDay::Afternoon => self.afternoon += 1,
            TimeOfDay::Evening => self.evening += 1,
        }
    }

    /// Largest bucket; earlier buckets win ties, so an empty tally is morning.
    pub fn busiest(&self) -> TimeOfDay {
        let mut best = (TimeOfDay::Morning, self.morning);
        for candidate in [
            (TimeOfDay::Afternoon, self.afternoon),
            (TimeOfDay::Evening, self.evening),
        ] {
            if candidate.1 > best.1 {
                best = candidate;
            }
        }
        best.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPattern {
    pub completion_rate: f64,
    pub most_productive_day: &'static str,
    pub most_productive_time: TimeOfDay,
    pub streak_days: u32,
    pub focused_domains: Vec<String>,
    pub time_distribution: TimeDistribution,
    pub activity_type_distribution: Vec<(String, usize)>,
    pub suggestions: Vec<String>,
}

/// Derives completion statistics from whatever activity slice it is handed.
///
/// Weekday, hour, and calendar day of `created_at` are read in `offset`.
#[derive(Debug, Clone, Copy)]
pub struct PatternAnalyzer {
    offset: FixedOffset,
}

impl Default for PatternAnalyzer {
    fn default() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }
}

impl PatternAnalyzer {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn analyze<'a, I>(&self, activities: I, today: NaiveDate) -> ActivityPattern
    where
        I: IntoIterator<Item = &'a Activity>,
    {
        let activities = activities.into_iter().collect::<Vec<_>>();
        let completion_rate = completion_rate(&activities);
        let focused_domains = focused_domains(&activities);
        let time_distribution = self.time_distribution(activities.iter().copied());
        let activity_type_distribution = activity_type_distribution(&activities);
        let suggestions = suggestions(
            completion_rate,
            &focused_domains,
            &time_distribution,
            &activity_type_distribution,
        );

        ActivityPattern {
            completion_rate,
            most_productive_day: self.most_productive_day(&activities),
            most_productive_time: self
                .time_distribution(activities.iter().copied().filter(|activity| activity.completed))
                .busiest(),
            streak_days: self.streak_days(&activities, today),
            focused_domains,
            time_distribution,
            activity_type_distribution,
            suggestions,
        }
    }

    fn local(&self, timestamp: DateTime<Utc>) -> DateTime<FixedOffset> {
        timestamp.with_timezone(&self.offset)
    }

    fn most_productive_day(&self, activities: &[&Activity]) -> &'static str {
        let mut per_day = [0usize; 7];
        for activity in activities.iter().filter(|activity| activity.completed) {
            let weekday = self.local(activity.created_at).weekday().num_days_from_sunday();
            per_day[weekday as usize] += 1;
        }

        let mut best = 0;
        for (index, count) in per_day.iter().enumerate() {
            if *count > per_day[best] {
                best = index;
            }
        }
        WEEKDAY_NAMES[best]
    }

    fn time_distribution<'a>(&self, activities: impl Iterator<Item = &'a Activity>) -> TimeDistribution {
        let mut distribution = TimeDistribution::default();
        for activity in activities {
            distribution.record(TimeOfDay::from_hour(self.local(activity.created_at).hour()));
        }
        distribution
    }

    /// Consecutive days ending at `today` on which a completed activity was created.
    fn streak_days(&self, activities: &[&Activity], today: NaiveDate) -> u32 {
        let mut streak = 0;
        let mut day = Some(today);

        while let Some(current) = day {
            let has_completed = activities.iter().any(|activity| {
                activity.completed && self.local(activity.created_at).date_naive() == current
            });
            if !has_completed {
                break;
            }
            streak += 1;
            day = current.pred_opt();
        }

        streak
    }
}

fn completion_rate(activities: &[&Activity]) -> f64 {
    if activities.is_empty() {
        return 0.0;
    }
    let completed = activities.iter().filter(|activity| activity.completed).count();
    completed as f64 / activities.len() as f64 * 100.0
}

fn focused_domains(activities: &[&Activity]) -> Vec<String> {
    let mut counts: Vec<(LifeDomain, usize)> = Vec::new();
    for activity in activities {
        match counts.iter_mut().find(|(domain, _)| *domain == activity.domain_id) {
            Some((_, count)) => *count += 1,
            None => counts.push((activity.domain_id, 1)),
        }
    }

    // stable: equal counts keep first-seen order
    counts.sort_by(|left, right| right.1.cmp(&left.1));
    counts
        .into_iter()
        .take(FOCUSED_DOMAIN_COUNT)
        .map(|(domain, _)| domain.name().to_string())
        .collect()
}

fn activity_type_distribution(activities: &[&Activity]) -> Vec<(String, usize)> {
    let mut types: Vec<(String, usize)> = Vec::new();
    for activity in activities {
        let kind = activity
            .title
            .split(' ')
            .next()
            .unwrap_or_default()
            .to_lowercase();
        match types.iter_mut().find(|(existing, _)| *existing == kind) {
            Some((_, count)) => *count += 1,
            None => types.push((kind, 1)),
        }
    }
    types
}

fn suggestions(
    completion_rate: f64,
    focused_domains: &[String],
    time_distribution: &TimeDistribution,
    activity_types: &[(String, usize)],
) -> Vec<String> {
    let mut suggestions = Vec::new();

    if completion_rate < LOW_COMPLETION_RATE {
        suggestions.extend(LOW_COMPLETION_TIPS.iter().map(|tip| tip.to_string()));
    } else if completion_rate > HIGH_COMPLETION_RATE {
        suggestions.extend(HIGH_COMPLETION_TIPS.iter().map(|tip| tip.to_string()));
    }

    let neglected = LifeDomain::ALL
        .into_iter()
        .map(LifeDomain::name)
        .filter(|name| !focused_domains.iter().any(|focused| focused.as_str() == *name))
        .collect::<Vec<_>>();
    if !neglected.is_empty() {
        suggestions.push(format!(
            "حاول إضافة أنشطة في المجالات التالية: {}.",
            neglected.join(", ")
        ));
        suggestions.push(BALANCE_TIP.to_string());
    }

    suggestions.extend(
        time_distribution
            .busiest()
            .tips()
            .iter()
            .map(|tip| tip.to_string()),
    );

    let mut most_frequent: Option<&(String, usize)> = None;
    for entry in activity_types {
        if most_frequent.is_none_or(|best| entry.1 > best.1) {
            most_frequent = Some(entry);
        }
    }
    if most_frequent.is_some_and(|(kind, _)| !kind.is_empty()) {
        suggestions.push(DIVERSIFY_TIP.to_string());
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::domain::{Activity, LifeDomain};

    fn activity(title: &str, domain: LifeDomain, completed: bool, created_at: DateTime<Utc>) -> Activity {
        Activity {
            id: title.to_string(),
            title: title.to_string(),
            description: None,
            domain_id: domain,
            week_number: 10,
            year: 2024,
            selected_days: Vec::new(),
            completed_days: BTreeMap::new(),
            target_count: None,
            current_count: None,
            completed,
            allow_sunday: false,
            reminder: None,
            notes: None,
            transaction_id: None,
            created_at,
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()
    }

    #[test]
    fn empty_input_is_deterministic() {
        let activities: Vec<Activity> = Vec::new();
        let pattern = PatternAnalyzer::default().analyze(&activities, today());
        assert_eq!(pattern.completion_rate, 0.0);
        assert_eq!(pattern.streak_days, 0);
        assert!(pattern.focused_domains.is_empty());
        assert_eq!(pattern.most_productive_day, "Sunday");
        assert_eq!(pattern.most_productive_time, TimeOfDay::Morning);
        assert_eq!(pattern.suggestions.len(), 7);
        assert_eq!(pattern.suggestions[0], LOW_COMPLETION_TIPS[0]);
        assert_eq!(pattern.suggestions[5], MORNING_TIPS[0]);
    }

    #[test]
    fn single_morning_completion_among_four() {
        let activities = vec![
            activity("تمرين", LifeDomain::Health, true, at(6, 8)),
            activity("قراءة", LifeDomain::Educational, false, at(4, 14)),
            activity("زيارة", LifeDomain::Social, false, at(5, 19)),
            activity("عمل", LifeDomain::Professional, false, at(7, 10)),
        ];

        let pattern = PatternAnalyzer::default().analyze(&activities, today());
        assert_eq!(pattern.completion_rate, 25.0);
        assert_eq!(pattern.most_productive_day, "Wednesday");
        assert_eq!(pattern.most_productive_time, TimeOfDay::Morning);
        assert_eq!(pattern.most_productive_time.to_string(), "Morning");
        assert_eq!(
            pattern.time_distribution,
            TimeDistribution {
                morning: 2,
                afternoon: 1,
                evening: 1
            }
        );
        assert_eq!(pattern.streak_days, 1);
    }

    #[test]
    fn wednesday_completions_win_the_day() {
        let activities = (0..3)
            .map(|hour| activity("run", LifeDomain::Health, true, at(6, 18 + hour)))
            .collect::<Vec<_>>();
        let pattern = PatternAnalyzer::default().analyze(&activities, today());
        assert_eq!(pattern.most_productive_day, "Wednesday");
        assert_eq!(pattern.most_productive_time, TimeOfDay::Evening);
        assert_eq!(pattern.completion_rate, 100.0);
        assert_eq!(pattern.suggestions[0], HIGH_COMPLETION_TIPS[0]);
    }

    #[test]
    fn focused_domains_rank_by_raw_count() {
        let mut activities = Vec::new();
        for (domain, count) in [
            (LifeDomain::Personal, 2),
            (LifeDomain::Health, 5),
            (LifeDomain::Family, 3),
        ] {
            for _ in 0..count {
                activities.push(activity("x", domain, false, at(6, 9)));
            }
        }

        let pattern = PatternAnalyzer::default().analyze(&activities, today());
        assert_eq!(
            pattern.focused_domains,
            vec![
                LifeDomain::Health.name().to_string(),
                LifeDomain::Family.name().to_string(),
                LifeDomain::Personal.name().to_string(),
            ]
        );
        let balance = &pattern.suggestions[3];
        assert!(balance.contains(LifeDomain::Spiritual.name()));
        assert!(!balance.contains(LifeDomain::Health.name()));
    }

    #[test]
    fn focused_domain_ties_keep_encounter_order() {
        let activities = vec![
            activity("a", LifeDomain::Spiritual, false, at(6, 9)),
            activity("b", LifeDomain::Family, false, at(6, 9)),
            activity("c", LifeDomain::Family, false, at(6, 9)),
            activity("d", LifeDomain::Social, false, at(6, 9)),
            activity("e", LifeDomain::Health, false, at(6, 9)),
        ];
        let pattern = PatternAnalyzer::default().analyze(&activities, today());
        assert_eq!(
            pattern.focused_domains,
            vec![
                LifeDomain::Family.name().to_string(),
                LifeDomain::Spiritual.name().to_string(),
                LifeDomain::Social.name().to_string(),
            ]
        );
    }

    #[test]
    fn streak_stops_at_first_gap() {
        let activities = vec![
            activity("a", LifeDomain::Health, true, at(6, 7)),
            activity("b", LifeDomain::Health, true, at(5, 22)),
            activity("c", LifeDomain::Health, true, at(4, 12)),
            activity("d", LifeDomain::Health, false, at(3, 12)),
            activity("e", LifeDomain::Health, true, at(2, 12)),
        ];
        let pattern = PatternAnalyzer::default().analyze(&activities, today());
        assert_eq!(pattern.streak_days, 3);

        let yesterday_only = vec![activity("b", LifeDomain::Health, true, at(5, 22))];
        let pattern = PatternAnalyzer::default().analyze(&yesterday_only, today());
        assert_eq!(pattern.streak_days, 0);
    }

    #[test]
    fn offset_moves_days_and_hours() {
        // 22:00 UTC on Tuesday is 01:00 Wednesday at UTC+3.
        let activities = vec![activity("late", LifeDomain::Health, true, at(5, 22))];
        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        let pattern = PatternAnalyzer::new(offset).analyze(&activities, today());
        assert_eq!(pattern.most_productive_day, "Wednesday");
        assert_eq!(pattern.most_productive_time, TimeOfDay::Morning);
        assert_eq!(pattern.streak_days, 1);
    }

    #[test]
    fn activity_types_use_first_title_word() {
        let activities = vec![
            activity("Run 5k", LifeDomain::Health, false, at(6, 9)),
            activity("run fast", LifeDomain::Health, false, at(6, 9)),
            activity("Read book", LifeDomain::Educational, false, at(6, 9)),
        ];
        let pattern = PatternAnalyzer::default().analyze(&activities, today());
        assert_eq!(
            pattern.activity_type_distribution,
            vec![("run".to_string(), 2), ("read".to_string(), 1)]
        );
        assert_eq!(pattern.suggestions.last().map(String::as_str), Some(DIVERSIFY_TIP));
    }
}
