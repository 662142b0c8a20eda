mod analyzer;
mod calendar;
mod domain;
mod exchange;
mod planners;
mod storage;
mod ui;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::analyzer::{ActivityPattern, PatternAnalyzer};
use crate::calendar::{WeekKey, format_date, parse_date, weekday_index, WEEKDAY_NAMES};
use crate::domain::{
	ActivityPatch, LifeDomain, NewActivity, NewTransaction, Planner, Reminder, TransactionKind,
	TransactionPatch, WeekEvaluation,
};
use crate::exchange::{export_document, import_document};
use crate::planners::{PlannerLocator, RecentPlanners};
use crate::storage::{FileStore, MemoryStore, PlannerStore};
use crate::ui::run_dashboard;

const LOG_ENV: &str = "LIFEWEEK_LOG";

#[derive(Debug, Parser)]
#[command(name = "lifeweek", about = "Weekly life-domain planner and journal")]
struct Cli {
	#[arg(long, global = true)]
	planner: Option<PathBuf>,
	/// Run the command without writing the planner file.
	#[arg(long, global = true)]
	dry_run: bool,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Args)]
struct WeekArgs {
	/// Week number; defaults to the current week.
	#[arg(long)]
	week: Option<u32>,
	/// Year of the week; defaults to the current year.
	#[arg(long)]
	year: Option<i32>,
}

impl WeekArgs {
	fn resolve(self, today: NaiveDate) -> Result<WeekKey> {
		let current = WeekKey::containing(today);
		Ok(WeekKey::new(
			self.week.unwrap_or(current.week),
			self.year.unwrap_or(today.year()),
		)?)
	}
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TransactionKindArg {
	Income,
	Expense,
}

impl From<TransactionKindArg> for TransactionKind {
	fn from(value: TransactionKindArg) -> Self {
		match value {
			TransactionKindArg::Income => TransactionKind::Income,
			TransactionKindArg::Expense => TransactionKind::Expense,
		}
	}
}

#[derive(Debug, Subcommand)]
enum Command {
	Init,
	Dashboard,
	Add {
		title: String,
		#[arg(long)]
		description: Option<String>,
		/// Life domain id; classified from the title when omitted.
		#[arg(long)]
		domain: Option<LifeDomain>,
		#[command(flatten)]
		week: WeekArgs,
		/// Weekday indices, 0 = Sunday.
		#[arg(long, value_delimiter = ',')]
		days: Vec<u8>,
		#[arg(long)]
		target: Option<u32>,
		/// Reminder time as HH:MM.
		#[arg(long)]
		reminder: Option<String>,
		#[arg(long)]
		notes: Option<String>,
	},
	Update {
		id: String,
		#[arg(long)]
		title: Option<String>,
		#[arg(long)]
		description: Option<String>,
		#[arg(long)]
		domain: Option<LifeDomain>,
		#[arg(long, value_delimiter = ',')]
		days: Option<Vec<u8>>,
		#[arg(long)]
		target: Option<u32>,
		#[arg(long)]
		notes: Option<String>,
	},
	Delete {
		id: String,
	},
	/// Toggle the activity's completed flag.
	Done {
		id: String,
	},
	/// Mark one scheduled day as done (or not, with --undo).
	Mark {
		id: String,
		#[arg(long)]
		day: u8,
		#[arg(long)]
		undo: bool,
	},
	Count {
		id: String,
		#[arg(long, allow_hyphen_values = true, default_value_t = 1)]
		delta: i64,
	},
	List {
		#[command(flatten)]
		week: WeekArgs,
	},
	Week {
		#[command(flatten)]
		week: WeekArgs,
	},
	Insights {
		#[command(flatten)]
		week: WeekArgs,
		/// Analyze every activity instead of one week.
		#[arg(long)]
		all: bool,
		#[arg(long)]
		json: bool,
	},
	Evaluate {
		#[command(flatten)]
		week: WeekArgs,
	},
	Journal {
		#[command(subcommand)]
		command: JournalCommand,
	},
	Achievement {
		#[command(subcommand)]
		command: AchievementCommand,
	},
	Tx {
		#[command(subcommand)]
		command: TransactionCommand,
	},
	Export {
		#[arg(long)]
		output: PathBuf,
	},
	Import {
		#[arg(long)]
		input: PathBuf,
	},
	Config {
		#[arg(long, allow_hyphen_values = true)]
		utc_offset_minutes: Option<i32>,
	},
	Planners {
		#[arg(long, default_value_t = 20)]
		limit: usize,
	},
}

#[derive(Debug, Subcommand)]
enum JournalCommand {
	Show {
		#[arg(long, value_parser = parse_date)]
		date: Option<NaiveDate>,
	},
	Note {
		#[arg(long, value_parser = parse_date)]
		date: Option<NaiveDate>,
		#[arg(long)]
		index: usize,
		text: String,
	},
	Write {
		#[arg(long, value_parser = parse_date)]
		date: Option<NaiveDate>,
		text: String,
	},
	Decide {
		#[arg(long, value_parser = parse_date)]
		date: Option<NaiveDate>,
		text: String,
	},
}

#[derive(Debug, Subcommand)]
enum AchievementCommand {
	Add {
		#[command(flatten)]
		week: WeekArgs,
		text: String,
	},
	Edit {
		#[command(flatten)]
		week: WeekArgs,
		#[arg(long)]
		index: usize,
		text: String,
	},
	List {
		#[command(flatten)]
		week: WeekArgs,
	},
	Remove {
		#[command(flatten)]
		week: WeekArgs,
		#[arg(long)]
		index: usize,
	},
}

#[derive(Debug, Subcommand)]
enum TransactionCommand {
	Add {
		#[arg(long, value_enum)]
		kind: TransactionKindArg,
		#[arg(long)]
		name: String,
		#[arg(long)]
		amount: f64,
		#[arg(long, value_parser = parse_date)]
		date: Option<NaiveDate>,
		/// Skip creating the linked financial activity.
		#[arg(long)]
		no_activity: bool,
	},
	Update {
		id: String,
		#[arg(long, value_enum)]
		kind: Option<TransactionKindArg>,
		#[arg(long)]
		name: Option<String>,
		#[arg(long)]
		amount: Option<f64>,
	},
	List {
		#[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
		month: Option<u32>,
		#[arg(long)]
		year: Option<i32>,
	},
	Delete {
		id: String,
	},
	Balance {
		#[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
		month: Option<u32>,
		#[arg(long)]
		year: Option<i32>,
	},
}

fn main() {
	init_logging();
	if let Err(err) = run() {
		eprintln!("error: {err:#}");
		std::process::exit(1);
	}
}

fn init_logging() {
	let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.init();
}

fn run() -> Result<()> {
	let cli = Cli::parse();
	let locator = PlannerLocator::from_env();

	if let Some(Command::Planners { limit }) = &cli.command {
		return print_recent_planners(locator.recent(), *limit);
	}

	let (planner_path, source) = locator.resolve(cli.planner)?;
	info!(path = %planner_path.display(), %source, "planner selected");
	let mut file_store = FileStore::new(&planner_path);
	let mut planner = file_store.init()?;
	let mut memory_store = MemoryStore::default();
	let store: &mut dyn PlannerStore = if cli.dry_run {
		&mut memory_store
	} else {
		if let Err(err) = locator.recent().remember(&planner_path) {
			warn!(%err, "failed to store recent planner");
		}
		&mut file_store
	};

	let now = Utc::now();
	let today = planner.today(now)?;
	let mut dirty = false;

	match cli.command.unwrap_or(Command::Dashboard) {
		Command::Init => {
			dirty = true;
			println!("initialized planner at {}", planner_path.display());
		}
		Command::Dashboard => {
			run_dashboard(&mut planner, &mut *store, today)?;
		}
		Command::Add {
			title,
			description,
			domain,
			week,
			days,
			target,
			reminder,
			notes,
		} => {
			let mut new = NewActivity::new(title, week.resolve(today)?);
			new.description = description;
			new.domain = domain;
			new.allow_sunday = days.contains(&0);
			new.reminder = reminder.map(|time| Reminder {
				time,
				date: None,
				days: days.clone(),
			});
			new.selected_days = days;
			new.target_count = target;
			new.notes = notes;
			let id = planner.add_activity(new, now)?;
			dirty = true;
			let domain = planner
				.activity(&id)
				.map(|activity| activity.domain_id.name())
				.unwrap_or_default();
			println!("created activity {id} ({domain})");
		}
		Command::Update {
			id,
			title,
			description,
			domain,
			days,
			target,
			notes,
		} => {
			let patch = ActivityPatch {
				title,
				description: description.map(Some),
				domain,
				selected_days: days,
				target_count: target.map(Some),
				notes: notes.map(Some),
				..ActivityPatch::default()
			};
			planner.update_activity(&id, patch)?;
			dirty = true;
			println!("updated {id}");
		}
		Command::Delete { id } => {
			let removed = planner.delete_activity(&id)?;
			dirty = true;
			println!("deleted {} ({})", removed.id, removed.title);
		}
		Command::Done { id } => {
			let completed = planner.toggle_completed(&id)?;
			dirty = true;
			println!("{id} is now {}", if completed { "done" } else { "open" });
		}
		Command::Mark { id, day, undo } => {
			planner.set_day_completed(&id, day, !undo)?;
			dirty = true;
			let day_name = WEEKDAY_NAMES.get(usize::from(day)).copied().unwrap_or("?");
			println!("{id} {} on {day_name}", if undo { "unmarked" } else { "marked" });
		}
		Command::Count { id, delta } => {
			let count = planner.increment_count(&id, delta)?;
			dirty = true;
			println!("{id} count is {count}");
		}
		Command::List { week } => {
			print_activities(&planner, week.resolve(today)?);
		}
		Command::Week { week } => {
			print_week_dates(week.resolve(today)?, today)?;
		}
		Command::Insights { week, all, json } => {
			let analyzer = PatternAnalyzer::new(planner.utc_offset()?);
			let pattern = if all {
				analyzer.analyze(&planner.activities, today)
			} else {
				analyzer.analyze(planner.activities_for_week(week.resolve(today)?), today)
			};
			if json {
				println!("{}", serde_json::to_string_pretty(&pattern)?);
			} else {
				print_pattern(&pattern);
			}
		}
		Command::Evaluate { week } => {
			print_evaluation(&planner.evaluate_week(week.resolve(today)?));
		}
		Command::Journal { command } => {
			dirty = run_journal(&mut planner, command, today)?;
		}
		Command::Achievement { command } => {
			dirty = run_achievement(&mut planner, command, today)?;
		}
		Command::Tx { command } => {
			dirty = run_transaction(&mut planner, command, today, now)?;
		}
		Command::Export { output } => {
			let document = export_document(&planner)?;
			fs::write(&output, document)
				.with_context(|| format!("failed to write {}", output.display()))?;
			println!("exported planner to {}", output.display());
		}
		Command::Import { input } => {
			let raw = fs::read_to_string(&input)
				.with_context(|| format!("failed to read {}", input.display()))?;
			let summary = import_document(&mut planner, &raw)?;
			dirty = true;
			println!(
				"imported {} activities across {} weeks, {} journal days, {} transactions",
				summary.activities, summary.weeks, summary.journals, summary.transactions
			);
		}
		Command::Config { utc_offset_minutes } => {
			if let Some(minutes) = utc_offset_minutes {
				planner.set_utc_offset_minutes(minutes)?;
				dirty = true;
			}
			println!("utc_offset_minutes = {}", planner.header.utc_offset_minutes);
		}
		Command::Planners { .. } => {}
	}

	if dirty {
		store.flush(&planner)?;
	}

	if cli.dry_run {
		if let Some(contents) = memory_store.contents() {
			println!("dry run: {} bytes not written to {}", contents.len(), planner_path.display());
		}
		memory_store.teardown()?;
	} else {
		file_store.teardown()?;
	}
	Ok(())
}

fn run_journal(planner: &mut Planner, command: JournalCommand, today: NaiveDate) -> Result<bool> {
	match command {
		JournalCommand::Show { date } => {
			print_journal(planner, date.unwrap_or(today));
			Ok(false)
		}
		JournalCommand::Note { date, index, text } => {
			planner.set_positive_note(date.unwrap_or(today), index, text)?;
			Ok(true)
		}
		JournalCommand::Write { date, text } => {
			planner.set_free_writing(date.unwrap_or(today), text);
			Ok(true)
		}
		JournalCommand::Decide { date, text } => {
			planner.set_decisions(date.unwrap_or(today), text);
			Ok(true)
		}
	}
}

fn run_achievement(
	planner: &mut Planner,
	command: AchievementCommand,
	today: NaiveDate,
) -> Result<bool> {
	match command {
		AchievementCommand::Add { week, text } => {
			let week = week.resolve(today)?;
			let index = planner.add_achievement(week, &text)?;
			println!("added achievement #{index} to week {week}");
			Ok(true)
		}
		AchievementCommand::Edit { week, index, text } => {
			planner.update_achievement(week.resolve(today)?, index, &text)?;
			println!("updated achievement #{index}");
			Ok(true)
		}
		AchievementCommand::List { week } => {
			let week = week.resolve(today)?;
			let achievements = planner.achievements(week);
			if achievements.is_empty() {
				println!("no achievements for week {week}");
			}
			for (index, text) in achievements.iter().enumerate() {
				println!("{index:>2}. {text}");
			}
			Ok(false)
		}
		AchievementCommand::Remove { week, index } => {
			let removed = planner.remove_achievement(week.resolve(today)?, index)?;
			println!("removed: {removed}");
			Ok(true)
		}
	}
}

fn run_transaction(
	planner: &mut Planner,
	command: TransactionCommand,
	today: NaiveDate,
	now: DateTime<Utc>,
) -> Result<bool> {
	match command {
		TransactionCommand::Add {
			kind,
			name,
			amount,
			date,
			no_activity,
		} => {
			let id = planner.add_transaction(
				NewTransaction {
					kind: kind.into(),
					name,
					amount,
					date: date.unwrap_or(today),
					create_activity: !no_activity,
				},
				now,
			)?;
			println!("created transaction {id}");
			Ok(true)
		}
		TransactionCommand::Update {
			id,
			kind,
			name,
			amount,
		} => {
			planner.update_transaction(
				&id,
				TransactionPatch {
					kind: kind.map(Into::into),
					name,
					amount,
					..TransactionPatch::default()
				},
			)?;
			let linked = planner
				.transaction(&id)
				.and_then(|transaction| transaction.activity_id.as_deref())
				.map(|activity_id| format!(", refreshed activity {activity_id}"))
				.unwrap_or_default();
			println!("updated transaction {id}{linked}");
			Ok(true)
		}
		TransactionCommand::List { month, year } => {
			let month = month.unwrap_or(today.month());
			let year = year.unwrap_or(today.year());
			let rows = planner
				.transactions
				.iter()
				.filter(|transaction| transaction.date.year() == year && transaction.date.month() == month)
				.collect::<Vec<_>>();
			if rows.is_empty() {
				println!("no transactions for {year}-{month:02}");
			}
			for transaction in rows {
				let sign = match transaction.kind {
					TransactionKind::Income => '+',
					TransactionKind::Expense => '-',
				};
				println!(
					"{} | {} | {sign}{:.2} | {}{}",
					transaction.id,
					format_date(transaction.date),
					transaction.amount,
					transaction.name,
					if transaction.activity_id.is_some() { " [activity]" } else { "" }
				);
			}
			Ok(false)
		}
		TransactionCommand::Delete { id } => {
			let removed = planner.delete_transaction(&id)?;
			println!("deleted transaction {} ({})", removed.id, removed.name);
			Ok(true)
		}
		TransactionCommand::Balance { month, year } => {
			let month = month.unwrap_or(today.month());
			let year = year.unwrap_or(today.year());
			println!("balance {year}-{month:02}: {:.2}", planner.monthly_balance(year, month));
			Ok(false)
		}
	}
}

fn print_recent_planners(recent: &RecentPlanners, limit: usize) -> Result<()> {
	let rows = recent.list(limit)?;
	if rows.is_empty() {
		println!("no recent planners");
		return Ok(());
	}

	for (index, path) in rows.iter().enumerate() {
		println!("{:>2}. {}", index + 1, path.display());
	}

	Ok(())
}

fn print_activities(planner: &Planner, week: WeekKey) {
	let activities = planner.activities_for_week(week);
	println!("week {week}");
	if activities.is_empty() {
		println!("no activities this week");
		return;
	}

	for activity in activities {
		let days = (0..7u8)
			.map(|day| {
				if !activity.selected_days.contains(&day) {
					'.'
				} else if activity.is_day_completed(day) {
					'x'
				} else {
					'o'
				}
			})
			.collect::<String>();
		let progress = match (activity.current_count, activity.target_count) {
			(current, Some(target)) => format!(" {}/{target}", current.unwrap_or(0)),
			_ => String::new(),
		};
		println!(
			"{} | [{}] {} | {:<12} | {}{}",
			activity.id,
			if activity.completed { 'x' } else { ' ' },
			days,
			activity.domain_id.info().label,
			activity.title,
			progress
		);
	}
}

fn print_week_dates(week: WeekKey, today: NaiveDate) -> Result<()> {
	println!("week {week}");
	for date in week.dates()? {
		let marker = if date == today { " <" } else { "" };
		println!(
			"{} {:<9} {}{marker}",
			weekday_index(date),
			WEEKDAY_NAMES[usize::from(weekday_index(date))],
			format_date(date)
		);
	}
	Ok(())
}

fn print_pattern(pattern: &ActivityPattern) {
	println!("completion rate: {:.0}%", pattern.completion_rate);
	println!("most productive day: {}", pattern.most_productive_day);
	println!("most productive time: {}", pattern.most_productive_time);
	println!("streak: {} days", pattern.streak_days);
	if pattern.focused_domains.is_empty() {
		println!("focused domains: (none)");
	} else {
		println!("focused domains: {}", pattern.focused_domains.join(", "));
	}
	let times = &pattern.time_distribution;
	println!(
		"time of day: morning {} | afternoon {} | evening {}",
		times.morning, times.afternoon, times.evening
	);

	println!("\nsuggestions:");
	for suggestion in &pattern.suggestions {
		println!("- {suggestion}");
	}
}

fn print_evaluation(evaluation: &WeekEvaluation) {
	let overall = evaluation.overall;
	println!(
		"week {}: {}/{} scheduled days ({}%)",
		evaluation.week, overall.completed, overall.total, overall.percentage
	);
	for (domain, progress) in &evaluation.domains {
		if progress.total == 0 {
			continue;
		}
		println!(
			"{:<12} {}/{} ({}%)",
			domain.info().label,
			progress.completed,
			progress.total,
			progress.percentage
		);
	}
}

fn print_journal(planner: &Planner, date: NaiveDate) {
	println!("journal for {}", format_date(date));
	let Some(journal) = planner.journal(date) else {
		println!("(empty)");
		return;
	};

	for (index, note) in journal.positive_notes.iter().enumerate() {
		if !note.is_empty() {
			println!("+{index} {note}");
		}
	}
	if !journal.free_writing.is_empty() {
		println!("\n{}", journal.free_writing);
	}
	if !journal.decisions.is_empty() {
		println!("\ndecisions: {}", journal.decisions);
	}
}
