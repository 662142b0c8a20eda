use std::io;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::{Datelike, NaiveDate, Utc};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use tracing::debug;

use crate::analyzer::{ActivityPattern, PatternAnalyzer};
use crate::calendar::{format_date, weekday_index, CalendarError, WeekKey, WEEKDAY_NAMES};
use crate::domain::{
	Activity, DayJournal, LifeDomain, NewActivity, Planner, PlannerError, WeekEvaluation, POSITIVE_NOTES,
};
use crate::storage::PlannerStore;

const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const INACTIVE_PANEL_BORDER_COLOR: Color = Color::DarkGray;
const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);

pub fn run_dashboard<S: PlannerStore + ?Sized>(
	planner: &mut Planner,
	store: &mut S,
	today: NaiveDate,
) -> Result<()> {
	let analyzer = PatternAnalyzer::new(planner.utc_offset()?);

	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, planner, store, &analyzer, today);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop<S: PlannerStore + ?Sized>(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	planner: &mut Planner,
	store: &mut S,
	analyzer: &PatternAnalyzer,
	today: NaiveDate,
) -> Result<()> {
	let mut app = App::new(today);

	loop {
		let view = build_view(&app, planner, analyzer)?;
		app.clamp_selection(&view);
		terminal.draw(|frame| draw_dashboard(frame, &app, &view))?;

		if event::poll(StdDuration::from_millis(250))? {
			if let CEvent::Key(key) = event::read()? {
				if key.kind != KeyEventKind::Press {
					continue;
				}

				let should_quit = match &app.mode {
					InputMode::Prompt(_) => handle_prompt_key(&mut app, key.code, planner, store),
					InputMode::Select(_) => handle_select_key(&mut app, key.code, planner, store),
					InputMode::Normal => handle_normal_key(&mut app, key.code, planner, store, &view),
				};

				if should_quit {
					break;
				}
			}
		}
	}

	Ok(())
}

fn draw_dashboard(frame: &mut Frame, app: &App, view: &ViewModel) {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Min(12), Constraint::Length(4)])
		.split(frame.area());

	let body = Layout::default()
		.direction(Direction::Horizontal)
		.constraints([
			Constraint::Percentage(48),
			Constraint::Percentage(26),
			Constraint::Percentage(26),
		])
		.split(layout[0]);

	let left = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Length(3), Constraint::Min(8)])
		.split(body[0]);

	let middle = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Min(10), Constraint::Length(8)])
		.split(body[1]);

	render_week_strip(frame, left[0], app, view);
	render_activities_panel(frame, left[1], app, view);
	render_journal_panel(frame, middle[0], app, view);
	render_achievements_panel(frame, middle[1], view);
	render_insights_panel(frame, body[2], view);
	render_footer(frame, layout[1], app);

	if let InputMode::Select(select) = &app.mode {
		render_select_popup(frame, select);
	}
}

fn render_week_strip(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel) {
	let spans = view
		.dates
		.iter()
		.enumerate()
		.map(|(slot, date)| {
			let mut style = Style::default();
			if *date == app.today {
				style = style.fg(Color::Yellow).add_modifier(Modifier::BOLD);
			}
			if slot == app.day_slot {
				style = style.bg(HIGHLIGHT_BACKGROUND_COLOR);
			}
			Span::styled(format!(" {} {:>2} ", &WEEKDAY_NAMES[slot][..2], date.day()), style)
		})
		.collect::<Vec<_>>();

	let title = format!(
		"Week {} | {} - {}",
		app.week,
		format_date(view.dates[0]),
		format_date(view.dates[6])
	);
	let strip = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL).title(title));
	frame.render_widget(strip, area);
}

fn render_activities_panel(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel) {
	let items = view
		.rows
		.iter()
		.map(|row| ListItem::new(row.line.clone()))
		.collect::<Vec<_>>();

	let mut state = ListState::default();
	if !view.rows.is_empty() {
		state.select(Some(app.activity_index.min(view.rows.len() - 1)));
	}

	let block = Block::default()
		.borders(Borders::ALL)
		.title("Activities  S M T W T F S")
		.border_style(border_style(app.focus == FocusPane::Activities));
	let list = List::new(if items.is_empty() {
		vec![ListItem::new("(no activities this week)")]
	} else {
		items
	})
	.block(block)
	.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));

	frame.render_stateful_widget(list, area, &mut state);
}

fn render_journal_panel(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel) {
	let journal = &view.journal;
	let mut lines = vec![Line::from(Span::styled(
		"Positive notes",
		Style::default().add_modifier(Modifier::BOLD),
	))];
	for index in 0..POSITIVE_NOTES {
		let note = journal.positive_notes.get(index).map(String::as_str).unwrap_or_default();
		lines.push(Line::from(format!("{}. {note}", index + 1)));
	}

	lines.push(Line::from(""));
	lines.push(Line::from(Span::styled(
		"Free writing",
		Style::default().add_modifier(Modifier::BOLD),
	)));
	lines.extend(journal.free_writing.lines().map(|line| Line::from(line.to_string())));

	lines.push(Line::from(""));
	lines.push(Line::from(Span::styled(
		"Decisions",
		Style::default().add_modifier(Modifier::BOLD),
	)));
	lines.extend(journal.decisions.lines().map(|line| Line::from(line.to_string())));

	let title = format_date(view.dates[app.day_slot]);
	let panel = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
		Block::default()
			.borders(Borders::ALL)
			.title(title)
			.border_style(border_style(app.focus == FocusPane::Journal)),
	);
	frame.render_widget(panel, area);
}

fn render_achievements_panel(frame: &mut Frame, area: Rect, view: &ViewModel) {
	let items = if view.achievements.is_empty() {
		vec![ListItem::new("(none yet)")]
	} else {
		view.achievements
			.iter()
			.map(|text| ListItem::new(format!("* {text}")))
			.collect()
	};
	let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Achievements"));
	frame.render_widget(list, area);
}

fn render_insights_panel(frame: &mut Frame, area: Rect, view: &ViewModel) {
	let evaluation = &view.evaluation;
	let pattern = &view.pattern;
	let bold = Style::default().add_modifier(Modifier::BOLD);

	let mut lines = vec![
		Line::from(Span::styled("Evaluation", bold)),
		Line::from(format!(
			"{}/{} days ({}%)",
			evaluation.overall.completed, evaluation.overall.total, evaluation.overall.percentage
		)),
	];
	for (domain, progress) in &evaluation.domains {
		if progress.total == 0 {
			continue;
		}
		lines.push(Line::from(vec![
			Span::styled(format!("{:<12}", domain.info().label), domain_style(*domain)),
			Span::raw(format!(" {:>3}%", progress.percentage)),
		]));
	}

	lines.push(Line::from(""));
	lines.push(Line::from(Span::styled("Insights", bold)));
	lines.push(Line::from(format!("Done: {:.0}%", pattern.completion_rate)));
	lines.push(Line::from(format!("Best day: {}", pattern.most_productive_day)));
	lines.push(Line::from(format!("Best time: {}", pattern.most_productive_time)));
	lines.push(Line::from(format!("Streak: {} days", pattern.streak_days)));
	if !pattern.focused_domains.is_empty() {
		lines.push(Line::from(format!("Focus: {}", pattern.focused_domains.join(", "))));
	}

	lines.push(Line::from(""));
	lines.push(Line::from(Span::styled("Suggestions", bold)));
	for suggestion in &pattern.suggestions {
		lines.push(Line::from(format!("- {suggestion}")));
	}

	let panel = Paragraph::new(lines)
		.wrap(Wrap { trim: true })
		.block(Block::default().borders(Borders::ALL).title("Week Review"));
	frame.render_widget(panel, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
	let footer_lines = match &app.mode {
		InputMode::Normal => vec![
			Line::from("Tab pane | h/l week | t this week | j/k move | a add | d delete | space done | 0-6 mark day | +/- count | q quit"),
			Line::from("n positive note | w free writing | e decisions | c achievement"),
			Line::from(app.status.clone()),
		],
		InputMode::Prompt(prompt) => vec![
			Line::from(prompt.title.clone()),
			Line::from(format!("> {}", prompt.input)),
			Line::from("Enter submit | Esc cancel"),
		],
		InputMode::Select(select) => vec![
			Line::from(select.title.clone()),
			Line::from(format!(
				"Selected: {}",
				select
					.selected_option()
					.map(|option| option.label.as_str())
					.unwrap_or("(none)")
			)),
			Line::from("j/k or arrows move | Enter choose | Esc cancel"),
		],
	};

	let footer = Paragraph::new(footer_lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn render_select_popup(frame: &mut Frame, select: &SelectState) {
	let area = centered_rect(50, 55, frame.area());
	frame.render_widget(Clear, area);

	let items = select
		.options
		.iter()
		.map(|option| ListItem::new(option.label.clone()).style(option.style))
		.collect::<Vec<_>>();

	let list = List::new(items)
		.block(Block::default().borders(Borders::ALL).title(select.title.clone()))
		.highlight_symbol(">> ")
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR));

	let mut state = ListState::default();
	if !select.options.is_empty() {
		state.select(Some(select.selected.min(select.options.len() - 1)));
	}
	frame.render_stateful_widget(list, area, &mut state);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
	let popup_layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([
			Constraint::Percentage((100 - percent_y) / 2),
			Constraint::Percentage(percent_y),
			Constraint::Percentage((100 - percent_y) / 2),
		])
		.split(area);
	Layout::default()
		.direction(Direction::Horizontal)
		.constraints([
			Constraint::Percentage((100 - percent_x) / 2),
			Constraint::Percentage(percent_x),
			Constraint::Percentage((100 - percent_x) / 2),
		])
		.split(popup_layout[1])[1]
}

fn handle_normal_key<S: PlannerStore + ?Sized>(
	app: &mut App,
	code: KeyCode,
	planner: &mut Planner,
	store: &mut S,
	view: &ViewModel,
) -> bool {
	let selected_id = view.rows.get(app.activity_index).map(|row| row.id.clone());
	let selected_date = view.dates[app.day_slot];

	match code {
		KeyCode::Char('q') => return true,
		KeyCode::Tab => app.focus = app.focus.toggle(),
		KeyCode::Left | KeyCode::Char('h') => app.shift_week(WeekKey::previous),
		KeyCode::Right | KeyCode::Char('l') => app.shift_week(WeekKey::next),
		KeyCode::Char('t') => {
			app.week = WeekKey::containing(app.today);
			app.day_slot = usize::from(weekday_index(app.today));
			app.activity_index = 0;
			app.status = format!("Week {}", app.week);
		}
		KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1, view),
		KeyCode::Down | KeyCode::Char('j') => app.move_selection(1, view),
		KeyCode::Char('a') => {
			app.mode = InputMode::Prompt(PromptState::new(
				"Activity title",
				PromptKind::ActivityTitle { week: app.week },
			));
		}
		KeyCode::Char('n') => {
			app.mode = InputMode::Prompt(PromptState::new(
				format!("Positive note for {}", format_date(selected_date)),
				PromptKind::PositiveNote { date: selected_date },
			));
		}
		KeyCode::Char('w') => {
			let current = planner
				.journal(selected_date)
				.map(|journal| journal.free_writing.clone())
				.unwrap_or_default();
			app.mode = InputMode::Prompt(PromptState::with_input(
				format!("Free writing for {}", format_date(selected_date)),
				current,
				PromptKind::FreeWriting { date: selected_date },
			));
		}
		KeyCode::Char('e') => {
			let current = planner
				.journal(selected_date)
				.map(|journal| journal.decisions.clone())
				.unwrap_or_default();
			app.mode = InputMode::Prompt(PromptState::with_input(
				format!("Decisions for {}", format_date(selected_date)),
				current,
				PromptKind::Decisions { date: selected_date },
			));
		}
		KeyCode::Char('c') => {
			app.mode = InputMode::Prompt(PromptState::new(
				format!("Achievement for week {}", app.week),
				PromptKind::Achievement { week: app.week },
			));
		}
		KeyCode::Char(_) | KeyCode::Enter if selected_id.is_none() => {
			app.status = "No activity selected".to_string();
		}
		KeyCode::Char('d') => {
			if let Some(activity) = selected_id.as_deref().and_then(|id| planner.activity(id)) {
				app.mode = InputMode::Select(build_delete_select(activity));
			}
		}
		KeyCode::Char(' ') => {
			if let Some(id) = selected_id {
				commit(app, planner, store, |planner| {
					let completed = planner.toggle_completed(&id)?;
					Ok(format!("Marked {}", if completed { "done" } else { "open" }))
				});
			}
		}
		KeyCode::Char(digit @ '0'..='6') => {
			if let Some(id) = selected_id {
				let day = digit as u8 - b'0';
				commit(app, planner, store, |planner| {
					let done = !planner.activity(&id).is_some_and(|activity| activity.is_day_completed(day));
					planner.set_day_completed(&id, day, done)?;
					Ok(format!(
						"{} {}",
						WEEKDAY_NAMES[usize::from(day)],
						if done { "done" } else { "cleared" }
					))
				});
			}
		}
		KeyCode::Char(sign @ ('+' | '-')) => {
			if let Some(id) = selected_id {
				let delta = if sign == '+' { 1 } else { -1 };
				commit(app, planner, store, |planner| {
					let count = planner.increment_count(&id, delta)?;
					Ok(format!("Count {count}"))
				});
			}
		}
		_ => {}
	}

	false
}

fn handle_prompt_key<S: PlannerStore + ?Sized>(
	app: &mut App,
	code: KeyCode,
	planner: &mut Planner,
	store: &mut S,
) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Input cancelled".to_string();
		}
		KeyCode::Backspace => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.pop();
			}
		}
		KeyCode::Char(value) => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.push(value);
			}
		}
		KeyCode::Enter => {
			let prompt = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Prompt(prompt) => prompt,
				InputMode::Normal | InputMode::Select(_) => return false,
			};

			match submit_prompt(prompt.clone(), planner, store) {
				Ok(PromptOutcome::Select(select)) => app.mode = InputMode::Select(select),
				Ok(PromptOutcome::Done(message)) => {
					app.mode = InputMode::Normal;
					app.status = message;
				}
				Err(err) => {
					app.mode = InputMode::Prompt(prompt);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn handle_select_key<S: PlannerStore + ?Sized>(
	app: &mut App,
	code: KeyCode,
	planner: &mut Planner,
	store: &mut S,
) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Selection cancelled".to_string();
		}
		KeyCode::Up | KeyCode::Char('k') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(-1);
			}
		}
		KeyCode::Down | KeyCode::Char('j') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(1);
			}
		}
		KeyCode::Enter => {
			let select = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Select(select) => select,
				_ => return false,
			};

			match submit_select(select.clone(), planner, store) {
				Ok(SelectOutcome::NextPrompt(prompt)) => app.mode = InputMode::Prompt(prompt),
				Ok(SelectOutcome::Done(message)) => {
					app.mode = InputMode::Normal;
					app.status = message;
				}
				Err(err) => {
					app.mode = InputMode::Select(select);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn submit_prompt<S: PlannerStore + ?Sized>(
	prompt: PromptState,
	planner: &mut Planner,
	store: &mut S,
) -> Result<PromptOutcome, String> {
	match prompt.kind {
		PromptKind::ActivityTitle { week } => {
			let title = prompt.input.trim().to_string();
			if title.is_empty() {
				return Err("title must not be empty".to_string());
			}
			Ok(PromptOutcome::Select(build_domain_select(week, title)))
		}
		PromptKind::ActivityDays { week, title, domain } => {
			let mut new = NewActivity::new(title, week);
			new.selected_days = parse_day_list(&prompt.input)?;
			new.allow_sunday = new.selected_days.contains(&0);
			new.domain = domain;
			let id = planner.add_activity(new, Utc::now()).map_err(|err| err.to_string())?;
			persist(store, planner)?;
			let label = planner
				.activity(&id)
				.map(|activity| activity.domain_id.info().label)
				.unwrap_or_default();
			Ok(PromptOutcome::Done(format!("Created activity ({label})")))
		}
		PromptKind::PositiveNote { date } => {
			let slot = planner
				.journal(date)
				.map(|journal| {
					journal
						.positive_notes
						.iter()
						.position(|note| note.trim().is_empty())
						.unwrap_or(journal.positive_notes.len())
				})
				.unwrap_or(0);
			if slot >= POSITIVE_NOTES {
				return Err(format!("all {POSITIVE_NOTES} positive notes are filled"));
			}
			planner
				.set_positive_note(date, slot, prompt.input.trim())
				.map_err(|err| err.to_string())?;
			persist(store, planner)?;
			Ok(PromptOutcome::Done(format!("Saved note {}", slot + 1)))
		}
		PromptKind::FreeWriting { date } => {
			planner.set_free_writing(date, prompt.input);
			persist(store, planner)?;
			Ok(PromptOutcome::Done("Saved free writing".to_string()))
		}
		PromptKind::Decisions { date } => {
			planner.set_decisions(date, prompt.input);
			persist(store, planner)?;
			Ok(PromptOutcome::Done("Saved decisions".to_string()))
		}
		PromptKind::Achievement { week } => {
			planner
				.add_achievement(week, &prompt.input)
				.map_err(|err| err.to_string())?;
			persist(store, planner)?;
			Ok(PromptOutcome::Done("Added achievement".to_string()))
		}
	}
}

fn submit_select<S: PlannerStore + ?Sized>(
	select: SelectState,
	planner: &mut Planner,
	store: &mut S,
) -> Result<SelectOutcome, String> {
	let selected_value = select
		.selected_option()
		.map(|option| option.value.clone())
		.ok_or_else(|| "no option selected".to_string())?;

	match select.kind {
		SelectKind::ActivityDomain { week, title } => {
			let domain = selected_value
				.as_deref()
				.map(str::parse::<LifeDomain>)
				.transpose()
				.map_err(|err| err.to_string())?;
			Ok(SelectOutcome::NextPrompt(PromptState::new(
				"Days (0 = Sunday .. 6 = Saturday, comma separated)",
				PromptKind::ActivityDays { week, title, domain },
			)))
		}
		SelectKind::DeleteConfirm { id, title } => {
			if selected_value.as_deref() == Some("delete") {
				planner.delete_activity(&id).map_err(|err| err.to_string())?;
				persist(store, planner)?;
				Ok(SelectOutcome::Done(format!("Deleted {title}")))
			} else {
				Ok(SelectOutcome::Done("Delete cancelled".to_string()))
			}
		}
	}
}

fn build_domain_select(week: WeekKey, title: String) -> SelectState {
	let mut options = vec![SelectOption::new("Auto (from title)", None, Style::default())];
	options.extend(LifeDomain::ALL.into_iter().map(|domain| {
		let info = domain.info();
		SelectOption::new(
			format!("{} ({})", info.label, info.name),
			Some(info.id.to_string()),
			domain_style(domain),
		)
	}));
	SelectState::new("Life domain", SelectKind::ActivityDomain { week, title }, options)
}

fn build_delete_select(activity: &Activity) -> SelectState {
	SelectState::new(
		format!("Delete '{}'?", activity.title),
		SelectKind::DeleteConfirm {
			id: activity.id.clone(),
			title: activity.title.clone(),
		},
		vec![
			SelectOption::new("Delete", Some("delete".to_string()), Style::default().fg(Color::Red)),
			SelectOption::new("Keep", Some("keep".to_string()), Style::default()),
		],
	)
}

fn build_view(app: &App, planner: &Planner, analyzer: &PatternAnalyzer) -> Result<ViewModel, CalendarError> {
	let dates = app.week.dates()?;
	let activities = planner.activities_for_week(app.week);
	let rows = activities
		.iter()
		.map(|activity| ActivityRow {
			id: activity.id.clone(),
			line: activity_line(activity),
		})
		.collect();

	Ok(ViewModel {
		dates,
		rows,
		journal: planner.journal(dates[app.day_slot]).cloned().unwrap_or_default(),
		achievements: planner.achievements(app.week).to_vec(),
		evaluation: planner.evaluate_week(app.week),
		pattern: analyzer.analyze(activities, app.today),
	})
}

fn activity_line(activity: &Activity) -> Line<'static> {
	let mut spans = vec![Span::raw(if activity.completed { "[x] " } else { "[ ] " })];
	for day in 0..7u8 {
		let (symbol, style) = if !activity.selected_days.contains(&day) {
			(". ", Style::default().fg(Color::DarkGray))
		} else if activity.is_day_completed(day) {
			("# ", Style::default().fg(Color::Green))
		} else {
			("o ", Style::default())
		};
		spans.push(Span::styled(symbol, style));
	}

	spans.push(Span::styled(
		format!("{:<12}", activity.domain_id.info().label),
		domain_style(activity.domain_id),
	));
	spans.push(Span::raw(format!(" {}", activity.title)));
	if let Some(target) = activity.target_count {
		spans.push(Span::raw(format!(" ({}/{target})", activity.current_count.unwrap_or(0))));
	}

	Line::from(spans)
}

fn commit<S, F>(app: &mut App, planner: &mut Planner, store: &mut S, action: F)
where
	S: PlannerStore + ?Sized,
	F: FnOnce(&mut Planner) -> Result<String, PlannerError>,
{
	let outcome = action(planner)
		.map_err(|err| err.to_string())
		.and_then(|message| persist(store, planner).map(|()| message));
	app.status = match outcome {
		Ok(message) => message,
		Err(err) => format!("error: {err}"),
	};
}

fn persist<S: PlannerStore + ?Sized>(store: &mut S, planner: &Planner) -> Result<(), String> {
	store.flush(planner).map_err(|err| err.to_string())?;
	debug!("dashboard change persisted");
	Ok(())
}

fn parse_day_list(input: &str) -> Result<Vec<u8>, String> {
	input
		.split(|c: char| c == ',' || c.is_whitespace())
		.filter(|part| !part.is_empty())
		.map(|part| part.parse::<u8>().map_err(|_| format!("invalid day '{part}'")))
		.collect()
}

fn domain_style(domain: LifeDomain) -> Style {
	color_from_name(domain.info().color)
		.map(|color| Style::default().fg(color))
		.unwrap_or_default()
}

fn color_from_name(color_name: &str) -> Option<Color> {
	match color_name {
		"indigo" => Some(Color::Rgb(99, 102, 241)),
		"emerald" => Some(Color::Rgb(16, 185, 129)),
		"rose" => Some(Color::Rgb(244, 63, 94)),
		"cyan" => Some(Color::Cyan),
		"purple" => Some(Color::Magenta),
		"amber" => Some(Color::Rgb(245, 158, 11)),
		"blue" => Some(Color::Blue),
		"teal" => Some(Color::Rgb(20, 184, 166)),
		_ => None,
	}
}

fn border_style(focused: bool) -> Style {
	if focused {
		Style::default()
			.fg(FOCUSED_PANEL_BORDER_COLOR)
			.add_modifier(Modifier::BOLD)
	} else {
		Style::default().fg(INACTIVE_PANEL_BORDER_COLOR)
	}
}

#[derive(Debug, Clone)]
enum PromptOutcome {
	Select(SelectState),
	Done(String),
}

#[derive(Debug, Clone)]
enum SelectOutcome {
	NextPrompt(PromptState),
	Done(String),
}

#[derive(Debug, Clone)]
struct PromptState {
	title: String,
	input: String,
	kind: PromptKind,
}

impl PromptState {
	fn new(title: impl Into<String>, kind: PromptKind) -> Self {
		Self::with_input(title, String::new(), kind)
	}

	fn with_input(title: impl Into<String>, input: String, kind: PromptKind) -> Self {
		Self {
			title: title.into(),
			input,
			kind,
		}
	}
}

#[derive(Debug, Clone)]
struct SelectState {
	title: String,
	options: Vec<SelectOption>,
	selected: usize,
	kind: SelectKind,
}

impl SelectState {
	fn new(title: impl Into<String>, kind: SelectKind, options: Vec<SelectOption>) -> Self {
		Self {
			title: title.into(),
			options,
			selected: 0,
			kind,
		}
	}

	fn move_selection(&mut self, delta: i32) {
		if self.options.is_empty() {
			self.selected = 0;
			return;
		}

		if delta > 0 {
			self.selected = (self.selected + delta as usize).min(self.options.len() - 1);
		} else {
			self.selected = self.selected.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	fn selected_option(&self) -> Option<&SelectOption> {
		self.options.get(self.selected)
	}
}

#[derive(Debug, Clone)]
struct SelectOption {
	label: String,
	value: Option<String>,
	style: Style,
}

impl SelectOption {
	fn new(label: impl Into<String>, value: Option<String>, style: Style) -> Self {
		Self {
			label: label.into(),
			value,
			style,
		}
	}
}

#[derive(Debug, Clone)]
enum PromptKind {
	ActivityTitle {
		week: WeekKey,
	},
	ActivityDays {
		week: WeekKey,
		title: String,
		domain: Option<LifeDomain>,
	},
	PositiveNote {
		date: NaiveDate,
	},
	FreeWriting {
		date: NaiveDate,
	},
	Decisions {
		date: NaiveDate,
	},
	Achievement {
		week: WeekKey,
	},
}

#[derive(Debug, Clone)]
enum SelectKind {
	ActivityDomain { week: WeekKey, title: String },
	DeleteConfirm { id: String, title: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusPane {
	Activities,
	Journal,
}

impl FocusPane {
	fn toggle(self) -> Self {
		match self {
			FocusPane::Activities => FocusPane::Journal,
			FocusPane::Journal => FocusPane::Activities,
		}
	}
}

#[derive(Debug, Clone)]
enum InputMode {
	Normal,
	Prompt(PromptState),
	Select(SelectState),
}

#[derive(Debug, Clone)]
struct App {
	week: WeekKey,
	today: NaiveDate,
	focus: FocusPane,
	activity_index: usize,
	day_slot: usize,
	mode: InputMode,
	status: String,
}

impl App {
	fn new(today: NaiveDate) -> Self {
		Self {
			week: WeekKey::containing(today),
			today,
			focus: FocusPane::Activities,
			activity_index: 0,
			day_slot: usize::from(weekday_index(today)),
			mode: InputMode::Normal,
			status: "Ready".to_string(),
		}
	}

	fn clamp_selection(&mut self, view: &ViewModel) {
		if view.rows.is_empty() {
			self.activity_index = 0;
		} else {
			self.activity_index = self.activity_index.min(view.rows.len() - 1);
		}
	}

	fn move_selection(&mut self, delta: i32, view: &ViewModel) {
		match self.focus {
			FocusPane::Activities => {
				if view.rows.is_empty() {
					self.activity_index = 0;
				} else if delta > 0 {
					self.activity_index = (self.activity_index + 1).min(view.rows.len() - 1);
				} else {
					self.activity_index = self.activity_index.saturating_sub(1);
				}
			}
			FocusPane::Journal => {
				self.day_slot = if delta > 0 {
					(self.day_slot + 1).min(6)
				} else {
					self.day_slot.saturating_sub(1)
				};
			}
		}
	}

	fn shift_week(&mut self, step: fn(&WeekKey) -> Result<WeekKey, CalendarError>) {
		match step(&self.week) {
			Ok(week) => {
				self.week = week;
				self.activity_index = 0;
				self.status = format!("Week {week}");
			}
			Err(err) => self.status = format!("error: {err}"),
		}
	}
}

struct ViewModel {
	dates: [NaiveDate; 7],
	rows: Vec<ActivityRow>,
	journal: DayJournal,
	achievements: Vec<String>,
	evaluation: WeekEvaluation,
	pattern: ActivityPattern,
}

struct ActivityRow {
	id: String,
	line: Line<'static>,
}

#[cfg(test)]
mod tests {
	use chrono::{NaiveDate, TimeZone, Utc};
	use crossterm::event::KeyCode;

	use super::*;
	use crate::storage::MemoryStore;

	fn today() -> NaiveDate {
		NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()
	}

	fn view(app: &App, planner: &Planner) -> ViewModel {
		build_view(app, planner, &PatternAnalyzer::default()).expect("view should build")
	}

	fn press(app: &mut App, planner: &mut Planner, store: &mut MemoryStore, code: KeyCode) {
		match &app.mode {
			InputMode::Prompt(_) => {
				handle_prompt_key(app, code, planner, store);
			}
			InputMode::Select(_) => {
				handle_select_key(app, code, planner, store);
			}
			InputMode::Normal => {
				let view = view(app, planner);
				handle_normal_key(app, code, planner, store, &view);
			}
		}
	}

	fn type_text(app: &mut App, planner: &mut Planner, store: &mut MemoryStore, text: &str) {
		for value in text.chars() {
			press(app, planner, store, KeyCode::Char(value));
		}
	}

	#[test]
	fn parses_day_lists() {
		assert_eq!(parse_day_list("1, 3 5"), Ok(vec![1, 3, 5]));
		assert_eq!(parse_day_list("  "), Ok(vec![]));
		assert!(parse_day_list("mon").is_err());
	}

	#[test]
	fn add_flow_creates_activity_in_viewed_week() {
		let mut app = App::new(today());
		let mut planner = Planner::new();
		let mut store = MemoryStore::default();

		press(&mut app, &mut planner, &mut store, KeyCode::Right);
		assert_eq!(app.week, WeekKey::new(11, 2024).unwrap());

		press(&mut app, &mut planner, &mut store, KeyCode::Char('a'));
		type_text(&mut app, &mut planner, &mut store, "gym");
		press(&mut app, &mut planner, &mut store, KeyCode::Enter);
		assert!(matches!(app.mode, InputMode::Select(_)));

		// auto, professional, educational, health
		for _ in 0..3 {
			press(&mut app, &mut planner, &mut store, KeyCode::Down);
		}
		press(&mut app, &mut planner, &mut store, KeyCode::Enter);
		type_text(&mut app, &mut planner, &mut store, "1,3");
		press(&mut app, &mut planner, &mut store, KeyCode::Enter);

		assert!(matches!(app.mode, InputMode::Normal));
		let activity = &planner.activities[0];
		assert_eq!(activity.title, "gym");
		assert_eq!(activity.domain_id, LifeDomain::Health);
		assert_eq!(activity.week(), WeekKey::new(11, 2024).unwrap());
		assert_eq!(activity.selected_days, vec![1, 3]);
		assert!(store.contents().is_some());
	}

	#[test]
	fn invalid_days_keep_the_prompt_open() {
		let mut app = App::new(today());
		let mut planner = Planner::new();
		let mut store = MemoryStore::default();

		press(&mut app, &mut planner, &mut store, KeyCode::Char('a'));
		type_text(&mut app, &mut planner, &mut store, "run");
		press(&mut app, &mut planner, &mut store, KeyCode::Enter);
		press(&mut app, &mut planner, &mut store, KeyCode::Enter);
		type_text(&mut app, &mut planner, &mut store, "9");
		press(&mut app, &mut planner, &mut store, KeyCode::Enter);

		assert!(matches!(app.mode, InputMode::Prompt(_)));
		assert!(app.status.starts_with("error:"));
		assert!(planner.activities.is_empty());
		assert!(store.contents().is_none());
	}

	#[test]
	fn digit_keys_toggle_day_completion() {
		let mut app = App::new(today());
		let mut planner = Planner::new();
		let mut store = MemoryStore::default();
		let mut new = NewActivity::new("read", app.week);
		new.selected_days = vec![3];
		let now = Utc.with_ymd_and_hms(2024, 3, 6, 8, 0, 0).unwrap();
		let id = planner.add_activity(new, now).unwrap();

		press(&mut app, &mut planner, &mut store, KeyCode::Char('3'));
		assert!(planner.activity(&id).unwrap().is_day_completed(3));
		assert_eq!(app.status, "Wednesday done");
		let saved = store.init().unwrap();
		assert!(saved.activities[0].is_day_completed(3));

		press(&mut app, &mut planner, &mut store, KeyCode::Char('3'));
		assert!(!planner.activity(&id).unwrap().is_day_completed(3));

		press(&mut app, &mut planner, &mut store, KeyCode::Char(' '));
		assert!(planner.activity(&id).unwrap().completed);
	}

	#[test]
	fn delete_requires_confirmation() {
		let mut app = App::new(today());
		let mut planner = Planner::new();
		let mut store = MemoryStore::default();
		let now = Utc.with_ymd_and_hms(2024, 3, 6, 8, 0, 0).unwrap();
		planner.add_activity(NewActivity::new("walk", app.week), now).unwrap();

		press(&mut app, &mut planner, &mut store, KeyCode::Char('d'));
		press(&mut app, &mut planner, &mut store, KeyCode::Down);
		press(&mut app, &mut planner, &mut store, KeyCode::Enter);
		assert_eq!(planner.activities.len(), 1);
		assert_eq!(app.status, "Delete cancelled");

		press(&mut app, &mut planner, &mut store, KeyCode::Char('d'));
		press(&mut app, &mut planner, &mut store, KeyCode::Enter);
		assert!(planner.activities.is_empty());
		assert_eq!(app.status, "Deleted walk");
	}

	#[test]
	fn journal_prompts_fill_the_selected_day() {
		let mut app = App::new(today());
		let mut planner = Planner::new();
		let mut store = MemoryStore::default();

		press(&mut app, &mut planner, &mut store, KeyCode::Tab);
		press(&mut app, &mut planner, &mut store, KeyCode::Up);
		press(&mut app, &mut planner, &mut store, KeyCode::Char('n'));
		type_text(&mut app, &mut planner, &mut store, "slept well");
		press(&mut app, &mut planner, &mut store, KeyCode::Enter);

		let tuesday = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
		assert_eq!(planner.journal(tuesday).unwrap().positive_notes[0], "slept well");

		press(&mut app, &mut planner, &mut store, KeyCode::Char('c'));
		type_text(&mut app, &mut planner, &mut store, "finished course");
		press(&mut app, &mut planner, &mut store, KeyCode::Enter);
		assert_eq!(planner.achievements(app.week), ["finished course"]);

		let view = view(&app, &planner);
		assert_eq!(view.journal.positive_notes[0], "slept well");
		assert_eq!(view.achievements, vec!["finished course".to_string()]);
	}
}
