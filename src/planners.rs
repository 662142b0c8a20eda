use std::env;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{self, Path, PathBuf};

use thiserror::Error;
use tracing::debug;

const PLANNER_ENV: &str = "LIFEWEEK_PLANNER";
const STATE_DIR_ENV: &str = "LIFEWEEK_STATE_DIR";
const STATE_DIR_NAME: &str = "lifeweek";
const RECENT_PLANNERS_FILE: &str = "recent_planners.txt";
const MAX_RECENT_PLANNERS: usize = 50;

#[derive(Debug, Error)]
pub enum PlannersError {
	#[error("no planner selected: pass --planner <path> or set LIFEWEEK_PLANNER")]
	NoPlanner,
	#[error("cannot read recent planners from {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("cannot write recent planners to {path}: {source}")]
	Write {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerSource {
	Flag,
	Env,
	Recent,
}

impl Display for PlannerSource {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		let label = match self {
			PlannerSource::Flag => "--planner",
			PlannerSource::Env => PLANNER_ENV,
			PlannerSource::Recent => "recent planners",
		};
		f.write_str(label)
	}
}

/// Newest-first list of opened planner files, one path per line.
#[derive(Debug, Clone)]
pub struct RecentPlanners {
	file: PathBuf,
}

impl RecentPlanners {
	pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
		Self {
			file: dir.into().join(RECENT_PLANNERS_FILE),
		}
	}

	pub fn list(&self, limit: usize) -> Result<Vec<PathBuf>, PlannersError> {
		let raw = match fs::read_to_string(&self.file) {
			Ok(raw) => raw,
			Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
			Err(source) => {
				return Err(PlannersError::Read {
					path: self.file.clone(),
					source,
				});
			}
		};

		Ok(raw
			.lines()
			.map(str::trim)
			.filter(|line| !line.is_empty())
			.map(PathBuf::from)
			.take(limit)
			.collect())
	}

	/// Moves `path` to the front, dropping duplicates and the oldest overflow.
	pub fn remember(&self, path: &Path) -> Result<(), PlannersError> {
		let path = absolutize(path.to_path_buf());
		let contents = std::iter::once(path.clone())
			.chain(
				self.list(MAX_RECENT_PLANNERS)?
					.into_iter()
					.filter(|entry| *entry != path),
			)
			.take(MAX_RECENT_PLANNERS)
			.map(|entry| format!("{}\n", entry.display()))
			.collect::<String>();

		let write_error = |source| PlannersError::Write {
			path: self.file.clone(),
			source,
		};
		if let Some(parent) = self.file.parent() {
			fs::create_dir_all(parent).map_err(write_error)?;
		}
		fs::write(&self.file, contents).map_err(write_error)?;

		debug!(path = %path.display(), "planner remembered");
		Ok(())
	}
}

/// Picks the planner file: explicit flag, then `LIFEWEEK_PLANNER`, then the
/// most recently used planner.
#[derive(Debug, Clone)]
pub struct PlannerLocator {
	env_path: Option<PathBuf>,
	recent: RecentPlanners,
}

impl PlannerLocator {
	pub fn new(env_path: Option<PathBuf>, recent: RecentPlanners) -> Self {
		Self {
			env_path: env_path.filter(|path| !path.as_os_str().is_empty()),
			recent,
		}
	}

	pub fn from_env() -> Self {
		Self::new(
			env::var_os(PLANNER_ENV).map(PathBuf::from),
			RecentPlanners::in_dir(state_dir()),
		)
	}

	pub fn recent(&self) -> &RecentPlanners {
		&self.recent
	}

	pub fn resolve(&self, cli_path: Option<PathBuf>) -> Result<(PathBuf, PlannerSource), PlannersError> {
		if let Some(path) = cli_path {
			return Ok((absolutize(path), PlannerSource::Flag));
		}
		if let Some(path) = &self.env_path {
			return Ok((absolutize(path.clone()), PlannerSource::Env));
		}

		self.recent
			.list(1)?
			.into_iter()
			.next()
			.map(|path| (path, PlannerSource::Recent))
			.ok_or(PlannersError::NoPlanner)
	}
}

fn state_dir() -> PathBuf {
	if let Some(path) = env::var_os(STATE_DIR_ENV) {
		return PathBuf::from(path);
	}

	env::var_os("XDG_STATE_HOME")
		.map(PathBuf::from)
		.or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".local").join("state")))
		.or_else(|| env::var_os("LOCALAPPDATA").map(PathBuf::from))
		.map(|base| base.join(STATE_DIR_NAME))
		.unwrap_or_else(|| PathBuf::from(".lifeweek"))
}

fn absolutize(path: PathBuf) -> PathBuf {
	fs::canonicalize(&path)
		.or_else(|_| path::absolute(&path))
		.unwrap_or(path)
}

#[cfg(test)]
mod tests {
	use std::fs;
	use std::path::PathBuf;

	use super::{MAX_RECENT_PLANNERS, PlannerLocator, PlannerSource, PlannersError, RecentPlanners};

	#[test]
	fn explicit_flag_wins_and_is_absolute() {
		let dir = tempfile::tempdir().expect("temp dir");
		let locator = PlannerLocator::new(
			Some(dir.path().join("from-env.planner")),
			RecentPlanners::in_dir(dir.path()),
		);

		let (path, source) = locator
			.resolve(Some(PathBuf::from("plans/week.planner")))
			.expect("flag path resolves");
		assert_eq!(source, PlannerSource::Flag);
		assert!(path.is_absolute());
		assert!(path.ends_with("plans/week.planner"));
	}

	#[test]
	fn env_path_beats_recent_list() {
		let dir = tempfile::tempdir().expect("temp dir");
		let recent = RecentPlanners::in_dir(dir.path());
		recent.remember(&dir.path().join("old.planner")).unwrap();

		let env_path = dir.path().join("env.planner");
		let locator = PlannerLocator::new(Some(env_path.clone()), recent.clone());
		let (path, source) = locator.resolve(None).unwrap();
		assert_eq!(source, PlannerSource::Env);
		assert!(path.ends_with("env.planner"));

		let blank_env = PlannerLocator::new(Some(PathBuf::new()), recent);
		assert_eq!(blank_env.resolve(None).unwrap().1, PlannerSource::Recent);
	}

	#[test]
	fn falls_back_to_most_recent_planner() {
		let dir = tempfile::tempdir().expect("temp dir");
		let recent = RecentPlanners::in_dir(dir.path().join("state"));
		let first = dir.path().join("first.planner");
		let second = dir.path().join("second.planner");
		recent.remember(&first).unwrap();
		recent.remember(&second).unwrap();
		recent.remember(&first).unwrap();

		let listed = recent.list(10).unwrap();
		assert_eq!(listed.len(), 2);
		assert!(listed[0].ends_with("first.planner"));
		assert!(listed[1].ends_with("second.planner"));

		let locator = PlannerLocator::new(None, recent);
		let (path, source) = locator.resolve(None).unwrap();
		assert_eq!(source, PlannerSource::Recent);
		assert!(path.ends_with("first.planner"));
	}

	#[test]
	fn empty_state_has_no_planner() {
		let dir = tempfile::tempdir().expect("temp dir");
		let locator = PlannerLocator::new(None, RecentPlanners::in_dir(dir.path()));
		assert!(locator.recent().list(5).unwrap().is_empty());
		assert!(matches!(locator.resolve(None), Err(PlannersError::NoPlanner)));
	}

	#[test]
	fn recent_list_is_capped() {
		let dir = tempfile::tempdir().expect("temp dir");
		let recent = RecentPlanners::in_dir(dir.path());
		for index in 0..MAX_RECENT_PLANNERS + 5 {
			recent.remember(&dir.path().join(format!("{index}.planner"))).unwrap();
		}

		let raw = fs::read_to_string(dir.path().join("recent_planners.txt")).unwrap();
		assert_eq!(raw.lines().count(), MAX_RECENT_PLANNERS);
		let newest = recent.list(1).unwrap();
		assert!(newest[0].ends_with(format!("{}.planner", MAX_RECENT_PLANNERS + 4)));
	}
}
