use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;

use crate::CourseError;
use crate::CourseResult;
use crate::course::Course;
use crate::course::CourseTopic;

/// The name of the course config inside the generated directory.
pub const COURSES_CONFIG_PATH: &str = "config/courses.json";
pub const NAVBAR_CONFIG_PATH: &str = "navbar.config.json";
pub const WORKSHEETS_PATH: &str = "worksheets.json";
pub const COURSES_SQL_PATH: &str = "courses.sql";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
	Written,
	/// The file already holds exactly these bytes.
	Unchanged,
	/// The file would change but this is a dry run.
	Pending,
}

/// Write `bytes` to `path` unless the file already holds them. Parent
/// directories are created as needed.
pub fn write_if_changed(path: &Path, bytes: &[u8], dry_run: bool) -> CourseResult<WriteOutcome> {
	let emit_error = |error: std::io::Error| {
		CourseError::EmitIoFailure {
			path: path.display().to_string(),
			reason: error.to_string(),
		}
	};

	match std::fs::read(path) {
		Ok(existing) if existing == bytes => return Ok(WriteOutcome::Unchanged),
		Ok(_) => {}
		Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
		Err(error) => return Err(emit_error(error)),
	}

	if dry_run {
		return Ok(WriteOutcome::Pending);
	}

	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).map_err(emit_error)?;
	}

	std::fs::write(path, bytes).map_err(emit_error)?;
	Ok(WriteOutcome::Written)
}

/// Pretty JSON with a trailing newline.
pub fn to_json_bytes<T: Serialize + ?Sized>(value: &T) -> CourseResult<Vec<u8>> {
	let mut bytes = serde_json::to_vec_pretty(value)?;
	bytes.push(b'\n');
	Ok(bytes)
}

/// The JSON file of a compiled document. Document ids already mirror the
/// output layout, e.g. `math/vectors/intro/worksheets/ws-1`.
pub fn document_output_path(generated: &Path, document_id: &str) -> PathBuf {
	generated.join(format!("{document_id}.json"))
}

/// One entry of `config/courses.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseConfigEntry<'a> {
	pub id: &'a str,
	pub label: &'a str,
	pub group: &'a str,
	pub subject: &'a str,
	pub slug: &'a str,
	pub href: String,
	pub color: &'a str,
	pub tags: &'a [String],
	#[serde(skip_serializing_if = "Option::is_none")]
	pub icon: Option<&'a str>,
	pub is_listed: bool,
	pub is_public: bool,
	pub topics: &'a [CourseTopic],
}

pub fn course_config(courses: &[Course]) -> Vec<CourseConfigEntry<'_>> {
	courses
		.iter()
		.map(|course| {
			CourseConfigEntry {
				id: &course.id,
				label: &course.title,
				group: &course.group,
				subject: &course.subject,
				slug: &course.slug,
				href: course.href(),
				color: &course.color,
				tags: &course.tags,
				icon: course.icon.as_deref(),
				is_listed: course.is_listed,
				is_public: course.is_public,
				topics: &course.topics,
			}
		})
		.collect()
}

/// A navigation entry. Courses have one child per topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
	pub id: String,
	pub label: String,
	pub href: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub color: Option<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub children: Vec<NavItem>,
}

/// Group key to the listed courses of the group, in plan order.
pub fn navbar_config(courses: &[Course]) -> BTreeMap<String, Vec<NavItem>> {
	let mut navbar: BTreeMap<String, Vec<NavItem>> = BTreeMap::new();

	for course in courses.iter().filter(|course| course.is_listed) {
		let children = course
			.topics
			.iter()
			.map(|topic| {
				NavItem {
					id: topic.id.clone(),
					label: topic.label.clone(),
					href: topic.href.clone(),
					color: None,
					children: Vec::new(),
				}
			})
			.collect();

		navbar.entry(course.group.clone()).or_default().push(NavItem {
			id: course.id.clone(),
			label: course.title.clone(),
			href: course.href(),
			color: Some(course.color.clone()),
			children,
		});
	}

	navbar
}

/// One idempotent upsert per course, pointing at its first topic and chapter.
/// Statements are newline-joined and the script ends with a newline.
pub fn courses_sql(courses: &[Course]) -> String {
	let statements: Vec<String> = courses
		.iter()
		.map(|course| {
			let (topic, chapter) = course.current_chapter().map_or((None, None), |(topic, chapter)| {
				(Some(topic.id.as_str()), Some(chapter.id.as_str()))
			});

			format!(
				"INSERT INTO courses (course_id, current_topic_id, current_chapter_id, \
				 registration_open_until) VALUES ({}, {}, {}, {}) ON CONFLICT (course_id) DO \
				 NOTHING;",
				sql_literal(&course.id),
				sql_optional(topic),
				sql_optional(chapter),
				sql_optional(course.registration_open_until.as_deref()),
			)
		})
		.collect();

	if statements.is_empty() {
		return String::new();
	}

	format!("{}\n", statements.join("\n"))
}

/// A single-quoted SQL string literal.
pub fn sql_literal(value: &str) -> String {
	format!("'{}'", value.replace('\'', "''"))
}

fn sql_optional(value: Option<&str>) -> String {
	value.map_or_else(|| "NULL".to_string(), sql_literal)
}

/// An artifact that could not be written.
#[derive(Debug)]
pub struct EmitFailure {
	pub path: PathBuf,
	pub error: CourseError,
}

#[derive(Debug, Default)]
pub struct EmitReport {
	pub written: Vec<PathBuf>,
	pub pending: Vec<PathBuf>,
	pub unchanged: usize,
	pub failures: Vec<EmitFailure>,
}

/// Writes artifacts one by one, recording failures instead of stopping.
#[derive(Debug, Default)]
pub struct Emitter {
	dry_run: bool,
	report: EmitReport,
}

impl Emitter {
	pub fn new(dry_run: bool) -> Self {
		Self {
			dry_run,
			report: EmitReport::default(),
		}
	}

	pub fn emit(&mut self, path: &Path, bytes: &[u8]) {
		match write_if_changed(path, bytes, self.dry_run) {
			Ok(WriteOutcome::Written) => {
				tracing::debug!(path = %path.display(), "wrote artifact");
				self.report.written.push(path.to_path_buf());
			}
			Ok(WriteOutcome::Pending) => self.report.pending.push(path.to_path_buf()),
			Ok(WriteOutcome::Unchanged) => self.report.unchanged += 1,
			Err(error) => self.fail(path, error),
		}
	}

	pub fn emit_json<T: Serialize + ?Sized>(&mut self, path: &Path, value: &T) {
		match to_json_bytes(value) {
			Ok(bytes) => self.emit(path, &bytes),
			Err(error) => self.fail(path, error),
		}
	}

	/// Copy `source` to `target` when their bytes differ.
	pub fn copy(&mut self, source: &Path, target: &Path) {
		match std::fs::read(source) {
			Ok(bytes) => self.emit(target, &bytes),
			Err(error) => {
				self.fail(target, CourseError::EmitIoFailure {
					path: source.display().to_string(),
					reason: error.to_string(),
				});
			}
		}
	}

	pub fn fail(&mut self, path: &Path, error: CourseError) {
		tracing::warn!(path = %path.display(), %error, "failed to emit artifact");
		self.report.failures.push(EmitFailure {
			path: path.to_path_buf(),
			error,
		});
	}

	pub fn finish(self) -> EmitReport {
		self.report
	}
}
