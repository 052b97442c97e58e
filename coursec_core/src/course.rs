use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::CourseError;
use crate::CourseResult;

pub const DEFAULT_COLOR: &str = "gray";

/// A `(topic, chapter)` entry of a course plan. `topic == chapter` marks the
/// topic's index chapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Topic {
	pub topic: String,
	pub chapter: String,
}

impl Topic {
	pub fn new(topic: impl Into<String>, chapter: impl Into<String>) -> Self {
		Self {
			topic: topic.into(),
			chapter: chapter.into(),
		}
	}

	pub fn is_index(&self) -> bool {
		self.topic == self.chapter
	}
}

/// A worksheet that is currently handed out in a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorksheetRef {
	pub topic: String,
	pub chapter: String,
	pub worksheet: String,
}

/// One course as configured in `coursec.toml`.
///
/// ```toml
/// [[courses]]
/// group = "gym"
/// subject = "math"
/// course_variant = "gym-10a"
/// title = "Mathematik 10a"
/// color = "blue"
/// topics = [
///   { topic = "vectors", chapter = "vectors" },
///   { topic = "vectors", chapter = "intro" },
/// ]
/// current_worksheets = [
///   { topic = "vectors", chapter = "intro", worksheet = "ws-1" },
/// ]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoursePlan {
	pub group: String,
	pub subject: String,
	pub course_variant: String,
	/// Display name. Falls back to the course variant.
	#[serde(default)]
	pub title: Option<String>,
	#[serde(default = "default_color")]
	pub color: String,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default)]
	pub icon: Option<String>,
	/// Whether the course appears in the navigation.
	#[serde(default = "default_true")]
	pub listed: bool,
	#[serde(default = "default_true")]
	pub public: bool,
	/// Passed through to the SQL seed as-is.
	#[serde(default)]
	pub registration_open_until: Option<String>,
	#[serde(default)]
	pub topics: Vec<Topic>,
	#[serde(default)]
	pub current_worksheets: Vec<WorksheetRef>,
}

fn default_color() -> String {
	DEFAULT_COLOR.to_string()
}

fn default_true() -> bool {
	true
}

impl CoursePlan {
	/// `<group>-<course_variant>`
	pub fn id(&self) -> String {
		format!("{}-{}", self.group, self.course_variant)
	}

	pub fn title(&self) -> &str {
		self.title.as_deref().unwrap_or(&self.course_variant)
	}

	/// `subject/topic/chapters`
	pub fn base_dir(&self, topic: &str) -> String {
		format!("{}/{topic}/chapters", self.subject)
	}

	/// `courses/group/course_variant/topic`
	pub fn target_dir(&self, topic: &str) -> String {
		format!("courses/{}/{}/{topic}", self.group, self.course_variant)
	}

	/// The id of the compiled chapter document, `subject/topic/chapter`.
	pub fn chapter_id(&self, topic: &Topic) -> String {
		format!("{}/{}/{}", self.subject, topic.topic, topic.chapter)
	}

	/// The website source of a chapter.
	pub fn chapter_source(&self, topic: &Topic) -> String {
		if topic.is_index() {
			format!("{}/website.md", self.base_dir(&topic.topic))
		} else {
			format!("{}/{}/website.md", self.base_dir(&topic.topic), topic.chapter)
		}
	}

	/// The website target of a chapter.
	pub fn chapter_target(&self, topic: &Topic) -> String {
		if topic.is_index() {
			format!("{}/index.md", self.target_dir(&topic.topic))
		} else {
			format!("{}/{}.md", self.target_dir(&topic.topic), topic.chapter)
		}
	}

	/// Where the slides of a chapter live. Optional, unlike the website file.
	pub fn slides_source(&self, topic: &Topic) -> String {
		if topic.is_index() {
			format!("{}/slides.md", self.base_dir(&topic.topic))
		} else {
			format!("{}/{}/slides.md", self.base_dir(&topic.topic), topic.chapter)
		}
	}

	pub fn worksheet_source(&self, worksheet: &WorksheetRef) -> String {
		format!(
			"{}/{}/worksheets/{}.md",
			self.base_dir(&worksheet.topic),
			worksheet.chapter,
			worksheet.worksheet
		)
	}

	/// The planned topics in plan order, each with its chapters in plan order.
	pub fn grouped_topics(&self) -> Vec<(&str, Vec<&Topic>)> {
		let mut grouped: Vec<(&str, Vec<&Topic>)> = Vec::new();

		for topic in &self.topics {
			match grouped.iter_mut().find(|(id, _)| *id == topic.topic) {
				Some((_, chapters)) => chapters.push(topic),
				None => grouped.push((topic.topic.as_str(), vec![topic])),
			}
		}

		grouped
	}

	pub fn href(&self) -> String {
		format!("/courses/{}/{}", self.group, self.course_variant)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Process {
	Web,
	Pdf,
	PdfSolution,
}

/// Where a source file is read from and where its processed form is written,
/// both relative to their configured roots.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorksheetLocation {
	pub source: String,
	pub target: String,
	pub process: Process,
}

/// Map every planned chapter to its website file. Two different sources
/// mapping onto the same target is a [`CourseError::PathCollision`].
pub fn get_website_file_paths(plans: &[CoursePlan]) -> CourseResult<Vec<WorksheetLocation>> {
	let mut targets: BTreeMap<String, String> = BTreeMap::new();
	let mut locations = Vec::new();

	for plan in plans {
		for topic in &plan.topics {
			let source = plan.chapter_source(topic);
			let target = plan.chapter_target(topic);

			if let Some(first) = targets.get(&target) {
				if *first == source {
					continue;
				}

				return Err(CourseError::PathCollision {
					target,
					first: first.clone(),
					second: source,
				});
			}

			targets.insert(target.clone(), source.clone());
			locations.push(WorksheetLocation {
				source,
				target,
				process: Process::Web,
			});
		}
	}

	tracing::debug!(count = locations.len(), "mapped website files");
	Ok(locations)
}

/// Map every current worksheet to its pdf and solution pdf.
pub fn get_worksheet_file_paths(plans: &[CoursePlan]) -> Vec<WorksheetLocation> {
	plans
		.iter()
		.flat_map(|plan| {
			plan.current_worksheets.iter().flat_map(move |worksheet| {
				let source = plan.worksheet_source(worksheet);
				let pdf_dir = format!("pdf/{}/{}", plan.group, plan.course_variant);

				[
					WorksheetLocation {
						source: source.clone(),
						target: format!("{pdf_dir}/{}.pdf", worksheet.worksheet),
						process: Process::Pdf,
					},
					WorksheetLocation {
						source,
						target: format!("{pdf_dir}/{}-solution.pdf", worksheet.worksheet),
						process: Process::PdfSolution,
					},
				]
			})
		})
		.collect()
}

/// Check identifiers, duplicates and worksheet references of every plan.
pub fn validate_plans(plans: &[CoursePlan]) -> CourseResult<()> {
	let mut ids = BTreeSet::new();

	for plan in plans {
		let course = plan.id();
		let invalid = |reason: String| {
			CourseError::InvalidCoursePlan {
				course: course.clone(),
				reason,
			}
		};

		for (field, value) in [
			("group", &plan.group),
			("subject", &plan.subject),
			("course_variant", &plan.course_variant),
		] {
			if !is_identifier(value) {
				return Err(invalid(format!("`{field}` must be a non-empty slug, got `{value}`")));
			}
		}

		if !ids.insert(course.clone()) {
			return Err(invalid("the course id is used by more than one plan".to_string()));
		}

		if plan.topics.is_empty() {
			return Err(invalid("a course needs at least one topic".to_string()));
		}

		let mut planned = BTreeSet::new();

		for topic in &plan.topics {
			if !is_identifier(&topic.topic) || !is_identifier(&topic.chapter) {
				return Err(invalid(format!(
					"`{}/{}` is not a valid topic and chapter pair",
					topic.topic, topic.chapter
				)));
			}

			if !planned.insert((topic.topic.as_str(), topic.chapter.as_str())) {
				return Err(invalid(format!(
					"`{}/{}` is planned more than once",
					topic.topic, topic.chapter
				)));
			}
		}

		for worksheet in &plan.current_worksheets {
			if !is_identifier(&worksheet.worksheet) {
				return Err(invalid(format!(
					"`{}` is not a valid worksheet id",
					worksheet.worksheet
				)));
			}

			if !planned.contains(&(worksheet.topic.as_str(), worksheet.chapter.as_str())) {
				return Err(invalid(format!(
					"worksheet `{}` refers to `{}/{}` which is not planned",
					worksheet.worksheet, worksheet.topic, worksheet.chapter
				)));
			}
		}
	}

	Ok(())
}

fn is_identifier(value: &str) -> bool {
	!value.is_empty()
		&& value
			.chars()
			.all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

/// A course as persisted in the course config and the SQL seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
	pub id: String,
	pub group: String,
	pub subject: String,
	pub slug: String,
	pub title: String,
	pub color: String,
	pub tags: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub icon: Option<String>,
	pub is_listed: bool,
	pub is_public: bool,
	#[serde(skip)]
	pub registration_open_until: Option<String>,
	pub topics: Vec<CourseTopic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseTopic {
	pub id: String,
	pub label: String,
	pub href: String,
	pub chapters: Vec<CourseChapter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseChapter {
	pub id: String,
	pub label: String,
	pub href: String,
	pub is_index: bool,
}

impl Course {
	pub fn href(&self) -> String {
		format!("/courses/{}/{}", self.group, self.slug)
	}

	/// The first planned topic and its first chapter.
	pub fn current_chapter(&self) -> Option<(&CourseTopic, &CourseChapter)> {
		let topic = self.topics.first()?;
		Some((topic, topic.chapters.first()?))
	}
}

/// Assemble the courses of a build. `chapter_titles` maps chapter document ids
/// (`subject/topic/chapter`) to the first heading of the chapter.
pub fn build_courses(plans: &[CoursePlan], chapter_titles: &BTreeMap<String, String>) -> Vec<Course> {
	plans
		.iter()
		.map(|plan| build_course(plan, chapter_titles))
		.collect()
}

fn build_course(plan: &CoursePlan, chapter_titles: &BTreeMap<String, String>) -> Course {
	let course_href = plan.href();
	let topics = plan
		.grouped_topics()
		.into_iter()
		.map(|(topic_id, chapters)| {
			let topic_href = format!("{course_href}/{topic_id}");
			let chapters: Vec<CourseChapter> = chapters
				.into_iter()
				.map(|topic| {
					let label = chapter_titles
						.get(&plan.chapter_id(topic))
						.cloned()
						.unwrap_or_else(|| topic.chapter.clone());
					let href = if topic.is_index() {
						topic_href.clone()
					} else {
						format!("{topic_href}/{}", topic.chapter)
					};

					CourseChapter {
						id: topic.chapter.clone(),
						label,
						href,
						is_index: topic.is_index(),
					}
				})
				.collect();

			let label = chapters
				.iter()
				.find(|chapter| chapter.is_index)
				.map_or_else(|| topic_id.to_string(), |chapter| chapter.label.clone());

			CourseTopic {
				id: topic_id.to_string(),
				label,
				href: topic_href,
				chapters,
			}
		})
		.collect();

	Course {
		id: plan.id(),
		group: plan.group.clone(),
		subject: plan.subject.clone(),
		slug: plan.course_variant.clone(),
		title: plan.title().to_string(),
		color: plan.color.clone(),
		tags: plan.tags.clone(),
		icon: plan.icon.clone(),
		is_listed: plan.listed,
		is_public: plan.public,
		registration_open_until: plan.registration_open_until.clone(),
		topics,
	}
}
