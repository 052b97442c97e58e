use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;

use crate::CourseConfig;
use crate::CourseError;
use crate::CourseResult;
use crate::DocumentContext;
use crate::MacroRegistry;
use crate::course::Course;
use crate::course::CoursePlan;
use crate::course::Process;
use crate::course::Topic;
use crate::course::WorksheetLocation;
use crate::course::WorksheetRef;
use crate::course::build_courses;
use crate::course::get_website_file_paths;
use crate::course::get_worksheet_file_paths;
use crate::emit::COURSES_CONFIG_PATH;
use crate::emit::COURSES_SQL_PATH;
use crate::emit::EmitFailure;
use crate::emit::Emitter;
use crate::emit::NAVBAR_CONFIG_PATH;
use crate::emit::WORKSHEETS_PATH;
use crate::emit::course_config;
use crate::emit::courses_sql;
use crate::emit::document_output_path;
use crate::emit::navbar_config;
use crate::parser::parse_document;
use crate::tree::DocumentTree;
use crate::tree::build_tree;

/// Where a document sits in the course structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLocation {
	pub group: String,
	pub subject: String,
	pub course_variant: String,
	pub topic: String,
	pub chapter: String,
	pub worksheet: Option<String>,
}

impl DocumentLocation {
	pub fn chapter(plan: &CoursePlan, topic: &Topic) -> Self {
		Self {
			group: plan.group.clone(),
			subject: plan.subject.clone(),
			course_variant: plan.course_variant.clone(),
			topic: topic.topic.clone(),
			chapter: topic.chapter.clone(),
			worksheet: None,
		}
	}

	#[must_use]
	pub fn with_worksheet(mut self, worksheet: impl Into<String>) -> Self {
		self.worksheet = Some(worksheet.into());
		self
	}

	/// `subject/topic/chapter`, extended with `/worksheets/<id>` or `/slides`.
	pub fn document_id(&self, context: DocumentContext) -> String {
		let base = format!("{}/{}/{}", self.subject, self.topic, self.chapter);

		match (context, &self.worksheet) {
			(DocumentContext::Worksheet, Some(worksheet)) => format!("{base}/worksheets/{worksheet}"),
			(DocumentContext::Slides, _) => format!("{base}/slides"),
			_ => base,
		}
	}
}

/// Raw markup of one document, ready to compile.
#[derive(Debug, Clone)]
pub struct SourceDocument {
	pub id: String,
	pub context: DocumentContext,
	pub location: DocumentLocation,
	pub text: Arc<str>,
}

impl SourceDocument {
	pub fn new(location: DocumentLocation, context: DocumentContext, text: impl Into<Arc<str>>) -> Self {
		Self {
			id: location.document_id(context),
			context,
			location,
			text: text.into(),
		}
	}
}

/// Run the per-document pipeline: extract literals, dispatch macros, build
/// the tree.
pub fn compile_document(document: &SourceDocument, registry: &MacroRegistry) -> CourseResult<DocumentTree> {
	let parsed = parse_document(&document.id, document.context, document.text.clone(), registry)?;
	let tree = build_tree(&parsed, document.context)?;
	tracing::debug!(document = %document.id, context = %document.context, "compiled document");

	Ok(tree)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
	/// Compile everything but write nothing.
	pub dry_run: bool,
}

/// A document to compile, keyed by its source path relative to the content
/// directory.
#[derive(Debug, Clone)]
pub struct DocumentJob {
	pub source: String,
	pub context: DocumentContext,
	pub location: DocumentLocation,
}

impl DocumentJob {
	pub fn id(&self) -> String {
		self.location.document_id(self.context)
	}
}

/// A document that failed to compile. Other documents are unaffected.
#[derive(Debug)]
pub struct DocumentFailure {
	pub document: String,
	pub source: PathBuf,
	pub error: CourseError,
}

#[derive(Debug, Default)]
pub struct BuildReport {
	/// Ids of the documents that compiled.
	pub compiled: Vec<String>,
	pub written: Vec<PathBuf>,
	/// Files a dry run would have written.
	pub pending: Vec<PathBuf>,
	pub unchanged: usize,
	pub document_failures: Vec<DocumentFailure>,
	pub emit_failures: Vec<EmitFailure>,
	pub courses: Vec<Course>,
}

impl BuildReport {
	pub fn is_ok(&self) -> bool {
		self.document_failures.is_empty() && self.emit_failures.is_empty()
	}
}

/// Every document the course plans refer to, deduplicated by source path.
/// Slides are only included when their file exists under `content_dir`.
pub fn plan_documents(config: &CourseConfig, content_dir: &Path) -> Vec<DocumentJob> {
	let mut jobs: BTreeMap<String, DocumentJob> = BTreeMap::new();

	for plan in &config.courses {
		for topic in &plan.topics {
			let location = DocumentLocation::chapter(plan, topic);
			let source = plan.chapter_source(topic);
			jobs.entry(source.clone()).or_insert_with(|| {
				DocumentJob {
					source,
					context: DocumentContext::Page,
					location: location.clone(),
				}
			});

			let slides = plan.slides_source(topic);
			if config.build.slides && content_dir.join(&slides).is_file() {
				jobs.entry(slides.clone()).or_insert_with(|| {
					DocumentJob {
						source: slides,
						context: DocumentContext::Slides,
						location,
					}
				});
			}
		}

		for worksheet in &plan.current_worksheets {
			let source = plan.worksheet_source(worksheet);
			jobs.entry(source.clone())
				.or_insert_with(|| worksheet_job(plan, worksheet, source));
		}
	}

	jobs.into_values().collect()
}

fn worksheet_job(plan: &CoursePlan, worksheet: &WorksheetRef, source: String) -> DocumentJob {
	let topic = Topic::new(worksheet.topic.clone(), worksheet.chapter.clone());

	DocumentJob {
		source,
		context: DocumentContext::Worksheet,
		location: DocumentLocation::chapter(plan, &topic).with_worksheet(worksheet.worksheet.clone()),
	}
}

/// Compile every planned document and emit all artifacts.
///
/// Registry misconfiguration, invalid plans and path collisions abort the
/// build before anything is written. Failures of single documents or
/// artifacts are collected in the report.
pub fn build_project(root: &Path, config: &CourseConfig, options: &BuildOptions) -> CourseResult<BuildReport> {
	let registry = MacroRegistry::standard()?;
	config.validate()?;

	let website_paths = get_website_file_paths(&config.courses)?;
	let worksheet_paths = get_worksheet_file_paths(&config.courses);
	let content_dir = config.content_dir(root);
	let generated_dir = config.generated_dir(root);
	let jobs = plan_documents(config, &content_dir);

	tracing::info!(documents = jobs.len(), courses = config.courses.len(), "compiling documents");

	let compile_all = || {
		jobs.par_iter()
			.map(|job| (job, compile_job(job, &content_dir, &registry)))
			.collect::<Vec<_>>()
	};

	let results = match config.build.threads {
		Some(threads) => {
			match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
				Ok(pool) => pool.install(compile_all),
				Err(error) => {
					tracing::warn!(%error, "falling back to the global thread pool");
					compile_all()
				}
			}
		}
		None => compile_all(),
	};

	let mut report = BuildReport::default();
	let mut emitter = Emitter::new(options.dry_run);
	let mut chapter_titles = BTreeMap::new();
	let mut failed_sources = Vec::new();

	for (job, result) in results {
		let id = job.id();

		match result {
			Ok(tree) => {
				if job.context == DocumentContext::Page {
					if let Some(title) = tree.title() {
						chapter_titles.insert(id.clone(), title.to_string());
					}
				}

				emitter.emit_json(&document_output_path(&generated_dir, &id), &tree);
				report.compiled.push(id);
			}
			Err(error) => {
				tracing::warn!(document = %id, %error, "document failed to compile");
				failed_sources.push(job.source.clone());
				report.document_failures.push(DocumentFailure {
					document: id,
					source: content_dir.join(&job.source),
					error,
				});
			}
		}
	}

	tracing::info!(
		compiled = report.compiled.len(),
		failed = report.document_failures.len(),
		"emitting course artifacts"
	);

	let courses = build_courses(&config.courses, &chapter_titles);
	emitter.emit_json(&generated_dir.join(COURSES_CONFIG_PATH), &course_config(&courses));
	emitter.emit_json(&generated_dir.join(NAVBAR_CONFIG_PATH), &navbar_config(&courses));
	emitter.emit(
		&config.scripts_dir(root).join(COURSES_SQL_PATH),
		courses_sql(&courses).as_bytes(),
	);
	emitter.emit_json(&generated_dir.join(WORKSHEETS_PATH), &worksheet_paths);

	if config.build.publish_website {
		publish_website(&mut emitter, &website_paths, &failed_sources, &content_dir, &config.website_dir(root));
	}

	let emitted = emitter.finish();
	report.written = emitted.written;
	report.pending = emitted.pending;
	report.unchanged = emitted.unchanged;
	report.emit_failures = emitted.failures;
	report.courses = courses;

	tracing::info!(
		written = report.written.len(),
		unchanged = report.unchanged,
		failures = report.emit_failures.len() + report.document_failures.len(),
		"build finished"
	);

	Ok(report)
}

fn compile_job(job: &DocumentJob, content_dir: &Path, registry: &MacroRegistry) -> CourseResult<DocumentTree> {
	let text = std::fs::read_to_string(content_dir.join(&job.source))?;
	let document = SourceDocument::new(job.location.clone(), job.context, text);

	compile_document(&document, registry)
}

/// Copy website sources to their targets, skipping sources that failed to
/// compile.
fn publish_website(
	emitter: &mut Emitter,
	locations: &[WorksheetLocation],
	failed_sources: &[String],
	content_dir: &Path,
	website_dir: &Path,
) {
	for location in locations {
		if location.process != Process::Web || failed_sources.contains(&location.source) {
			continue;
		}

		emitter.copy(&content_dir.join(&location.source), &website_dir.join(&location.target));
	}
}
