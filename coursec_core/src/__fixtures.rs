use std::path::Path;

use crate::CourseResult;
use crate::DocumentContext;
use crate::DocumentLocation;
use crate::DocumentTree;
use crate::MacroRegistry;
use crate::ParsedDocument;
use crate::SourceDocument;
use crate::compile_document;
use crate::course::CoursePlan;
use crate::course::Topic;
use crate::course::WorksheetRef;
use crate::parser::parse_document;

pub const DOCUMENT_ID: &str = "math/vectors/intro";

pub fn registry() -> MacroRegistry {
	MacroRegistry::standard().unwrap_or_else(|e| panic!("registry: {e}"))
}

pub fn location() -> DocumentLocation {
	DocumentLocation {
		group: "g".into(),
		subject: "math".into(),
		course_variant: "v".into(),
		topic: "vectors".into(),
		chapter: "intro".into(),
		worksheet: None,
	}
}

pub fn parse(source: &str, context: DocumentContext) -> CourseResult<ParsedDocument> {
	parse_document(DOCUMENT_ID, context, source, &registry())
}

pub fn compile(source: &str, context: DocumentContext) -> CourseResult<DocumentTree> {
	let document = SourceDocument::new(location(), context, source);
	compile_document(&document, &registry())
}

pub fn page(source: &str) -> crate::SectionedDocument {
	match compile(source, DocumentContext::Page) {
		Ok(DocumentTree::Page(document)) => document,
		other => panic!("expected a page, got {other:?}"),
	}
}

pub fn plan(topics: &[(&str, &str)]) -> CoursePlan {
	CoursePlan {
		group: "g".into(),
		subject: "math".into(),
		course_variant: "v".into(),
		title: Some("Vectors course".into()),
		color: "blue".into(),
		tags: vec!["math".into()],
		icon: None,
		listed: true,
		public: true,
		registration_open_until: None,
		topics: topics
			.iter()
			.map(|(topic, chapter)| Topic::new(*topic, *chapter))
			.collect(),
		current_worksheets: Vec::new(),
	}
}

pub fn worksheet(topic: &str, chapter: &str, id: &str) -> WorksheetRef {
	WorksheetRef {
		topic: topic.into(),
		chapter: chapter.into(),
		worksheet: id.into(),
	}
}

pub fn write_file(root: &Path, relative: &str, content: &str) {
	let path = root.join(relative);

	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("create dir: {e}"));
	}

	std::fs::write(path, content).unwrap_or_else(|e| panic!("write: {e}"));
}

pub const PROJECT_CONFIG: &str = r#"
[[courses]]
group = "g"
subject = "math"
course_variant = "v"
title = "Vectors course"
color = "blue"
topics = [
  { topic = "vectors", chapter = "vectors" },
  { topic = "vectors", chapter = "intro" },
  { topic = "vectors", chapter = "broken" },
]
current_worksheets = [
  { topic = "vectors", chapter = "intro", worksheet = "ws-1" },
]

[[courses]]
group = "g"
subject = "math"
course_variant = "hidden"
listed = false
registration_open_until = "2026-12-31"
topics = [{ topic = "vectors", chapter = "intro" }]
"#;

/// A project with one broken chapter next to healthy ones.
pub fn project_fixture() -> tempfile::TempDir {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();

	write_file(root, "coursec.toml", PROJECT_CONFIG);
	write_file(
		root,
		"content/math/vectors/chapters/website.md",
		"# Vectors\n\nAn overview of vectors.\n",
	);
	write_file(
		root,
		"content/math/vectors/chapters/intro/website.md",
		"# Introduction\n\n## Aufgaben\n\n#textTask[Explain what a vector is.]\n\n#mcq[\n  Pick the \
		 vectors.\n  - [x] (1, 2)\n  - [ ] 3\n  - [x] (0, 1)\n]\n",
	);
	write_file(
		root,
		"content/math/vectors/chapters/broken/website.md",
		"# Broken\n\n#mathTask[No hint here. #solution{1}]\n",
	);
	write_file(
		root,
		"content/math/vectors/chapters/intro/worksheets/ws-1.md",
		"# Worksheet 1\n\n## Checkpoint\n\n#textTask[Try it.]\n",
	);
	write_file(
		root,
		"content/math/vectors/chapters/intro/slides.md",
		"# Slides\n\n#pn[Say hello]\n\n---\n\n## Arrows\n\nVectors are arrows.\n",
	);

	tmp
}
