//! Groups the prose and macros of a parsed document into categories, task
//! sets and slides.

use markdown::ParseOptions;
use markdown::mdast::Node;
use markdown::to_mdast;
use serde::Serialize;

use crate::CourseError;
use crate::CourseResult;
use crate::DocumentContext;
use crate::MacroKind;
use crate::macros::Macro;
use crate::macros::Markdown;
use crate::macros::NoteMacro;
use crate::macros::Task;
use crate::parser::ParsedDocument;
use crate::parser::ParsedSegment;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DocumentTree {
	Page(SectionedDocument),
	Worksheet(SectionedDocument),
	SlideDeck(SlideDeck),
}

impl DocumentTree {
	/// The first level-1 heading of the document, if any.
	pub fn title(&self) -> Option<&str> {
		match self {
			DocumentTree::Page(document) | DocumentTree::Worksheet(document) => {
				document.title.as_deref()
			}
			DocumentTree::SlideDeck(deck) => deck.title.as_deref(),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionedDocument {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub intro: Option<Markdown>,
	pub categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Category {
	Info { title: String, text: Markdown },
	Checkpoint { title: String, items: Vec<Item> },
	Core { title: String, items: Vec<Item> },
	Challenge { title: String, items: Vec<Item> },
}

impl Category {
	pub fn task(kind: TaskCategoryKind, title: String, items: Vec<Item>) -> Self {
		match kind {
			TaskCategoryKind::Checkpoint => Category::Checkpoint { title, items },
			TaskCategoryKind::Core => Category::Core { title, items },
			TaskCategoryKind::Challenge => Category::Challenge { title, items },
		}
	}

	pub fn title(&self) -> &str {
		match self {
			Category::Info { title, .. }
			| Category::Checkpoint { title, .. }
			| Category::Core { title, .. }
			| Category::Challenge { title, .. } => title,
		}
	}

	/// The items of a task category. Info categories have none.
	pub fn items(&self) -> &[Item] {
		match self {
			Category::Info { .. } => &[],
			Category::Checkpoint { items, .. }
			| Category::Core { items, .. }
			| Category::Challenge { items, .. } => items,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategoryKind {
	Checkpoint,
	Core,
	Challenge,
}

const CHECKPOINT_WORDS: &[&str] = &["checkpoint", "check-in", "selbsttest", "selbstcheck"];
const CHALLENGE_WORDS: &[&str] = &["challenge", "knobel", "bonus", "expert", "vertiefung"];

/// Classify a category header. Leading `#` markers and case are ignored;
/// anything that matches no vocabulary word is `Core`.
pub fn classify_header(header: &str) -> TaskCategoryKind {
	let header = header.trim().trim_start_matches('#').to_lowercase();

	if CHECKPOINT_WORDS.iter().any(|word| header.contains(word)) {
		TaskCategoryKind::Checkpoint
	} else if CHALLENGE_WORDS.iter().any(|word| header.contains(word)) {
		TaskCategoryKind::Challenge
	} else {
		TaskCategoryKind::Core
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Item {
	Info(InfoBlock),
	TaskSet(TaskSet),
	Note(NoteMacro),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoBlock {
	pub title: String,
	pub text: Markdown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskSet {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub intro: Option<Markdown>,
	pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlideDeck {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	pub slides: Vec<Slide>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	pub blocks: Vec<SlideBlock>,
	pub presenter_notes: Vec<Markdown>,
}

impl Slide {
	fn is_empty(&self) -> bool {
		self.title.is_none() && self.blocks.is_empty() && self.presenter_notes.is_empty()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SlideBlock {
	Markdown { text: Markdown },
	Note(NoteMacro),
	Task { task: Task },
}

/// Assemble the tree of a parsed document.
pub fn build_tree(parsed: &ParsedDocument, context: DocumentContext) -> CourseResult<DocumentTree> {
	let events = events(parsed)?;
	tracing::trace!(document = %parsed.document, events = events.len(), "building document tree");

	Ok(match context {
		DocumentContext::Page => DocumentTree::Page(build_sections(parsed, context, events)?),
		DocumentContext::Worksheet => DocumentTree::Worksheet(build_sections(parsed, context, events)?),
		DocumentContext::Slides => DocumentTree::SlideDeck(build_slides(events)),
	})
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
	Heading { depth: u8, title: String },
	Break,
	Prose(String),
	Macro { offset: usize, r#macro: Macro },
}

/// Flatten the segments into headings, breaks, prose and macros. Headings and
/// breaks are located in each prose segment's mdast.
fn events(parsed: &ParsedDocument) -> CourseResult<Vec<Event>> {
	let options = ParseOptions::gfm();
	let mut events = Vec::new();

	for segment in &parsed.segments {
		let range = match segment {
			ParsedSegment::Prose(range) => range,
			ParsedSegment::Macro { span, r#macro } => {
				events.push(Event::Macro {
					offset: span.start,
					r#macro: r#macro.clone(),
				});
				continue;
			}
		};

		let segment = &parsed.scrubbed[range.clone()];

		// Text after a macro on the same line cannot open a heading or break.
		let line_start = range.start == 0 || parsed.scrubbed.as_bytes()[range.start - 1] == b'\n';
		let rest_of_line = if line_start {
			0
		} else {
			segment.find('\n').map_or(segment.len(), |index| index + 1)
		};
		push_prose(&mut events, parsed, &segment[..rest_of_line]);

		let slice = &segment[rest_of_line..];
		let root = to_mdast(slice, &options).map_err(|e| CourseError::Markdown(e.to_string()))?;
		let mut last = 0;

		for child in root.children().into_iter().flatten() {
			let Some(position) = child.position() else {
				continue;
			};

			let event = match child {
				Node::Heading(heading) => {
					let title = match (heading.children.first(), heading.children.last()) {
						(Some(first), Some(last)) => {
							match (first.position(), last.position()) {
								(Some(start), Some(end)) => {
									&slice[start.start.offset..end.end.offset]
								}
								_ => "",
							}
						}
						_ => "",
					};

					Event::Heading {
						depth: heading.depth,
						title: parsed.blocks.restore(title).trim().to_string(),
					}
				}
				Node::ThematicBreak(_) => Event::Break,
				_ => continue,
			};

			push_prose(&mut events, parsed, &slice[last..position.start.offset]);
			events.push(event);
			last = position.end.offset;
		}

		push_prose(&mut events, parsed, &slice[last..]);
	}

	Ok(events)
}

fn push_prose(events: &mut Vec<Event>, parsed: &ParsedDocument, scrubbed: &str) {
	let text = parsed.blocks.restore(scrubbed);
	let text = text.trim();

	if !text.is_empty() {
		events.push(Event::Prose(text.to_string()));
	}
}

#[derive(Debug)]
struct Section {
	kind: TaskCategoryKind,
	title: String,
	items: Vec<Item>,
	/// Markdown of the whole section, used when it turns out to hold no tasks.
	text: Vec<String>,
	pending_prose: Vec<String>,
	pending_title: Option<String>,
	open_set: Option<TaskSet>,
	has_tasks: bool,
}

impl Section {
	fn new(title: String) -> Self {
		Self {
			kind: classify_header(&title),
			title,
			items: Vec::new(),
			text: Vec::new(),
			pending_prose: Vec::new(),
			pending_title: None,
			open_set: None,
			has_tasks: false,
		}
	}

	fn implicit() -> Self {
		Self {
			kind: TaskCategoryKind::Core,
			..Self::new(String::new())
		}
	}

	fn sub_heading(&mut self, depth: u8, title: String) {
		self.flush_prose();
		self.close_set();
		self.text.push(format!("{} {title}", "#".repeat(usize::from(depth))));
		self.pending_title = Some(title);
	}

	fn prose(&mut self, text: String) {
		self.text.push(text.clone());
		self.pending_prose.push(text);
	}

	fn task(&mut self, task: Task) {
		self.has_tasks = true;

		if !self.pending_prose.is_empty() {
			self.close_set();
			let intro = Markdown::new(self.pending_prose.join("\n\n"));
			self.pending_prose.clear();
			self.open_set = Some(TaskSet {
				title: self.pending_title.take(),
				intro: Some(intro),
				tasks: Vec::new(),
			});
		}

		self.open_set
			.get_or_insert_with(|| {
				TaskSet {
					title: self.pending_title.take(),
					..TaskSet::default()
				}
			})
			.tasks
			.push(task);
	}

	fn note(&mut self, note: NoteMacro) {
		self.flush_prose();
		self.close_set();
		self.text.push(note.content.to_string());
		self.items.push(Item::Note(note));
	}

	fn flush_prose(&mut self) {
		if self.pending_prose.is_empty() {
			return;
		}

		let title = self
			.pending_title
			.take()
			.unwrap_or_else(|| self.title.clone());
		let text = Markdown::new(self.pending_prose.join("\n\n"));
		self.pending_prose.clear();
		self.items.push(Item::Info(InfoBlock { title, text }));
	}

	fn close_set(&mut self) {
		if let Some(set) = self.open_set.take() {
			self.items.push(Item::TaskSet(set));
		}
	}

	fn finish(mut self) -> Category {
		if !self.has_tasks {
			return Category::Info {
				title: self.title,
				text: Markdown::new(self.text.join("\n\n")),
			};
		}

		self.flush_prose();
		self.close_set();
		Category::task(self.kind, self.title, self.items)
	}
}

fn build_sections(
	parsed: &ParsedDocument,
	context: DocumentContext,
	events: Vec<Event>,
) -> CourseResult<SectionedDocument> {
	let mut document = SectionedDocument::default();
	let mut intro: Vec<String> = Vec::new();
	let mut implicit = Section::implicit();
	let mut current: Option<Section> = None;

	for event in events {
		match event {
			Event::Heading { depth: 1, title }
				if document.title.is_none() && current.is_none() =>
			{
				document.title = Some(title);
			}
			Event::Heading { depth, title } if depth <= 2 => {
				if let Some(section) = current.take() {
					document.categories.push(section.finish());
				} else {
					flush_implicit(&mut document, &mut intro, &mut implicit);
				}

				current = Some(Section::new(title));
			}
			Event::Heading { depth, title } => {
				match current.as_mut() {
					Some(section) => section.sub_heading(depth, title),
					None => intro.push(format!("{} {title}", "#".repeat(usize::from(depth)))),
				}
			}
			Event::Break => {
				match current.as_mut() {
					Some(section) => section.prose("---".to_string()),
					None => intro.push("---".to_string()),
				}
			}
			Event::Prose(text) => {
				match current.as_mut() {
					Some(section) => section.prose(text),
					None => intro.push(text),
				}
			}
			Event::Macro {
				r#macro: Macro::Task(task),
				..
			} => {
				current.as_mut().unwrap_or(&mut implicit).task(task);
			}
			Event::Macro {
				r#macro: Macro::Note(note),
				..
			} => {
				current.as_mut().unwrap_or(&mut implicit).note(note);
			}
			Event::Macro {
				r#macro: Macro::PresenterNote(_),
				offset,
			} => {
				let (offset, line) = parsed.locate(offset);
				return Err(CourseError::MacroNotAllowedInContext {
					document: parsed.document.clone(),
					name: MacroKind::PresenterNote.tag().to_string(),
					context: context.to_string(),
					offset,
					line,
				});
			}
		}
	}

	match current {
		Some(section) => document.categories.push(section.finish()),
		None => flush_implicit(&mut document, &mut intro, &mut implicit),
	}

	if !intro.is_empty() {
		document.intro = Some(Markdown::new(intro.join("\n\n")));
	}

	Ok(document)
}

/// Move tasks found before the first category heading into an untitled core
/// category. Notes without any tasks join the intro.
fn flush_implicit(document: &mut SectionedDocument, intro: &mut Vec<String>, implicit: &mut Section) {
	let section = std::mem::replace(implicit, Section::implicit());

	if section.has_tasks {
		document.categories.push(section.finish());
	} else {
		intro.extend(section.text);
	}
}

fn build_slides(events: Vec<Event>) -> SlideDeck {
	let mut deck = SlideDeck::default();
	let mut slide = Slide::default();

	for event in events {
		match event {
			Event::Break => {
				let finished = std::mem::take(&mut slide);
				if !finished.is_empty() {
					deck.slides.push(finished);
				}
			}
			Event::Heading { depth, title } => {
				if depth == 1 && deck.title.is_none() {
					deck.title = Some(title.clone());
				}

				if slide.title.is_none() && slide.blocks.is_empty() {
					slide.title = Some(title);
				} else {
					push_slide_markdown(&mut slide, format!("{} {title}", "#".repeat(usize::from(depth))));
				}
			}
			Event::Prose(text) => push_slide_markdown(&mut slide, text),
			Event::Macro { r#macro, .. } => {
				match r#macro {
					Macro::Note(note) => slide.blocks.push(SlideBlock::Note(note)),
					Macro::Task(task) => slide.blocks.push(SlideBlock::Task { task }),
					Macro::PresenterNote(note) => slide.presenter_notes.push(note.content),
				}
			}
		}
	}

	if !slide.is_empty() {
		deck.slides.push(slide);
	}

	deck
}

fn push_slide_markdown(slide: &mut Slide, text: String) {
	if let Some(SlideBlock::Markdown { text: previous }) = slide.blocks.last_mut() {
		*previous = Markdown::new(format!("{previous}\n\n{text}"));
		return;
	}

	slide.blocks.push(SlideBlock::Markdown {
		text: Markdown::new(text),
	});
}

/// Conversion of tree nodes into plain text for labels and search.
pub trait PlainText {
	fn plain_text(&self) -> String;
}

fn join_plain<'a, T: PlainText + 'a>(nodes: impl IntoIterator<Item = &'a T>) -> String {
	nodes
		.into_iter()
		.map(PlainText::plain_text)
		.filter(|text| !text.is_empty())
		.collect::<Vec<_>>()
		.join("\n")
}

fn join_strings(parts: impl IntoIterator<Item = String>) -> String {
	parts
		.into_iter()
		.filter(|text| !text.is_empty())
		.collect::<Vec<_>>()
		.join("\n")
}

impl PlainText for Markdown {
	fn plain_text(&self) -> String {
		match to_mdast(self, &ParseOptions::gfm()) {
			Ok(root) => mdast_plain_text(&root).trim().to_string(),
			Err(_) => self.trim().to_string(),
		}
	}
}

fn mdast_plain_text(node: &Node) -> String {
	match node {
		Node::Root(root) => block_text(&root.children),
		Node::Blockquote(quote) => block_text(&quote.children),
		Node::FootnoteDefinition(footnote) => block_text(&footnote.children),
		Node::List(list) => block_text(&list.children),
		Node::ListItem(item) => block_text(&item.children),
		Node::Table(table) => block_text(&table.children),
		Node::TableRow(row) => block_text(&row.children),
		Node::MdxJsxFlowElement(element) => block_text(&element.children),
		Node::Paragraph(paragraph) => inline_text(&paragraph.children),
		Node::Heading(heading) => inline_text(&heading.children),
		Node::TableCell(cell) => inline_text(&cell.children),
		Node::Emphasis(emphasis) => inline_text(&emphasis.children),
		Node::Strong(strong) => inline_text(&strong.children),
		Node::Delete(delete) => inline_text(&delete.children),
		Node::Link(link) => inline_text(&link.children),
		Node::LinkReference(link) => inline_text(&link.children),
		Node::MdxJsxTextElement(element) => inline_text(&element.children),
		Node::Text(text) => text.value.clone(),
		Node::InlineCode(code) => code.value.clone(),
		Node::InlineMath(math) => math.value.clone(),
		Node::Code(code) => code.value.clone(),
		Node::Math(math) => math.value.clone(),
		Node::Image(image) => image.alt.clone(),
		Node::ImageReference(image) => image.alt.clone(),
		Node::Break(_) => "\n".to_string(),
		Node::Html(_)
		| Node::ThematicBreak(_)
		| Node::Definition(_)
		| Node::FootnoteReference(_)
		| Node::MdxjsEsm(_)
		| Node::MdxTextExpression(_)
		| Node::MdxFlowExpression(_)
		| Node::Toml(_)
		| Node::Yaml(_) => String::new(),
	}
}

/// Block children sit on their own lines.
fn block_text(children: &[Node]) -> String {
	join_strings(children.iter().map(mdast_plain_text))
}

fn inline_text(children: &[Node]) -> String {
	children.iter().map(mdast_plain_text).collect()
}

impl PlainText for Task {
	fn plain_text(&self) -> String {
		match self {
			Task::Text(task) => {
				join_strings([
					task.instruction.plain_text(),
					task.hint.as_ref().map(PlainText::plain_text).unwrap_or_default(),
					task.solution.as_ref().map(PlainText::plain_text).unwrap_or_default(),
				])
			}
			Task::Math(task) => {
				join_strings([
					task.instruction.plain_text(),
					task.hint.plain_text(),
					task.solution.plain_text(),
				])
			}
			Task::Code(task) => join_strings([task.instruction.plain_text(), task.code.clone()]),
			Task::Mcq(task) => {
				join_strings(
					std::iter::once(task.question.plain_text())
						.chain(task.options.iter().map(|option| option.text.plain_text())),
				)
			}
			Task::Gap(task) => {
				let mut text = String::new();

				for (index, part) in task.parts.iter().enumerate() {
					text.push_str(&part.plain_text());

					if let Some(field) = task.fields.get(index) {
						text.push_str(" ___ ");
						text.push_str(&field.answers.join(" / "));
						text.push_str(" ___ ");
					}
				}

				text.trim().to_string()
			}
		}
	}
}

impl PlainText for TaskSet {
	fn plain_text(&self) -> String {
		join_strings(
			[
				self.title.clone().unwrap_or_default(),
				self.intro.as_ref().map(PlainText::plain_text).unwrap_or_default(),
			]
			.into_iter()
			.chain(self.tasks.iter().map(PlainText::plain_text)),
		)
	}
}

impl PlainText for Item {
	fn plain_text(&self) -> String {
		match self {
			Item::Info(info) => join_strings([info.title.clone(), info.text.plain_text()]),
			Item::TaskSet(set) => set.plain_text(),
			Item::Note(note) => note.content.plain_text(),
		}
	}
}

impl PlainText for Category {
	fn plain_text(&self) -> String {
		match self {
			Category::Info { title, text } => join_strings([title.clone(), text.plain_text()]),
			Category::Checkpoint { title, items }
			| Category::Core { title, items }
			| Category::Challenge { title, items } => {
				join_strings(std::iter::once(title.clone()).chain(items.iter().map(PlainText::plain_text)))
			}
		}
	}
}

impl PlainText for SectionedDocument {
	fn plain_text(&self) -> String {
		join_strings(
			[
				self.title.clone().unwrap_or_default(),
				self.intro.as_ref().map(PlainText::plain_text).unwrap_or_default(),
				join_plain(&self.categories),
			],
		)
	}
}

impl PlainText for SlideBlock {
	fn plain_text(&self) -> String {
		match self {
			SlideBlock::Markdown { text } => text.plain_text(),
			SlideBlock::Note(note) => note.content.plain_text(),
			SlideBlock::Task { task } => task.plain_text(),
		}
	}
}

impl PlainText for Slide {
	fn plain_text(&self) -> String {
		join_strings([self.title.clone().unwrap_or_default(), join_plain(&self.blocks)])
	}
}

impl PlainText for DocumentTree {
	fn plain_text(&self) -> String {
		match self {
			DocumentTree::Page(document) | DocumentTree::Worksheet(document) => document.plain_text(),
			DocumentTree::SlideDeck(deck) => {
				join_strings([deck.title.clone().unwrap_or_default(), join_plain(&deck.slides)])
			}
		}
	}
}
