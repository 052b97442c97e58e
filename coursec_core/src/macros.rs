use derive_more::Deref;
use derive_more::Display;
use serde::Serialize;

use crate::CourseError;
use crate::CourseResult;
use crate::DocumentContext;
use crate::parser::MacroNode;
use crate::parser::RawSpan;
use crate::position::Locator;
use crate::protect::LiteralKind;
use crate::protect::ProtectedBlocks;
use crate::shuffle::deterministic_shuffle;

/// Restored markdown text: no macro syntax and no placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, Display, Serialize)]
#[serde(transparent)]
pub struct Markdown(String);

impl Markdown {
	pub fn new(text: impl Into<String>) -> Self {
		Self(text.into())
	}

	pub fn into_inner(self) -> String {
		self.0
	}
}

impl From<&str> for Markdown {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteMacro {
	pub content: Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenterNoteMacro {
	pub content: Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextTaskMacro {
	pub instruction: Markdown,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub hint: Option<Markdown>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub solution: Option<Markdown>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MathTaskMacro {
	pub instruction: Markdown,
	pub hint: Markdown,
	pub solution: Markdown,
}

/// Languages a `#codeTask` may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum CodeLanguage {
	#[display("ts")]
	#[serde(rename = "ts")]
	Ts,
}

impl CodeLanguage {
	pub fn from_info(info: &str) -> Option<Self> {
		match info {
			"ts" => Some(Self::Ts),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeTaskMacro {
	pub instruction: Markdown,
	pub language: CodeLanguage,
	pub code: String,
	/// The code of a fenced solution, or markdown when the solution is prose.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub solution: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct McqOption {
	pub text: Markdown,
	pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct McqMacro {
	pub question: Markdown,
	pub options: Vec<McqOption>,
	pub multiple: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GapField {
	pub answers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GapMacro {
	pub fields: Vec<GapField>,
	/// Markdown around the fields. Always one longer than `fields`.
	pub parts: Vec<Markdown>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Task {
	Text(TextTaskMacro),
	Math(MathTaskMacro),
	Code(CodeTaskMacro),
	Mcq(McqMacro),
	Gap(GapMacro),
}

/// A fully built macro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Macro {
	Note(NoteMacro),
	PresenterNote(PresenterNoteMacro),
	Task(Task),
}

/// Everything a builder may read while building one macro.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
	pub document: &'a str,
	pub context: DocumentContext,
	pub scrubbed: &'a str,
	pub blocks: &'a ProtectedBlocks,
	pub locator: Locator<'a>,
	/// Position of the macro among the document's macros, starting at 0.
	pub index: usize,
}

impl BuildContext<'_> {
	/// Restore and normalize a span into markdown.
	pub fn markdown(&self, span: &RawSpan) -> Markdown {
		let restored = self.blocks.restore(&span.text(self.scrubbed));
		Markdown(dedent(&restored).trim().to_string())
	}

	/// The seed used to shuffle the options of this macro.
	pub fn seed(&self) -> String {
		format!("{}#{}", self.document, self.index)
	}

	fn content(&self, node: &MacroNode, part: &str) -> CourseResult<Markdown> {
		let markdown = self.markdown(&node.content);

		if markdown.is_empty() {
			return Err(self.empty(node, part));
		}

		Ok(markdown)
	}

	fn required_slot(&self, node: &MacroNode, slot: &str) -> CourseResult<Markdown> {
		let Some(span) = node.slot(slot) else {
			let (offset, line) = self.locator.locate(node.span.start);
			return Err(CourseError::MissingRequiredSlot {
				document: self.document.to_string(),
				name: node.name().to_string(),
				slot: slot.to_string(),
				offset,
				line,
			});
		};

		let markdown = self.markdown(span);

		if markdown.is_empty() {
			return Err(self.empty(node, &format!("`#{slot}` slot")));
		}

		Ok(markdown)
	}

	fn optional_slot(&self, node: &MacroNode, slot: &str) -> Option<Markdown> {
		node.slot(slot)
			.map(|span| self.markdown(span))
			.filter(|markdown| !markdown.is_empty())
	}

	fn empty(&self, node: &MacroNode, part: &str) -> CourseError {
		let (offset, line) = self.locator.locate(node.span.start);
		CourseError::EmptyMacroContent {
			document: self.document.to_string(),
			name: node.name().to_string(),
			part: part.to_string(),
			offset,
			line,
		}
	}

	fn invalid(&self, node: &MacroNode, reason: impl Into<String>) -> CourseError {
		let (offset, line) = self.locator.locate(node.span.start);
		CourseError::InvalidMacroContent {
			document: self.document.to_string(),
			name: node.name().to_string(),
			reason: reason.into(),
			offset,
			line,
		}
	}
}

pub fn build_note(node: &MacroNode, cx: &BuildContext<'_>) -> CourseResult<Macro> {
	let content = cx.content(node, "content")?;
	Ok(Macro::Note(NoteMacro { content }))
}

pub fn build_presenter_note(node: &MacroNode, cx: &BuildContext<'_>) -> CourseResult<Macro> {
	let content = cx.content(node, "content")?;
	Ok(Macro::PresenterNote(PresenterNoteMacro { content }))
}

pub fn build_text_task(node: &MacroNode, cx: &BuildContext<'_>) -> CourseResult<Macro> {
	let task = TextTaskMacro {
		instruction: cx.content(node, "instruction")?,
		hint: cx.optional_slot(node, "hint"),
		solution: cx.optional_slot(node, "solution"),
	};

	Ok(Macro::Task(Task::Text(task)))
}

pub fn build_math_task(node: &MacroNode, cx: &BuildContext<'_>) -> CourseResult<Macro> {
	let task = MathTaskMacro {
		instruction: cx.content(node, "instruction")?,
		hint: cx.required_slot(node, "hint")?,
		solution: cx.required_slot(node, "solution")?,
	};

	Ok(Macro::Task(Task::Math(task)))
}

pub fn build_code_task(node: &MacroNode, cx: &BuildContext<'_>) -> CourseResult<Macro> {
	let instruction = cx.content(node, "instruction")?;

	cx.required_slot(node, "code")?;
	let code_span = node.slot("code").map(|span| span.text(cx.scrubbed)).unwrap_or_default();
	let Some(block) = cx.blocks.sole_block(&code_span) else {
		return Err(cx.invalid(node, "`#code` must contain exactly one fenced code block"));
	};

	let LiteralKind::Fence { info, .. } = &block.kind else {
		return Err(cx.invalid(node, "`#code` must contain exactly one fenced code block"));
	};

	let language_name = info.split_whitespace().next().unwrap_or_default();
	let Some(language) = CodeLanguage::from_info(language_name) else {
		let (offset, line) = cx.locator.locate(node.span.start);
		return Err(CourseError::UnsupportedLanguage {
			document: cx.document.to_string(),
			name: node.name().to_string(),
			language: language_name.to_string(),
			offset,
			line,
		});
	};

	let code = fence_code(cx.blocks.body(block));
	let solution = node.slot("solution").and_then(|span| {
		let text = span.text(cx.scrubbed);
		match cx.blocks.sole_block(&text) {
			Some(block) if matches!(block.kind, LiteralKind::Fence { .. }) => {
				Some(fence_code(cx.blocks.body(block)))
			}
			_ => {
				let markdown = cx.markdown(span);
				(!markdown.is_empty()).then(|| markdown.into_inner())
			}
		}
	});

	Ok(Macro::Task(Task::Code(CodeTaskMacro {
		instruction,
		language,
		code,
		solution,
	})))
}

pub fn build_mcq(node: &MacroNode, cx: &BuildContext<'_>) -> CourseResult<Macro> {
	let body = node.content.text(cx.scrubbed);
	let mut question_lines = Vec::new();
	let mut options = Vec::new();

	for line in body.lines() {
		match parse_option(line) {
			Some((correct, text)) => {
				options.push(McqOption {
					text: Markdown(cx.blocks.restore(text).trim().to_string()),
					correct,
				});
			}
			None => question_lines.push(line),
		}
	}

	let question = Markdown(
		dedent(&cx.blocks.restore(&question_lines.join("\n")))
			.trim()
			.to_string(),
	);

	if question.is_empty() {
		return Err(cx.empty(node, "question"));
	}

	if options.len() < 2 {
		return Err(cx.invalid(node, "a multiple choice question needs at least two options"));
	}

	if options.iter().any(|option| option.text.is_empty()) {
		return Err(cx.empty(node, "option"));
	}

	let correct = options.iter().filter(|option| option.correct).count();
	if correct == 0 {
		return Err(cx.invalid(node, "mark at least one option as correct with `- [x]`"));
	}

	Ok(Macro::Task(Task::Mcq(McqMacro {
		question,
		options: deterministic_shuffle(&options, &cx.seed()),
		multiple: correct > 1,
	})))
}

pub fn build_gap(node: &MacroNode, cx: &BuildContext<'_>) -> CourseResult<Macro> {
	let body = dedent(&node.content.text(cx.scrubbed));
	let mut fields = Vec::new();
	let mut raw_parts = Vec::new();
	let mut rest = body.as_str();

	while let Some(open) = rest.find("[[") {
		let after = &rest[open + 2..];
		let Some(close) = after.find("]]") else {
			return Err(cx.invalid(node, "unclosed `[[` gap field"));
		};

		let answers: Vec<String> = after[..close]
			.split('|')
			.map(|answer| cx.blocks.restore(answer).trim().to_string())
			.filter(|answer| !answer.is_empty())
			.collect();

		if answers.is_empty() {
			return Err(cx.invalid(node, "every `[[...]]` gap field needs an answer"));
		}

		raw_parts.push(&rest[..open]);
		fields.push(GapField { answers });
		rest = &after[close + 2..];
	}

	raw_parts.push(rest);

	if fields.is_empty() {
		if body.trim().is_empty() {
			return Err(cx.empty(node, "content"));
		}

		return Err(cx.invalid(node, "a gap text needs at least one `[[answer]]` field"));
	}

	let last = raw_parts.len() - 1;
	let parts = raw_parts
		.into_iter()
		.enumerate()
		.map(|(index, part)| {
			let mut part = cx.blocks.restore(part);

			if index == 0 {
				part = part.trim_start().to_string();
			}

			if index == last {
				part = part.trim_end().to_string();
			}

			Markdown(part)
		})
		.collect();

	Ok(Macro::Task(Task::Gap(GapMacro { fields, parts })))
}

/// Parse `- [x] text` / `- [ ] text` into `(correct, text)`.
fn parse_option(line: &str) -> Option<(bool, &str)> {
	let rest = line
		.trim_start()
		.strip_prefix("- ")
		.or_else(|| line.trim_start().strip_prefix("* "))?;

	if let Some(text) = rest.strip_prefix("[x]").or_else(|| rest.strip_prefix("[X]")) {
		return Some((true, text));
	}

	rest.strip_prefix("[ ]").map(|text| (false, text))
}

/// Strip the common leading whitespace of every non-blank line. Leading blank
/// lines are dropped.
pub fn dedent(text: &str) -> String {
	let lines: Vec<&str> = text
		.lines()
		.skip_while(|line| line.trim().is_empty())
		.collect();

	let indent = lines
		.iter()
		.filter(|line| !line.trim().is_empty())
		.map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
		.min()
		.unwrap_or(0);

	lines
		.iter()
		.map(|line| line.get(indent..).unwrap_or_else(|| line.trim_start()))
		.collect::<Vec<_>>()
		.join("\n")
}

/// The code of a fence body, dedented and without its trailing newline.
fn fence_code(body: &str) -> String {
	dedent(body).trim_end_matches(['\n', '\r']).to_string()
}
