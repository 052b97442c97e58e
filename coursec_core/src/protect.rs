//! Shields literal regions (code and math) from macro scanning.
//!
//! Every literal region of the source is replaced by a placeholder of the form
//! `<open><id><close>`, where `open` and `close` are private-use code points
//! that never occur in the source and `id` increases monotonically. The
//! replaced regions are kept as byte spans into the immutable source buffer,
//! so restoring a span never copies more than the literal itself.

use std::ops::Range;
use std::sync::Arc;

use crate::CourseError;
use crate::CourseResult;
use crate::position::line_at;

const VERBATIM_OPEN: &str = "<!-- verbatim -->";
const VERBATIM_CLOSE: &str = "<!-- /verbatim -->";

/// The kind of literal a protected block shields.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LiteralKind {
	/// A fenced code block. `body` is the byte range of the code between the
	/// fences in the original source.
	Fence { info: String, body: Range<usize> },
	/// An inline code span.
	InlineCode,
	/// A `$$ … $$` display math block.
	DisplayMath,
	/// A `$ … $` inline math span.
	InlineMath,
	/// A region wrapped in `<!-- verbatim -->` markers.
	Verbatim,
}

/// A literal region of the source and the placeholder standing in for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedBlock {
	/// Monotonically increasing id, unique within one document.
	pub id: usize,
	pub kind: LiteralKind,
	/// Byte range of the literal in the original source.
	pub span: Range<usize>,
	/// Byte range of the placeholder in the scrubbed text.
	pub placeholder: Range<usize>,
}

/// The side table of literal replacements for one document.
#[derive(Debug, Clone)]
pub struct ProtectedBlocks {
	source: Arc<str>,
	open: char,
	close: char,
	blocks: Vec<ProtectedBlock>,
}

/// The result of [`extract`].
#[derive(Debug, Clone)]
pub struct Extraction {
	/// The source with every literal region replaced by its placeholder.
	pub scrubbed: String,
	pub blocks: ProtectedBlocks,
}

impl ProtectedBlocks {
	/// The original, unmodified source text.
	pub fn source(&self) -> &str {
		&self.source
	}

	pub fn len(&self) -> usize {
		self.blocks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.blocks.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &ProtectedBlock> {
		self.blocks.iter()
	}

	pub fn get(&self, id: usize) -> Option<&ProtectedBlock> {
		self.blocks.get(id)
	}

	/// The placeholder token used for the block with the given id.
	pub fn placeholder(&self, id: usize) -> String {
		format!("{}{id}{}", self.open, self.close)
	}

	/// The literal text shielded by `block`.
	pub fn literal(&self, block: &ProtectedBlock) -> &str {
		&self.source[block.span.clone()]
	}

	/// The code between the fences of a fenced block, or the full literal for
	/// every other kind.
	pub fn body(&self, block: &ProtectedBlock) -> &str {
		match &block.kind {
			LiteralKind::Fence { body, .. } => &self.source[body.clone()],
			LiteralKind::InlineCode
			| LiteralKind::DisplayMath
			| LiteralKind::InlineMath
			| LiteralKind::Verbatim => self.literal(block),
		}
	}

	/// Replace every placeholder in `text` with the literal it stands for.
	pub fn restore(&self, text: &str) -> String {
		let mut restored = String::with_capacity(text.len());
		let mut rest = text;

		while let Some(position) = rest.find(self.open) {
			restored.push_str(&rest[..position]);
			let after = &rest[position + self.open.len_utf8()..];

			if let Some((block, consumed)) = self.parse_placeholder(after) {
				restored.push_str(self.literal(block));
				rest = &after[consumed..];
			} else {
				restored.push(self.open);
				rest = after;
			}
		}

		restored.push_str(rest);
		restored
	}

	/// If `text` (ignoring surrounding whitespace) is exactly one placeholder,
	/// return the block it stands for.
	pub fn sole_block(&self, text: &str) -> Option<&ProtectedBlock> {
		let inner = text.trim().strip_prefix(self.open)?;
		let (block, consumed) = self.parse_placeholder(inner)?;
		(consumed == inner.len()).then_some(block)
	}

	/// Translate an offset in the scrubbed text into an offset in the source.
	/// Offsets inside a placeholder map to the start of its literal.
	pub fn source_offset(&self, scrubbed_offset: usize) -> usize {
		let mut delta: isize = 0;

		for block in &self.blocks {
			if block.placeholder.start >= scrubbed_offset {
				break;
			}

			if scrubbed_offset < block.placeholder.end {
				return block.span.start;
			}

			delta += block.span.len() as isize - block.placeholder.len() as isize;
		}

		(scrubbed_offset as isize + delta) as usize
	}

	/// Parse `<id><close>` at the start of `text`, returning the block and the
	/// number of bytes consumed.
	fn parse_placeholder(&self, text: &str) -> Option<(&ProtectedBlock, usize)> {
		let digits = text
			.find(|ch: char| !ch.is_ascii_digit())
			.unwrap_or(text.len());

		if digits == 0 || !text[digits..].starts_with(self.close) {
			return None;
		}

		let id: usize = text[..digits].parse().ok()?;
		let block = self.blocks.get(id)?;

		Some((block, digits + self.close.len_utf8()))
	}
}

/// Replace every literal region of `source` with a placeholder.
///
/// `document` names the document in error reports.
pub fn extract(document: &str, source: impl Into<Arc<str>>) -> CourseResult<Extraction> {
	let source: Arc<str> = source.into();
	let (open, close) = pick_sentinels(&source).ok_or_else(|| {
		CourseError::Markdown(format!(
			"{document}: no private-use code points left for placeholders"
		))
	})?;

	let mut extractor = Extractor {
		document,
		source: &source,
		bytes: source.as_bytes(),
		cursor: 0,
		copied: 0,
		scrubbed: String::with_capacity(source.len()),
		blocks: Vec::new(),
		open,
		close,
	};
	extractor.run()?;

	let Extractor {
		scrubbed, blocks, ..
	} = extractor;

	Ok(Extraction {
		scrubbed,
		blocks: ProtectedBlocks {
			source: source.clone(),
			open,
			close,
			blocks,
		},
	})
}

/// Restore all placeholders in `text`. Shorthand for
/// [`ProtectedBlocks::restore`].
pub fn restore(text: &str, blocks: &ProtectedBlocks) -> String {
	blocks.restore(text)
}

/// Find a pair of adjacent private-use code points that never occur in
/// `source`.
fn pick_sentinels(source: &str) -> Option<(char, char)> {
	(0xE000_u32..0xF8FE)
		.step_by(2)
		.chain((0xF_0000_u32..0xF_FFFC).step_by(2))
		.filter_map(|code| Some((char::from_u32(code)?, char::from_u32(code + 1)?)))
		.find(|(open, close)| !source.contains(*open) && !source.contains(*close))
}

struct Extractor<'a> {
	document: &'a str,
	source: &'a str,
	bytes: &'a [u8],
	cursor: usize,
	/// Everything before this offset has been copied into `scrubbed`.
	copied: usize,
	scrubbed: String,
	blocks: Vec<ProtectedBlock>,
	open: char,
	close: char,
}

impl Extractor<'_> {
	fn run(&mut self) -> CourseResult<()> {
		while self.cursor < self.bytes.len() {
			let at_line_start = self.cursor == 0 || self.bytes[self.cursor - 1] == b'\n';

			if at_line_start && self.fence()? {
				continue;
			}

			match self.bytes[self.cursor] {
				b'\\' => self.cursor += 2,
				b'<' if self.source[self.cursor..].starts_with(VERBATIM_OPEN) => self.verbatim()?,
				b'$' if self.bytes.get(self.cursor + 1) == Some(&b'$') => self.display_math()?,
				b'$' => self.inline_math()?,
				b'`' => self.inline_code()?,
				_ => self.cursor += 1,
			}
		}

		self.scrubbed.push_str(&self.source[self.copied..]);
		self.copied = self.source.len();
		Ok(())
	}

	/// Try to read a fenced code block starting on the current line. Returns
	/// `false` when the line does not open a fence.
	fn fence(&mut self) -> CourseResult<bool> {
		let line_end = self.line_end(self.cursor);
		let line = &self.source[self.cursor..line_end];
		let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
		let start = self.cursor + indent;

		let Some(marker) = self.bytes.get(start).copied() else {
			return Ok(false);
		};

		if marker != b'`' && marker != b'~' {
			return Ok(false);
		}

		let run = run_length(&self.bytes[start..line_end], marker);
		if run < 3 {
			return Ok(false);
		}

		let info = self.source[start + run..line_end].trim().to_string();
		if marker == b'`' && info.contains('`') {
			return Ok(false);
		}

		let body_start = (line_end + 1).min(self.source.len());
		let mut line_start = body_start;

		while line_start < self.source.len() {
			let next_end = self.line_end(line_start);
			let candidate = self.source[line_start..next_end].trim_start_matches([' ', '\t']);
			let closing_run = run_length(candidate.as_bytes(), marker);

			if closing_run >= run && candidate[closing_run..].trim().is_empty() {
				let kind = LiteralKind::Fence {
					info,
					body: body_start..line_start,
				};
				self.protect(start, next_end, kind);
				return Ok(true);
			}

			line_start = next_end + 1;
		}

		Err(self.unterminated("code fence", start))
	}

	fn verbatim(&mut self) -> CourseResult<()> {
		let start = self.cursor;
		let search_from = start + VERBATIM_OPEN.len();
		let Some(position) = self.source[search_from..].find(VERBATIM_CLOSE) else {
			return Err(self.unterminated("verbatim region", start));
		};

		let end = search_from + position + VERBATIM_CLOSE.len();
		self.protect(start, end, LiteralKind::Verbatim);
		Ok(())
	}

	fn display_math(&mut self) -> CourseResult<()> {
		let start = self.cursor;
		let search_from = start + 2;
		let Some(position) = self.source[search_from..].find("$$") else {
			return Err(self.unterminated("display math", start));
		};

		self.protect(start, search_from + position + 2, LiteralKind::DisplayMath);
		Ok(())
	}

	fn inline_math(&mut self) -> CourseResult<()> {
		let start = self.cursor;
		let mut index = start + 1;

		while index < self.bytes.len() {
			match self.bytes[index] {
				b'\\' => index += 2,
				b'\n' => break,
				b'$' => {
					self.protect(start, index + 1, LiteralKind::InlineMath);
					return Ok(());
				}
				_ => index += 1,
			}
		}

		Err(self.unterminated("inline math", start))
	}

	fn inline_code(&mut self) -> CourseResult<()> {
		let start = self.cursor;
		let run = run_length(&self.bytes[start..], b'`');
		let mut index = start + run;

		while let Some(position) = memchr(&self.bytes[index..], b'`') {
			let closing = index + position;
			let closing_run = run_length(&self.bytes[closing..], b'`');

			if closing_run == run {
				self.protect(start, closing + closing_run, LiteralKind::InlineCode);
				return Ok(());
			}

			index = closing + closing_run;
		}

		Err(self.unterminated("inline code", start))
	}

	fn protect(&mut self, start: usize, end: usize, kind: LiteralKind) {
		self.scrubbed.push_str(&self.source[self.copied..start]);

		let id = self.blocks.len();
		let placeholder_start = self.scrubbed.len();
		self.scrubbed.push(self.open);
		self.scrubbed.push_str(&id.to_string());
		self.scrubbed.push(self.close);

		self.blocks.push(ProtectedBlock {
			id,
			kind,
			span: start..end,
			placeholder: placeholder_start..self.scrubbed.len(),
		});

		self.copied = end;
		self.cursor = end;
	}

	fn line_end(&self, from: usize) -> usize {
		memchr(&self.bytes[from..], b'\n').map_or(self.bytes.len(), |position| from + position)
	}

	fn unterminated(&self, delimiter: &str, offset: usize) -> CourseError {
		CourseError::UnterminatedLiteral {
			document: self.document.to_string(),
			delimiter: delimiter.to_string(),
			offset,
			line: line_at(self.source, offset),
		}
	}
}

fn run_length(bytes: &[u8], marker: u8) -> usize {
	bytes.iter().take_while(|byte| **byte == marker).count()
}

fn memchr(haystack: &[u8], needle: u8) -> Option<usize> {
	haystack.iter().position(|byte| *byte == needle)
}
