use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use crate::CourseError;
use crate::CourseResult;
use crate::DocumentContext;
use crate::MacroDescriptor;
use crate::MacroKind;
use crate::MacroRegistry;
use crate::lexer::Lexeme;
use crate::lexer::Token;
use crate::lexer::tokenize;
use crate::macros::BuildContext;
use crate::macros::Macro;
use crate::position::Locator;
use crate::protect::Extraction;
use crate::protect::ProtectedBlocks;
use crate::protect::extract;

/// A piece of a macro body or slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanPiece {
	/// A byte range of the scrubbed text. May still contain placeholders.
	Scrubbed(Range<usize>),
	/// The restored markdown a nested macro leaves in its parent.
	Nested(String),
}

/// An ordered list of pieces making up a macro body or slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSpan {
	pub pieces: Vec<SpanPiece>,
}

impl RawSpan {
	pub fn new(pieces: Vec<SpanPiece>) -> Self {
		Self { pieces }
	}

	/// Concatenate the pieces. Scrubbed pieces keep their placeholders.
	pub fn text(&self, scrubbed: &str) -> String {
		self.pieces
			.iter()
			.map(|piece| {
				match piece {
					SpanPiece::Scrubbed(range) => &scrubbed[range.clone()],
					SpanPiece::Nested(text) => text.as_str(),
				}
			})
			.collect()
	}
}

/// A dispatched macro before its type-specific builder has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroNode {
	pub kind: MacroKind,
	/// The extent of the whole macro in the scrubbed text, `#` to closer.
	pub span: Range<usize>,
	/// The macro body without its inline slots.
	pub content: RawSpan,
	pub inline_macros: BTreeMap<String, RawSpan>,
}

impl MacroNode {
	pub fn name(&self) -> &'static str {
		self.kind.tag()
	}

	pub fn slot(&self, name: &str) -> Option<&RawSpan> {
		self.inline_macros.get(name)
	}
}

/// A top-level piece of a parsed document.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedSegment {
	/// Prose between macros, as a range of the scrubbed text.
	Prose(Range<usize>),
	Macro { span: Range<usize>, r#macro: Macro },
}

/// The output of [`parse_document`].
#[derive(Debug, Clone)]
pub struct ParsedDocument {
	pub document: String,
	/// The context the document was parsed for.
	pub context: DocumentContext,
	pub scrubbed: String,
	pub blocks: ProtectedBlocks,
	pub segments: Vec<ParsedSegment>,
}

impl ParsedDocument {
	/// The restored text of a prose segment.
	pub fn prose(&self, range: &Range<usize>) -> String {
		self.blocks.restore(&self.scrubbed[range.clone()])
	}

	/// Translate a scrubbed offset into `(source offset, line)`.
	pub fn locate(&self, scrubbed_offset: usize) -> (usize, usize) {
		Locator::new(&self.document, &self.blocks).locate(scrubbed_offset)
	}
}

/// Extract literals, dispatch every top-level macro and build it. Macros
/// nested in another macro are dispatched the same way. Nested notes are
/// inlined into their parent, any other nested macro follows its parent as a
/// sibling segment.
pub fn parse_document(
	document: &str,
	context: DocumentContext,
	source: impl Into<Arc<str>>,
	registry: &MacroRegistry,
) -> CourseResult<ParsedDocument> {
	let Extraction { scrubbed, blocks } = extract(document, source)?;
	let lexemes = tokenize(&scrubbed);
	let mut dispatcher = Dispatcher {
		document,
		context,
		scrubbed: &scrubbed,
		blocks: &blocks,
		lexemes: &lexemes,
		locator: Locator::new(document, &blocks),
		registry,
		built: 0,
		hoisted: Vec::new(),
	};

	let mut segments = Vec::new();
	let mut prose_start = 0;
	let mut cursor = 0;

	while let Some(lexeme) = lexemes.get(cursor) {
		match lexeme.token {
			Token::BlockOpen => {
				let name = lexeme.name(&scrubbed);
				let Some(descriptor) = registry.get(name) else {
					return Err(if registry.is_slot_name(name) {
						dispatcher.unexpected_slot(name, "the document", lexeme.span.start)
					} else {
						dispatcher.unknown_macro(name, lexeme.span.start)
					});
				};

				let (built, span, next) = dispatcher.dispatch(cursor, descriptor)?;

				if prose_start < span.start {
					segments.push(ParsedSegment::Prose(prose_start..span.start));
				}

				prose_start = span.end;
				segments.push(ParsedSegment::Macro {
					span: span.clone(),
					r#macro: built,
				});

				for r#macro in dispatcher.hoisted.drain(..) {
					segments.push(ParsedSegment::Macro {
						span: span.clone(),
						r#macro,
					});
				}

				cursor = next;
			}
			Token::SlotOpen => {
				let name = lexeme.name(&scrubbed);
				return Err(dispatcher.unexpected_slot(name, "the document", lexeme.span.start));
			}
			_ => cursor += 1,
		}
	}

	if prose_start < scrubbed.len() {
		segments.push(ParsedSegment::Prose(prose_start..scrubbed.len()));
	}

	tracing::trace!(document, macros = dispatcher.built, "parsed document");

	Ok(ParsedDocument {
		document: document.to_string(),
		context,
		scrubbed,
		blocks,
		segments,
	})
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
	Bracket,
	Brace,
}

#[derive(Debug)]
struct Frame<'a> {
	delimiter: Delimiter,
	/// Set when this frame is an inline slot of the macro being read.
	slot: Option<OpenSlot<'a>>,
}

#[derive(Debug)]
struct OpenSlot<'a> {
	name: &'a str,
	/// Offset of the `#` that opened the slot.
	start: usize,
	content_start: usize,
}

/// A region cut out of a macro body. Slots leave nothing behind, nested
/// macros leave their rendered markdown.
#[derive(Debug)]
struct Cut {
	extent: Range<usize>,
	text: Option<String>,
}

struct Dispatcher<'a> {
	document: &'a str,
	context: DocumentContext,
	scrubbed: &'a str,
	blocks: &'a ProtectedBlocks,
	lexemes: &'a [Lexeme],
	locator: Locator<'a>,
	registry: &'a MacroRegistry,
	/// Macros built so far. Each build takes the next index as its shuffle seed.
	built: usize,
	/// Nested macros moved out of their parent, in the order they close.
	hoisted: Vec<Macro>,
}

impl<'a> Dispatcher<'a> {
	/// Check, read and build the macro opened by the lexeme at `start`.
	/// Returns the macro, its extent and the index of the first lexeme after it.
	fn dispatch(
		&mut self,
		start: usize,
		descriptor: &MacroDescriptor,
	) -> CourseResult<(Macro, Range<usize>, usize)> {
		let lexemes = self.lexemes;
		let open = &lexemes[start];

		if !descriptor.allows(self.context) {
			let (offset, line) = self.locator.locate(open.span.start);
			return Err(CourseError::MacroNotAllowedInContext {
				document: self.document.to_string(),
				name: descriptor.tag().to_string(),
				context: self.context.to_string(),
				offset,
				line,
			});
		}

		let (node, next) = self.read_macro(start, descriptor)?;
		self.check_required_slots(&node, descriptor)?;

		let build_context = BuildContext {
			document: self.document,
			context: self.context,
			scrubbed: self.scrubbed,
			blocks: self.blocks,
			locator: self.locator,
			index: self.built,
		};
		let built = (node.kind.builder())(&node, &build_context)?;
		self.built += 1;

		Ok((built, node.span, next))
	}

	/// The markdown a nested macro leaves in its parent.
	fn nest(&mut self, built: Macro) -> String {
		match built {
			Macro::Note(note) => note.content.into_inner(),
			other => {
				self.hoisted.push(other);
				String::new()
			}
		}
	}

	/// Read the macro opened by the lexeme at `start`. Returns the node and
	/// the index of the first lexeme after it.
	fn read_macro(
		&mut self,
		start: usize,
		descriptor: &MacroDescriptor,
	) -> CourseResult<(MacroNode, usize)> {
		let lexemes = self.lexemes;
		let scrubbed = self.scrubbed;
		let registry = self.registry;
		let open = &lexemes[start];
		let body_start = open.span.end;
		let mut stack = vec![Frame {
			delimiter: Delimiter::Bracket,
			slot: None,
		}];
		let mut inline_macros: BTreeMap<String, RawSpan> = BTreeMap::new();
		let mut cuts: Vec<Cut> = Vec::new();
		let mut cursor = start + 1;

		while let Some(lexeme) = lexemes.get(cursor) {
			cursor += 1;

			let delimiter = match lexeme.token {
				Token::BracketOpen => {
					stack.push(Frame {
						delimiter: Delimiter::Bracket,
						slot: None,
					});
					continue;
				}
				Token::BraceOpen => {
					stack.push(Frame {
						delimiter: Delimiter::Brace,
						slot: None,
					});
					continue;
				}
				Token::BlockOpen | Token::SlotOpen => {
					let name = lexeme.name(scrubbed);
					let delimiter = if lexeme.token == Token::BlockOpen {
						Delimiter::Bracket
					} else {
						Delimiter::Brace
					};

					let is_direct_slot = stack.len() == 1 && descriptor.slot(name).is_some();

					if is_direct_slot {
						if inline_macros.contains_key(name) {
							let (offset, line) = self.locator.locate(lexeme.span.start);
							return Err(CourseError::DuplicateSlot {
								document: self.document.to_string(),
								name: descriptor.tag().to_string(),
								slot: name.to_string(),
								offset,
								line,
							});
						}

						stack.push(Frame {
							delimiter,
							slot: Some(OpenSlot {
								name,
								start: lexeme.span.start,
								content_start: lexeme.span.end,
							}),
						});
						continue;
					}

					let nested = match lexeme.token {
						Token::BlockOpen => registry.get(name),
						_ => None,
					};

					if let Some(inner) = nested {
						let (built, extent, next) = self.dispatch(cursor - 1, inner)?;
						let text = self.nest(built);
						cuts.push(Cut {
							extent,
							text: Some(text),
						});
						cursor = next;
						continue;
					}

					if registry.is_slot_name(name)
						|| registry.get(name).is_some()
						|| descriptor.slot(name).is_some()
					{
						let parent = format!("`#{}`", descriptor.tag());
						return Err(self.unexpected_slot(name, &parent, lexeme.span.start));
					}

					return Err(self.unknown_macro(name, lexeme.span.start));
				}
				Token::BracketClose => Delimiter::Bracket,
				Token::BraceClose => Delimiter::Brace,
				Token::Escaped | Token::Hash | Token::Backslash | Token::Text => continue,
			};

			let Some(frame) = stack.pop() else {
				return Err(self.unbalanced(descriptor, lexeme.span.start));
			};

			if frame.delimiter != delimiter {
				return Err(self.unbalanced(descriptor, lexeme.span.start));
			}

			if let Some(slot) = frame.slot {
				inline_macros.insert(
					slot.name.to_string(),
					RawSpan::new(pieces(slot.content_start..lexeme.span.start, &cuts)),
				);
				cuts.push(Cut {
					extent: slot.start..lexeme.span.end,
					text: None,
				});
			}

			if stack.is_empty() {
				let node = MacroNode {
					kind: descriptor.kind,
					span: open.span.start..lexeme.span.end,
					content: RawSpan::new(pieces(body_start..lexeme.span.start, &cuts)),
					inline_macros,
				};

				return Ok((node, cursor));
			}
		}

		Err(self.unbalanced(descriptor, open.span.start))
	}

	fn check_required_slots(
		&self,
		node: &MacroNode,
		descriptor: &MacroDescriptor,
	) -> CourseResult<()> {
		for slot in descriptor.required_slots() {
			if !node.inline_macros.contains_key(slot.name) {
				let (offset, line) = self.locator.locate(node.span.start);
				return Err(CourseError::MissingRequiredSlot {
					document: self.locator.document().to_string(),
					name: node.name().to_string(),
					slot: slot.name.to_string(),
					offset,
					line,
				});
			}
		}

		Ok(())
	}

	fn unknown_macro(&self, name: &str, scrubbed_offset: usize) -> CourseError {
		let (offset, line) = self.locator.locate(scrubbed_offset);
		CourseError::UnknownMacro {
			document: self.locator.document().to_string(),
			name: name.to_string(),
			offset,
			line,
		}
	}

	fn unexpected_slot(&self, slot: &str, parent: &str, scrubbed_offset: usize) -> CourseError {
		let (offset, line) = self.locator.locate(scrubbed_offset);
		CourseError::UnexpectedSlot {
			document: self.locator.document().to_string(),
			slot: slot.to_string(),
			parent: parent.to_string(),
			offset,
			line,
		}
	}

	fn unbalanced(&self, descriptor: &MacroDescriptor, scrubbed_offset: usize) -> CourseError {
		let (offset, line) = self.locator.locate(scrubbed_offset);
		CourseError::UnbalancedMacroBrackets {
			document: self.locator.document().to_string(),
			name: descriptor.tag().to_string(),
			offset,
			line,
		}
	}
}

/// `range` with every cut inside it replaced by the cut's text. Cuts lying
/// inside an earlier cut are already part of it.
fn pieces(range: Range<usize>, cuts: &[Cut]) -> Vec<SpanPiece> {
	let mut inside: Vec<&Cut> = cuts
		.iter()
		.filter(|cut| range.start <= cut.extent.start && cut.extent.end <= range.end)
		.collect();
	inside.sort_by_key(|cut| cut.extent.start);

	let mut pieces = Vec::new();
	let mut from = range.start;

	for cut in inside {
		if cut.extent.start < from {
			continue;
		}

		if cut.extent.start > from {
			pieces.push(SpanPiece::Scrubbed(from..cut.extent.start));
		}

		if let Some(text) = cut.text.as_ref().filter(|text| !text.is_empty()) {
			pieces.push(SpanPiece::Nested(text.clone()));
		}

		from = cut.extent.end;
	}

	if from < range.end {
		pieces.push(SpanPiece::Scrubbed(from..range.end));
	}

	pieces
}
