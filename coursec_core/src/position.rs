use crate::protect::ProtectedBlocks;

/// Maps offsets in scrubbed text back to the original source so that errors
/// can name the byte offset and line the author actually wrote.
#[derive(Debug, Clone, Copy)]
pub struct Locator<'a> {
	document: &'a str,
	blocks: &'a ProtectedBlocks,
}

impl<'a> Locator<'a> {
	pub fn new(document: &'a str, blocks: &'a ProtectedBlocks) -> Self {
		Self { document, blocks }
	}

	/// The id of the document being located.
	pub fn document(&self) -> &'a str {
		self.document
	}

	/// Translate a scrubbed offset into `(source offset, 1-indexed line)`.
	pub fn locate(&self, scrubbed_offset: usize) -> (usize, usize) {
		let offset = self.blocks.source_offset(scrubbed_offset);
		(offset, line_at(self.blocks.source(), offset))
	}
}

/// 1-indexed line number of the byte `offset` within `source`.
pub fn line_at(source: &str, offset: usize) -> usize {
	let end = offset.min(source.len());
	source.as_bytes()[..end]
		.iter()
		.filter(|byte| **byte == b'\n')
		.count()
		+ 1
}
