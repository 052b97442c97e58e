use std::ops::Range;

use logos::Logos;

/// Flat tokens of scrubbed markup. Only the delimiters that matter to macro
/// dispatch are distinguished; everything else is `Text`.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
	/// `#name[`
	#[regex(r"#[A-Za-z][A-Za-z0-9_]*\[")]
	BlockOpen,
	/// `#name{`
	#[regex(r"#[A-Za-z][A-Za-z0-9_]*\{")]
	SlotOpen,
	#[token("[")]
	BracketOpen,
	#[token("]")]
	BracketClose,
	#[token("{")]
	BraceOpen,
	#[token("}")]
	BraceClose,
	/// `\[`, `\]`, `\{`, `\}`, `\#` or `\\`
	#[regex(r"\\[\[\]{}#\\]")]
	Escaped,
	#[token("#")]
	Hash,
	#[token("\\")]
	Backslash,
	#[regex(r"[^#\[\]{}\\]+")]
	Text,
}

/// A token and its byte span in the scrubbed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
	pub token: Token,
	pub span: Range<usize>,
}

impl Lexeme {
	/// The macro or slot name of a `BlockOpen` / `SlotOpen` lexeme.
	pub fn name<'a>(&self, text: &'a str) -> &'a str {
		&text[self.span.start + 1..self.span.end - 1]
	}
}

/// Tokenize scrubbed text. Unrecognized input is treated as text.
pub fn tokenize(text: &str) -> Vec<Lexeme> {
	Token::lexer(text)
		.spanned()
		.map(|(result, span)| {
			Lexeme {
				token: result.unwrap_or(Token::Text),
				span,
			}
		})
		.collect()
}
