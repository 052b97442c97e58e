use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum CourseError {
	#[error(transparent)]
	#[diagnostic(code(coursec::io_error))]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	#[diagnostic(code(coursec::json))]
	Json(#[from] serde_json::Error),

	#[error("{document}:{line}: unterminated {delimiter} starting at byte {offset}")]
	#[diagnostic(
		code(coursec::unterminated_literal),
		help("close the literal or escape the delimiter with a backslash")
	)]
	UnterminatedLiteral {
		document: String,
		delimiter: String,
		offset: usize,
		line: usize,
	},

	#[error("{document}:{line}: undefined macro `#{name}`")]
	#[diagnostic(
		code(coursec::unknown_macro),
		help("known macros: note, pn, textTask, mathTask, codeTask, mcq, gap")
	)]
	UnknownMacro {
		document: String,
		name: String,
		offset: usize,
		line: usize,
	},

	#[error("{document}:{line}: `#{name}` is missing the required `#{slot}{{...}}` slot")]
	#[diagnostic(code(coursec::missing_required_slot))]
	MissingRequiredSlot {
		document: String,
		name: String,
		slot: String,
		offset: usize,
		line: usize,
	},

	#[error("{document}:{line}: `#{name}` is not allowed in a {context} document")]
	#[diagnostic(code(coursec::macro_not_allowed_in_context))]
	MacroNotAllowedInContext {
		document: String,
		name: String,
		context: String,
		offset: usize,
		line: usize,
	},

	#[error("{document}:{line}: unbalanced brackets in `#{name}`")]
	#[diagnostic(
		code(coursec::unbalanced_macro_brackets),
		help("every `[` and `{{` inside a macro needs a matching closer; escape literal ones with `\\`")
	)]
	UnbalancedMacroBrackets {
		document: String,
		name: String,
		offset: usize,
		line: usize,
	},

	#[error("{document}:{line}: `#{name}` has empty {part}")]
	#[diagnostic(code(coursec::empty_macro_content))]
	EmptyMacroContent {
		document: String,
		name: String,
		part: String,
		offset: usize,
		line: usize,
	},

	#[error("{document}:{line}: `#{slot}` is not a slot of {parent}")]
	#[diagnostic(code(coursec::unexpected_slot))]
	UnexpectedSlot {
		document: String,
		slot: String,
		parent: String,
		offset: usize,
		line: usize,
	},

	#[error("{document}:{line}: `#{name}` declares the `#{slot}` slot more than once")]
	#[diagnostic(code(coursec::duplicate_slot))]
	DuplicateSlot {
		document: String,
		name: String,
		slot: String,
		offset: usize,
		line: usize,
	},

	#[error("{document}:{line}: unsupported code language `{language}` in `#{name}`")]
	#[diagnostic(code(coursec::unsupported_language), help("supported languages: ts"))]
	UnsupportedLanguage {
		document: String,
		name: String,
		language: String,
		offset: usize,
		line: usize,
	},

	#[error("{document}:{line}: invalid `#{name}`: {reason}")]
	#[diagnostic(code(coursec::invalid_macro_content))]
	InvalidMacroContent {
		document: String,
		name: String,
		reason: String,
		offset: usize,
		line: usize,
	},

	#[error("macro registry is misconfigured: {0}")]
	#[diagnostic(code(coursec::registry_misconfigured))]
	RegistryMisconfigured(String),

	#[error("target `{target}` is produced by both `{first}` and `{second}`")]
	#[diagnostic(
		code(coursec::path_collision),
		help("each (topic, chapter) pair of a course plan must map to its own file")
	)]
	PathCollision {
		target: String,
		first: String,
		second: String,
	},

	#[error("invalid course plan `{course}`: {reason}")]
	#[diagnostic(code(coursec::invalid_course_plan))]
	InvalidCoursePlan { course: String, reason: String },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(coursec::config_parse),
		help("check that coursec.toml is valid TOML with a [[courses]] table per course")
	)]
	ConfigParse(String),

	#[error("no config file found in `{0}`")]
	#[diagnostic(
		code(coursec::missing_config),
		help("create a coursec.toml (or .coursec.toml / .config/coursec.toml) in the project root")
	)]
	MissingConfig(String),

	#[error("failed to write `{path}`: {reason}")]
	#[diagnostic(code(coursec::emit_io_failure))]
	EmitIoFailure { path: String, reason: String },

	#[error("failed to parse markdown: {0}")]
	#[diagnostic(code(coursec::markdown))]
	Markdown(String),
}

impl CourseError {
	/// Whether this error belongs to a single document rather than the build.
	pub fn is_document_error(&self) -> bool {
		matches!(
			self,
			Self::UnterminatedLiteral { .. }
				| Self::UnknownMacro { .. }
				| Self::MissingRequiredSlot { .. }
				| Self::MacroNotAllowedInContext { .. }
				| Self::UnbalancedMacroBrackets { .. }
				| Self::EmptyMacroContent { .. }
				| Self::UnexpectedSlot { .. }
				| Self::DuplicateSlot { .. }
				| Self::UnsupportedLanguage { .. }
				| Self::InvalidMacroContent { .. }
				| Self::Markdown(_)
		)
	}
}

pub type CourseResult<T> = Result<T, CourseError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
