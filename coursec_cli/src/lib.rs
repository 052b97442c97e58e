use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Compile authored course material into JSON documents, navigation config and SQL seed \
	         scripts.",
	long_about = "coursec compiles course material written in markdown with task macros such as \
	              `#mathTask[...]` or `#mcq[...]` into structured JSON documents.\n\nCourses are \
	              planned in `coursec.toml`. Every planned chapter, slide deck and worksheet is \
	              compiled, then the course config, navbar config and SQL seed script are \
	              emitted. Files are only rewritten when their content changes.\n\nQuick start:\n  \
	              coursec build   Compile everything and write all artifacts\n  coursec check   \
	              Compile everything and report what would change\n  coursec paths   Print the \
	              source and target of every mapped file\n  coursec sql     Print the SQL seed \
	              script"
)]
pub struct CoursecCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Compile every planned document and write all artifacts.
	///
	/// Documents that fail to compile are reported and skipped; every other
	/// document and artifact is still written. Exits with a non-zero status
	/// code if any document or artifact failed.
	Build {
		/// Compile everything but write nothing. Prints the files that would
		/// change.
		#[arg(long, default_value_t = false)]
		dry_run: bool,
	},
	/// Check that every document compiles and all artifacts are up to date.
	///
	/// Runs the full build without writing to disk. Exits with a non-zero
	/// status code if a document fails to compile or any artifact would
	/// change. Ideal for CI pipelines.
	Check,
	/// Print the source and target of every website file and worksheet pdf.
	Paths {
		/// Output format. Use `text` for human-readable output or `json` for
		/// programmatic consumption.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
	/// Print the SQL seed script for the configured courses.
	Sql,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output.
	Text,
	/// JSON output for programmatic consumption.
	Json,
}
