use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use coursec_cli::Commands;
use coursec_cli::CoursecCli;
use coursec_cli::OutputFormat;
use coursec_core::AnyError;
use coursec_core::AnyResult;
use coursec_core::BuildOptions;
use coursec_core::BuildReport;
use coursec_core::CourseConfig;
use coursec_core::CourseError;
use coursec_core::Process;
use coursec_core::build_courses;
use coursec_core::build_project;
use coursec_core::courses_sql;
use coursec_core::get_website_file_paths;
use coursec_core::get_worksheet_file_paths;
use owo_colors::OwoColorize;
use owo_colors::Style;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Styles terminal output, falling back to plain text when color is off.
#[derive(Debug, Clone, Copy)]
struct Palette {
	color: bool,
}

impl Palette {
	/// Color is off with `--no-color` or when `NO_COLOR` is set.
	fn detect(args: &CoursecCli) -> Self {
		Self {
			color: !args.no_color && std::env::var_os("NO_COLOR").is_none(),
		}
	}

	fn paint(self, text: impl Display, style: Style) -> String {
		if self.color {
			text.style(style).to_string()
		} else {
			text.to_string()
		}
	}

	fn failure(self, text: impl Display) -> String {
		self.paint(text, Style::new().red())
	}

	fn success(self, text: impl Display) -> String {
		self.paint(text, Style::new().green())
	}

	fn pending(self, text: impl Display) -> String {
		self.paint(text, Style::new().yellow())
	}

	fn strong(self, text: impl Display) -> String {
		self.paint(text, Style::new().bold())
	}
}

fn main() {
	let args = CoursecCli::parse();
	let palette = Palette::detect(&args);

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(palette.color)
				.unicode(palette.color)
				.build(),
		)
	}))
	.ok();

	init_logging(&args, palette.color);

	let code = match run(&args, palette) {
		Ok(true) => 0,
		Ok(false) => 1,
		Err(error) => {
			print_fatal(error, palette);
			2
		}
	};

	process::exit(code);
}

/// Run the selected command. `Ok(false)` means it ran but something failed.
fn run(args: &CoursecCli, palette: Palette) -> AnyResult<bool> {
	match args.command {
		Some(Commands::Build { dry_run }) => run_build(args, palette, dry_run),
		Some(Commands::Check) => run_check(args, palette),
		Some(Commands::Paths { format }) => run_paths(args, format),
		Some(Commands::Sql) => run_sql(args),
		None => {
			eprintln!("No subcommand specified. Run `coursec --help` for usage.");
			Ok(false)
		}
	}
}

/// Course errors render as full diagnostics, anything else as one line.
fn print_fatal(error: AnyError, palette: Palette) {
	match error.downcast::<CourseError>() {
		Ok(error) => eprintln!("{:?}", miette::Report::new(*error)),
		Err(error) => eprintln!("{} {error}", palette.failure("error:")),
	}
}

/// Logs go to stderr. `COURSEC_LOG` takes precedence over `--verbose`.
fn init_logging(args: &CoursecCli, use_color: bool) {
	let default_level = if args.verbose { "debug" } else { "warn" };
	let filter = EnvFilter::try_from_env("COURSEC_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

	tracing_subscriber::registry()
		.with(filter)
		.with(
			tracing_subscriber::fmt::layer()
				.with_writer(std::io::stderr)
				.with_ansi(use_color)
				.with_target(false),
		)
		.try_init()
		.ok();
}

fn resolve_root(args: &CoursecCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn make_relative<'a>(path: &'a Path, root: &Path) -> &'a Path {
	path.strip_prefix(root).unwrap_or(path)
}

fn load_config(root: &Path) -> AnyResult<CourseConfig> {
	let config = CourseConfig::load_required(root)?;
	config.validate()?;
	tracing::debug!(root = %root.display(), courses = config.courses.len(), "validated config");

	Ok(config)
}

/// Print every failure of a build. Returns `true` when there were none.
fn report_failures(report: BuildReport, root: &Path, palette: Palette) -> bool {
	let ok = report.is_ok();

	for failure in report.document_failures {
		eprintln!(
			"{} {} ({})",
			palette.failure("failed:"),
			failure.document,
			make_relative(&failure.source, root).display()
		);
		let diagnostic: miette::Report = failure.error.into();
		eprintln!("{diagnostic:?}");
	}

	for failure in report.emit_failures {
		eprintln!(
			"{} {}: {}",
			palette.failure("failed to write:"),
			make_relative(&failure.path, root).display(),
			failure.error
		);
	}

	ok
}

fn run_build(args: &CoursecCli, palette: Palette, dry_run: bool) -> AnyResult<bool> {
	let root = resolve_root(args);
	let config = load_config(&root)?;
	let report = build_project(&root, &config, &BuildOptions { dry_run })?;

	if args.verbose {
		for id in &report.compiled {
			println!("  compiled {id}");
		}
	}

	for path in &report.written {
		println!("  {} {}", palette.success("wrote"), make_relative(path, &root).display());
	}

	for path in &report.pending {
		println!("  {} {}", palette.pending("would write"), make_relative(path, &root).display());
	}

	let summary = format!(
		"Compiled {} document(s): {} written, {} unchanged, {} failed",
		report.compiled.len(),
		if dry_run { report.pending.len() } else { report.written.len() },
		report.unchanged,
		report.document_failures.len() + report.emit_failures.len()
	);

	println!("{}", palette.strong(summary));

	Ok(report_failures(report, &root, palette))
}

fn run_check(args: &CoursecCli, palette: Palette) -> AnyResult<bool> {
	let root = resolve_root(args);
	let config = load_config(&root)?;
	let report = build_project(&root, &config, &BuildOptions { dry_run: true })?;
	let stale: Vec<PathBuf> = report.pending.clone();
	let compiled = report.compiled.len();

	let ok = report_failures(report, &root, palette);

	if !stale.is_empty() {
		eprintln!(
			"{} {} artifact(s) are out of date. Run `coursec build` to update them.",
			palette.failure("error:"),
			stale.len()
		);

		for path in &stale {
			eprintln!("  {}", make_relative(path, &root).display());
		}

		return Ok(false);
	}

	if ok {
		println!("{} {compiled} document(s) compile and all artifacts are up to date.", palette.success("ok:"));
	}

	Ok(ok)
}

fn run_paths(args: &CoursecCli, format: OutputFormat) -> AnyResult<bool> {
	let root = resolve_root(args);
	let config = load_config(&root)?;
	let mut locations = get_website_file_paths(&config.courses)?;
	locations.extend(get_worksheet_file_paths(&config.courses));

	match format {
		OutputFormat::Json => {
			println!("{}", serde_json::to_string_pretty(&locations)?);
		}
		OutputFormat::Text => {
			for location in &locations {
				let process = match location.process {
					Process::Web => "web",
					Process::Pdf => "pdf",
					Process::PdfSolution => "pdf-solution",
				};
				println!("{process:<13} {} -> {}", location.source, location.target);
			}
		}
	}

	Ok(true)
}

fn run_sql(args: &CoursecCli) -> AnyResult<bool> {
	let root = resolve_root(args);
	let config = load_config(&root)?;
	let courses = build_courses(&config.courses, &BTreeMap::new());

	print!("{}", courses_sql(&courses));

	Ok(true)
}
