use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::CourseError;
use crate::CourseResult;
use crate::course::CoursePlan;
use crate::course::validate_plans;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["coursec.toml", ".coursec.toml", ".config/coursec.toml"];

/// Configuration loaded from a `coursec.toml` file.
///
/// ```toml
/// [paths]
/// content = "content"
/// generated = "src/generated"
/// scripts = "scripts"
/// website = "src/routes"
///
/// [build]
/// threads = 4
/// slides = true
/// publish_website = true
///
/// [[courses]]
/// group = "gym"
/// subject = "math"
/// course_variant = "gym-10a"
/// topics = [{ topic = "vectors", chapter = "vectors" }]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseConfig {
	#[serde(default)]
	pub paths: PathsConfig,
	#[serde(default)]
	pub build: BuildConfig,
	#[serde(default)]
	pub courses: Vec<CoursePlan>,
}

/// Directories relative to the project root.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
	/// Authored markup, laid out as `subject/topic/chapters/...`.
	#[serde(default = "default_content")]
	pub content: PathBuf,
	/// Compiled JSON documents and the course and navbar config.
	#[serde(default = "default_generated")]
	pub generated: PathBuf,
	/// The SQL seed script.
	#[serde(default = "default_scripts")]
	pub scripts: PathBuf,
	/// Where website sources are published.
	#[serde(default = "default_website")]
	pub website: PathBuf,
}

impl Default for PathsConfig {
	fn default() -> Self {
		Self {
			content: default_content(),
			generated: default_generated(),
			scripts: default_scripts(),
			website: default_website(),
		}
	}
}

fn default_content() -> PathBuf {
	PathBuf::from("content")
}

fn default_generated() -> PathBuf {
	PathBuf::from("generated")
}

fn default_scripts() -> PathBuf {
	PathBuf::from("scripts")
}

fn default_website() -> PathBuf {
	PathBuf::from("website")
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
	/// Size of the compile pool. Defaults to one thread per core.
	#[serde(default)]
	pub threads: Option<usize>,
	/// Compile `slides.md` next to each chapter when it exists.
	#[serde(default = "default_true")]
	pub slides: bool,
	/// Copy website sources to their targets under `paths.website`.
	#[serde(default = "default_true")]
	pub publish_website: bool,
}

impl Default for BuildConfig {
	fn default() -> Self {
		Self {
			threads: None,
			slides: true,
			publish_website: true,
		}
	}
}

fn default_true() -> bool {
	true
}

impl CourseConfig {
	/// Returns the first existing config file path in discovery order.
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if the file does not exist.
	pub fn load(root: &Path) -> CourseResult<Option<CourseConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		let config = Self::parse(&content)?;
		tracing::debug!(path = %config_path.display(), courses = config.courses.len(), "loaded config");

		Ok(Some(config))
	}

	/// Like [`CourseConfig::load`] but a missing file is an error.
	pub fn load_required(root: &Path) -> CourseResult<CourseConfig> {
		Self::load(root)?.ok_or_else(|| CourseError::MissingConfig(root.display().to_string()))
	}

	pub fn parse(content: &str) -> CourseResult<CourseConfig> {
		toml::from_str(content).map_err(|e| CourseError::ConfigParse(e.to_string()))
	}

	/// Validate every course plan.
	pub fn validate(&self) -> CourseResult<()> {
		if self.build.threads == Some(0) {
			return Err(CourseError::ConfigParse(
				"`build.threads` must be at least 1".to_string(),
			));
		}

		validate_plans(&self.courses)
	}

	pub fn content_dir(&self, root: &Path) -> PathBuf {
		root.join(&self.paths.content)
	}

	pub fn generated_dir(&self, root: &Path) -> PathBuf {
		root.join(&self.paths.generated)
	}

	pub fn scripts_dir(&self, root: &Path) -> PathBuf {
		root.join(&self.paths.scripts)
	}

	pub fn website_dir(&self, root: &Path) -> PathBuf {
		root.join(&self.paths.website)
	}
}
