use std::path::Path;

use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn coursec_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("coursec"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("COURSEC_LOG");
	cmd
}

pub const CONFIG: &str = r#"
[[courses]]
group = "g"
subject = "math"
course_variant = "v"
title = "Vectors"
topics = [
  { topic = "vectors", chapter = "vectors" },
  { topic = "vectors", chapter = "intro" },
]
current_worksheets = [
  { topic = "vectors", chapter = "intro", worksheet = "ws-1" },
]
"#;

pub fn write(root: &Path, relative: &str, content: &str) -> std::io::Result<()> {
	let path = root.join(relative);

	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent)?;
	}

	std::fs::write(path, content)
}

/// A project whose documents all compile.
pub fn project(root: &Path) -> std::io::Result<()> {
	write(root, "coursec.toml", CONFIG)?;
	write(
		root,
		"content/math/vectors/chapters/website.md",
		"# Vectors\n\nArrows with a length.\n",
	)?;
	write(
		root,
		"content/math/vectors/chapters/intro/website.md",
		"# Introduction\n\n## Aufgaben\n\n#mathTask[\n  Add $(1, 2)$ and $(3, 4)$.\n  #hint{Add \
		 componentwise.}\n  #solution{$(4, 6)$}\n]\n",
	)?;
	write(
		root,
		"content/math/vectors/chapters/intro/worksheets/ws-1.md",
		"# Worksheet 1\n\n## Checkpoint\n\n#textTask[What is a vector?]\n",
	)
}
