mod common;

use coursec_core::AnyEmptyResult;
use predicates::prelude::PredicateBooleanExt;
use serde_json::Value;

#[test]
fn build_writes_all_artifacts() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::project(tmp.path())?;

	common::coursec_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("Compiled 3 document(s)"));

	for path in [
		"generated/math/vectors/vectors.json",
		"generated/math/vectors/intro.json",
		"generated/math/vectors/intro/worksheets/ws-1.json",
		"generated/config/courses.json",
		"generated/navbar.config.json",
		"generated/worksheets.json",
		"scripts/courses.sql",
		"website/courses/g/v/vectors/index.md",
		"website/courses/g/v/vectors/intro.md",
	] {
		assert!(tmp.path().join(path).is_file(), "missing {path}");
	}

	let intro: Value = serde_json::from_str(&std::fs::read_to_string(
		tmp.path().join("generated/math/vectors/intro.json"),
	)?)?;
	assert_eq!(intro["type"], "page");
	assert_eq!(intro["title"], "Introduction");
	assert_eq!(intro["categories"][0]["kind"], "core");
	assert_eq!(
		intro["categories"][0]["items"][0]["tasks"][0]["hint"],
		"Add componentwise."
	);

	Ok(())
}

#[test]
fn build_dry_run_writes_nothing() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::project(tmp.path())?;

	common::coursec_cmd()
		.arg("build")
		.arg("--dry-run")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("would write"));

	assert!(!tmp.path().join("generated").exists());
	assert!(!tmp.path().join("website").exists());

	Ok(())
}

#[test]
fn build_reports_broken_documents_and_keeps_going() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::project(tmp.path())?;
	common::write(
		tmp.path(),
		"content/math/vectors/chapters/intro/website.md",
		"# Introduction\n\n#mathTask[No hint here. #solution{1}]\n",
	)?;

	common::coursec_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(1)
		.stderr(predicates::str::contains("failed: math/vectors/intro"))
		.stderr(predicates::str::contains("coursec::missing_required_slot"));

	assert!(tmp.path().join("generated/math/vectors/vectors.json").is_file());
	assert!(tmp.path().join("generated/config/courses.json").is_file());
	assert!(!tmp.path().join("generated/math/vectors/intro.json").exists());

	Ok(())
}

#[test]
fn check_fails_until_built() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::project(tmp.path())?;

	common::coursec_cmd()
		.arg("check")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(1)
		.stderr(predicates::str::contains("out of date"));

	common::coursec_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	common::coursec_cmd()
		.arg("check")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("up to date"));

	Ok(())
}

#[test]
fn second_build_writes_nothing() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::project(tmp.path())?;

	common::coursec_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	common::coursec_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("0 written").and(predicates::str::contains("wrote").not()));

	Ok(())
}

#[test]
fn missing_config_is_fatal() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::coursec_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(2)
		.stderr(predicates::str::contains("coursec::missing_config"));

	Ok(())
}

#[test]
fn path_collisions_are_fatal() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write(
		tmp.path(),
		"coursec.toml",
		"[[courses]]\ngroup = \"g\"\nsubject = \"math\"\ncourse_variant = \"v\"\ntopics = [\n  { topic \
		 = \"a\", chapter = \"a\" },\n  { topic = \"a\", chapter = \"index\" },\n]\n",
	)?;

	common::coursec_cmd()
		.arg("paths")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(2)
		.stderr(predicates::str::contains("coursec::path_collision"));

	Ok(())
}

#[test]
fn paths_as_json() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::project(tmp.path())?;

	let output = common::coursec_cmd()
		.arg("paths")
		.arg("--format")
		.arg("json")
		.arg("--path")
		.arg(tmp.path())
		.output()?;

	assert!(output.status.success());
	let paths: Value = serde_json::from_slice(&output.stdout)?;
	let targets: Vec<_> = paths
		.as_array()
		.map(|entries| {
			entries
				.iter()
				.filter_map(|entry| entry["target"].as_str())
				.collect()
		})
		.unwrap_or_default();

	assert_eq!(targets, vec![
		"courses/g/v/vectors/index.md",
		"courses/g/v/vectors/intro.md",
		"pdf/g/v/ws-1.pdf",
		"pdf/g/v/ws-1-solution.pdf",
	]);

	Ok(())
}

#[test]
fn paths_as_text() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::project(tmp.path())?;

	common::coursec_cmd()
		.arg("paths")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains(
			"math/vectors/chapters/intro/website.md -> courses/g/v/vectors/intro.md",
		))
		.stdout(predicates::str::contains("pdf-solution"));

	Ok(())
}

#[test]
fn sql_prints_one_upsert_per_course() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::project(tmp.path())?;

	common::coursec_cmd()
		.arg("sql")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains(
			"VALUES ('g-v', 'vectors', 'vectors', NULL) ON CONFLICT (course_id) DO NOTHING;",
		));

	Ok(())
}

#[test]
fn no_color_flag_prints_plain_text() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::project(tmp.path())?;

	common::coursec_cmd()
		.env_remove("NO_COLOR")
		.arg("build")
		.arg("--no-color")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("wrote").and(predicates::str::contains("\u{1b}[").not()));

	Ok(())
}

#[test]
fn missing_subcommand_fails() {
	common::coursec_cmd()
		.assert()
		.code(1)
		.stderr(predicates::str::contains("No subcommand specified"));
}

#[test]
fn nested_presenter_notes_fail_outside_slides() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::project(tmp.path())?;
	common::write(
		tmp.path(),
		"content/math/vectors/chapters/website.md",
		"# Vectors\n\n#textTask[Draw one. #solution{#pn[Show the board.]}]\n",
	)?;

	common::coursec_cmd()
		.arg("build")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(1)
		.stderr(predicates::str::contains("coursec::macro_not_allowed_in_context"));

	Ok(())
}
