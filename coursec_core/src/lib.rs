//! `coursec_core` compiles authored course material into structured JSON
//! documents, course and navigation config, and SQL seed data. Course
//! material is markdown extended with macros such as `#mathTask[...]`,
//! `#mcq[...]` or `#note[...]`.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Source document
//!   -> Protected-block extractor (code and math become placeholders)
//!   -> Lexer + dispatcher (macros are matched against the registry and built)
//!   -> Tree builder (headings group prose and tasks into categories or slides)
//!   -> Emitter (per-document JSON)
//!
//! Course plans
//!   -> Folder mapper (source and target paths, collision checks)
//!   -> Course registry (courses with chapter labels)
//!   -> Emitter (courses.json, navbar.config.json, courses.sql, worksheets.json)
//! ```
//!
//! ## Modules
//!
//! - [`protect`] shields fenced code, inline code, math and verbatim regions
//!   from macro scanning.
//! - [`registry`] holds the closed set of macros, their slots and the document
//!   contexts they are legal in.
//! - [`tree`] groups a parsed document into categories, task sets and slides.
//! - [`course`] maps course plans to source and target paths and builds the
//!   course registry.
//! - [`emit`] writes artifacts, only touching files whose bytes change.
//! - [`build`] runs the whole pipeline on a worker pool.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coursec_core::BuildOptions;
//! use coursec_core::CourseConfig;
//! use coursec_core::build_project;
//! use std::path::Path;
//!
//! let root = Path::new(".");
//! let config = CourseConfig::load_required(root).unwrap();
//! let report = build_project(root, &config, &BuildOptions::default()).unwrap();
//!
//! if !report.is_ok() {
//!     eprintln!("{} document(s) failed", report.document_failures.len());
//! }
//! ```

pub use build::*;
pub use config::*;
pub use course::*;
pub use emit::*;
pub use error::*;
pub use macros::*;
pub use parser::*;
pub use position::*;
pub use protect::*;
pub use registry::*;
pub use shuffle::*;
pub use tree::*;

pub mod build;
pub mod config;
pub mod course;
pub mod emit;
#[allow(unused_assignments)]
mod error;
pub(crate) mod lexer;
mod macros;
mod parser;
mod position;
pub mod protect;
pub mod registry;
mod shuffle;
pub mod tree;

#[cfg(test)]
mod __fixtures;
