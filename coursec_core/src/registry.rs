use std::collections::BTreeMap;
use std::collections::BTreeSet;

use derive_more::Display;
use serde::Deserialize;
use serde::Serialize;

use crate::CourseError;
use crate::CourseResult;
use crate::macros::BuildContext;
use crate::macros::Macro;
use crate::macros::build_code_task;
use crate::macros::build_gap;
use crate::macros::build_math_task;
use crate::macros::build_mcq;
use crate::macros::build_note;
use crate::macros::build_presenter_note;
use crate::macros::build_text_task;
use crate::parser::MacroNode;

/// The kind of document being compiled. Gates which macros are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentContext {
	#[display("page")]
	Page,
	#[display("slides")]
	Slides,
	#[display("worksheet")]
	Worksheet,
}

/// An inline slot a macro accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSpec {
	pub name: &'static str,
	pub required: bool,
}

impl SlotSpec {
	pub const fn required(name: &'static str) -> Self {
		Self {
			name,
			required: true,
		}
	}

	pub const fn optional(name: &'static str) -> Self {
		Self {
			name,
			required: false,
		}
	}
}

/// Turns a dispatched macro node into its typed form.
pub type MacroBuilder = fn(&MacroNode, &BuildContext<'_>) -> CourseResult<Macro>;

/// The closed set of macros the compiler understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MacroKind {
	Note,
	PresenterNote,
	TextTask,
	MathTask,
	CodeTask,
	Mcq,
	Gap,
}

const NO_SLOTS: &[SlotSpec] = &[];
const TEXT_TASK_SLOTS: &[SlotSpec] = &[SlotSpec::optional("hint"), SlotSpec::optional("solution")];
const MATH_TASK_SLOTS: &[SlotSpec] = &[SlotSpec::required("hint"), SlotSpec::required("solution")];
const CODE_TASK_SLOTS: &[SlotSpec] = &[SlotSpec::required("code"), SlotSpec::optional("solution")];
const ALL_CONTEXTS: &[DocumentContext] = &[];
const SLIDES_ONLY: &[DocumentContext] = &[DocumentContext::Slides];

impl MacroKind {
	pub const ALL: [MacroKind; 7] = [
		MacroKind::Note,
		MacroKind::PresenterNote,
		MacroKind::TextTask,
		MacroKind::MathTask,
		MacroKind::CodeTask,
		MacroKind::Mcq,
		MacroKind::Gap,
	];

	/// The name used in markup, e.g. `mathTask` for `#mathTask[...]`.
	pub fn tag(self) -> &'static str {
		match self {
			MacroKind::Note => "note",
			MacroKind::PresenterNote => "pn",
			MacroKind::TextTask => "textTask",
			MacroKind::MathTask => "mathTask",
			MacroKind::CodeTask => "codeTask",
			MacroKind::Mcq => "mcq",
			MacroKind::Gap => "gap",
		}
	}

	pub fn builder(self) -> MacroBuilder {
		match self {
			MacroKind::Note => build_note,
			MacroKind::PresenterNote => build_presenter_note,
			MacroKind::TextTask => build_text_task,
			MacroKind::MathTask => build_math_task,
			MacroKind::CodeTask => build_code_task,
			MacroKind::Mcq => build_mcq,
			MacroKind::Gap => build_gap,
		}
	}

	/// The built-in descriptor for this kind.
	pub fn descriptor(self) -> MacroDescriptor {
		let (slots, allowed_contexts) = match self {
			MacroKind::Note | MacroKind::Mcq | MacroKind::Gap => (NO_SLOTS, ALL_CONTEXTS),
			MacroKind::PresenterNote => (NO_SLOTS, SLIDES_ONLY),
			MacroKind::TextTask => (TEXT_TASK_SLOTS, ALL_CONTEXTS),
			MacroKind::MathTask => (MATH_TASK_SLOTS, ALL_CONTEXTS),
			MacroKind::CodeTask => (CODE_TASK_SLOTS, ALL_CONTEXTS),
		};

		MacroDescriptor {
			kind: self,
			slots,
			allowed_contexts,
		}
	}
}

/// Describes how a macro may be used: its inline slots and the document
/// contexts it is legal in. An empty `allowed_contexts` means every context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacroDescriptor {
	pub kind: MacroKind,
	pub slots: &'static [SlotSpec],
	pub allowed_contexts: &'static [DocumentContext],
}

impl MacroDescriptor {
	pub fn tag(&self) -> &'static str {
		self.kind.tag()
	}

	pub fn slot(&self, name: &str) -> Option<&SlotSpec> {
		self.slots.iter().find(|slot| slot.name == name)
	}

	pub fn allows(&self, context: DocumentContext) -> bool {
		self.allowed_contexts.is_empty() || self.allowed_contexts.contains(&context)
	}

	pub fn required_slots(&self) -> impl Iterator<Item = &SlotSpec> {
		self.slots.iter().filter(|slot| slot.required)
	}
}

/// The immutable set of macro descriptors a build dispatches against.
#[derive(Debug, Clone)]
pub struct MacroRegistry {
	descriptors: BTreeMap<&'static str, MacroDescriptor>,
	slot_names: BTreeSet<&'static str>,
}

impl MacroRegistry {
	/// The registry of every built-in macro.
	pub fn standard() -> CourseResult<Self> {
		MacroKind::ALL
			.into_iter()
			.fold(Self::builder(), |builder, kind| builder.register(kind.descriptor()))
			.build()
	}

	pub fn builder() -> MacroRegistryBuilder {
		MacroRegistryBuilder::default()
	}

	pub fn get(&self, tag: &str) -> Option<&MacroDescriptor> {
		self.descriptors.get(tag)
	}

	/// Whether `name` is declared as a slot by any registered macro.
	pub fn is_slot_name(&self, name: &str) -> bool {
		self.slot_names.contains(name)
	}

	pub fn iter(&self) -> impl Iterator<Item = &MacroDescriptor> {
		self.descriptors.values()
	}

	pub fn len(&self) -> usize {
		self.descriptors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.descriptors.is_empty()
	}
}

#[derive(Debug, Default)]
pub struct MacroRegistryBuilder {
	descriptors: Vec<MacroDescriptor>,
}

impl MacroRegistryBuilder {
	#[must_use]
	pub fn register(mut self, descriptor: MacroDescriptor) -> Self {
		self.descriptors.push(descriptor);
		self
	}

	/// Validate the descriptor set and freeze it.
	pub fn build(self) -> CourseResult<MacroRegistry> {
		let mut descriptors = BTreeMap::new();

		for descriptor in self.descriptors {
			if descriptors.insert(descriptor.tag(), descriptor).is_some() {
				return Err(CourseError::RegistryMisconfigured(format!(
					"macro `{}` is registered twice",
					descriptor.tag()
				)));
			}
		}

		let mut slot_names = BTreeSet::new();

		for descriptor in descriptors.values() {
			let mut seen = BTreeSet::new();

			for slot in descriptor.slots {
				if !seen.insert(slot.name) {
					return Err(CourseError::RegistryMisconfigured(format!(
						"macro `{}` declares the slot `{}` twice",
						descriptor.tag(),
						slot.name
					)));
				}

				if descriptors.contains_key(slot.name) {
					return Err(CourseError::RegistryMisconfigured(format!(
						"slot `{}` of macro `{}` shadows the macro of the same name",
						slot.name,
						descriptor.tag()
					)));
				}

				slot_names.insert(slot.name);
			}
		}

		tracing::debug!(macros = descriptors.len(), "built macro registry");

		Ok(MacroRegistry {
			descriptors,
			slot_names,
		})
	}
}
