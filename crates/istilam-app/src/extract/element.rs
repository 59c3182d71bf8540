//! Field locating over static form-element snapshots.
//!
//! The portal's markup is untrusted and changes without notice, so candidates
//! are matched by keyword predicates rather than fixed selectors. Matching is
//! first-hit in role order; anything fancier risks false positives on
//! unrelated fields.

/// Which page surface an element came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Input,
    Button,
}

/// Immutable snapshot of one form element, taken once per query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDescriptor {
    pub kind: ElementKind,
    pub id: Option<String>,
    pub name: Option<String>,
    pub input_type: Option<String>,
    /// Placeholder text for inputs; visible text or `value` for buttons.
    pub label: Option<String>,
}

impl ElementDescriptor {
    pub fn input(
        id: Option<&str>,
        name: Option<&str>,
        input_type: Option<&str>,
        placeholder: Option<&str>,
    ) -> Self {
        Self {
            kind: ElementKind::Input,
            id: non_empty(id),
            name: non_empty(name),
            input_type: non_empty(input_type),
            label: non_empty(placeholder),
        }
    }

    pub fn button(id: Option<&str>, text: Option<&str>) -> Self {
        Self {
            kind: ElementKind::Button,
            id: non_empty(id),
            name: None,
            input_type: None,
            label: non_empty(text),
        }
    }

    /// A text-type input: explicit `type="text"` or no type attribute at all.
    pub fn is_text_input(&self) -> bool {
        self.kind == ElementKind::Input
            && matches!(self.input_type.as_deref(), None | Some("text"))
    }

    /// CSS selector for this element, when it carries an id or name to
    /// address it by.
    pub fn selector(&self) -> Option<String> {
        if let Some(id) = &self.id {
            return Some(format!("#{id}"));
        }
        self.name.as_ref().map(|name| format!("[name=\"{name}\"]"))
    }

    fn id_or_name_contains(&self, needle: &str) -> bool {
        contains_ci(self.id.as_deref(), needle) || contains_ci(self.name.as_deref(), needle)
    }

    fn label_contains(&self, needle: &str) -> bool {
        self.label
            .as_deref()
            .is_some_and(|label| label.contains(needle))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|value| value.to_lowercase().contains(needle))
}

/// Semantic roles the locator resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    PlateNumber,
    CivilId,
    Submit,
}

/// Resolved bindings, at most one element per role. An absent entry means no
/// predicate matched; the orchestrator then applies the positional fallback
/// (`nth_text_input` for the input roles, `fallback_submit` for the button).
/// Absence is an expected outcome, never an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldBindings<'a> {
    pub plate_number: Option<&'a ElementDescriptor>,
    pub civil_id: Option<&'a ElementDescriptor>,
    pub submit: Option<&'a ElementDescriptor>,
}

/// Resolves each role against the element inventory by keyword predicates.
pub fn locate_fields(elements: &[ElementDescriptor]) -> FieldBindings<'_> {
    let inputs = || elements.iter().filter(|e| e.kind == ElementKind::Input);
    let buttons = || elements.iter().filter(|e| e.kind == ElementKind::Button);

    let plate_number = inputs()
        .find(|input| input.id_or_name_contains("plate") || input.label_contains("لوحة"));
    let civil_id = inputs()
        .find(|input| input.id_or_name_contains("civil") || input.label_contains("مدني"));
    let submit = buttons().find(|button| {
        button.label_contains("بحث")
            || button.label_contains("استعلام")
            || contains_ci(button.id.as_deref(), "search")
            || contains_ci(button.id.as_deref(), "submit")
    });

    FieldBindings {
        plate_number,
        civil_id,
        submit,
    }
}

/// Positional fallback: the Nth text-type input in document order
/// (zero-based; plate number is 0, civil ID is 1).
pub fn nth_text_input(elements: &[ElementDescriptor], position: usize) -> Option<&ElementDescriptor> {
    elements
        .iter()
        .filter(|element| element.is_text_input())
        .nth(position)
}

/// Positional fallback for the submit role: first control of type submit,
/// else the first button element.
pub fn fallback_submit(elements: &[ElementDescriptor]) -> Option<&ElementDescriptor> {
    elements
        .iter()
        .find(|element| {
            element.kind == ElementKind::Button
                && element.input_type.as_deref() == Some("submit")
        })
        .or_else(|| {
            elements
                .iter()
                .find(|element| element.kind == ElementKind::Button)
        })
}
