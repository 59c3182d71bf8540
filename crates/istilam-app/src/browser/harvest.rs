//! HTML-to-snapshot harvesting, kept pure so the heuristics can be exercised
//! on static markup without a live browser.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::extract::{
    ElementDescriptor, ElementKind, LabeledFields, PageSnapshot, ResultElementSnapshot,
    TableSnapshot,
};
use crate::extract::strategy::RESULT_CONTAINER_CLASSES;

static INPUT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input").expect("input selector"));
static BUTTON_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("button, input[type=\"submit\"]").expect("button selector"));
static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("table selector"));
static ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("row selector"));
static CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th, td").expect("cell selector"));
static RESULT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".violation, .result-item, .record").expect("result container selector")
});
static LABELED_SELECTORS: LazyLock<[(Selector, LabeledSlot); 6]> = LazyLock::new(|| {
    [
        (Selector::parse(".id").expect("id selector"), LabeledSlot::Id),
        (
            Selector::parse(".date").expect("date selector"),
            LabeledSlot::Date,
        ),
        (
            Selector::parse(".time").expect("time selector"),
            LabeledSlot::Time,
        ),
        (
            Selector::parse(".amount").expect("amount selector"),
            LabeledSlot::Amount,
        ),
        (
            Selector::parse(".type").expect("type selector"),
            LabeledSlot::Kind,
        ),
        (
            Selector::parse(".location").expect("location selector"),
            LabeledSlot::Location,
        ),
    ]
});

#[derive(Debug, Clone, Copy)]
enum LabeledSlot {
    Id,
    Date,
    Time,
    Amount,
    Kind,
    Location,
}

/// Reads every input and button element into descriptors, once per query.
pub fn element_inventory(html: &str) -> Vec<ElementDescriptor> {
    let document = Html::parse_document(html);
    let mut elements = Vec::new();

    for input in document.select(&INPUT_SELECTOR) {
        // Submit inputs are controls, not fields; they are collected below.
        if input.value().attr("type") == Some("submit") {
            continue;
        }
        elements.push(ElementDescriptor::input(
            input.value().attr("id"),
            input.value().attr("name"),
            input.value().attr("type"),
            input.value().attr("placeholder"),
        ));
    }

    for button in document.select(&BUTTON_SELECTOR) {
        let inner = element_text(button);
        let label = if inner.is_empty() {
            button.value().attr("value").map(str::to_string)
        } else {
            Some(inner)
        };
        elements.push(ElementDescriptor {
            kind: ElementKind::Button,
            id: button.value().attr("id").map(str::to_string),
            name: button.value().attr("name").map(str::to_string),
            input_type: button.value().attr("type").map(str::to_string),
            label,
        });
    }

    elements
}

/// Materializes the rendered page into the read-only snapshot the extraction
/// strategies run over.
pub fn page_snapshot(html: &str) -> PageSnapshot {
    let document = Html::parse_document(html);

    let tables = document
        .select(&TABLE_SELECTOR)
        .map(|table| TableSnapshot {
            rows: table
                .select(&ROW_SELECTOR)
                .map(|row| {
                    row.select(&CELL_SELECTOR)
                        .map(|cell| element_text(cell))
                        .collect()
                })
                .collect(),
        })
        .collect();

    let result_elements = document
        .select(&RESULT_SELECTOR)
        .map(|container| ResultElementSnapshot {
            text: element_text(container),
            labeled: labeled_fields(container),
        })
        .collect();

    let body_text = element_text(document.root_element());

    PageSnapshot {
        tables,
        result_elements,
        body_text,
    }
}

fn labeled_fields(container: ElementRef<'_>) -> LabeledFields {
    let mut labeled = LabeledFields::default();

    for (selector, slot) in LABELED_SELECTORS.iter() {
        let Some(value) = container
            .select(selector)
            .map(|element| element_text(element))
            .find(|text| !text.is_empty())
        else {
            continue;
        };
        match slot {
            LabeledSlot::Id => labeled.id = Some(value),
            LabeledSlot::Date => labeled.date = Some(value),
            LabeledSlot::Time => labeled.time = Some(value),
            LabeledSlot::Amount => labeled.amount = Some(value),
            LabeledSlot::Kind => labeled.kind = Some(value),
            LabeledSlot::Location => labeled.location = Some(value),
        }
    }

    labeled
}

/// Text content with internal whitespace collapsed, as a browser would render
/// it for matching purposes.
fn element_text(element: ElementRef<'_>) -> String {
    let mut text = String::new();
    for chunk in element.text() {
        for token in chunk.split_whitespace() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(token);
        }
    }
    text
}
