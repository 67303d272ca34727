use serde::Serialize;

use crate::models::{Document, DocumentKind};

pub const KNOWN_PROPERTY_TYPES: &[&str] = &["house", "unit", "townhouse", "land"];

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub kind: DocumentKind,
    pub label: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChecklistItem {
    pub id: DocumentKind,
    pub label: &'static str,
    pub required: bool,
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub checklist: Vec<ChecklistItem>,
    pub progress: Progress,
}

/// A `_pool` suffix (or a bare `pool` marker anywhere in the type string)
/// upgrades the pool safety certificate to required.
fn has_pool(property_type: &str) -> bool {
    property_type.contains("pool")
}

fn base_type(property_type: &str) -> &str {
    property_type
        .strip_suffix("_pool")
        .unwrap_or(property_type)
}

pub fn is_known_type(property_type: &str) -> bool {
    KNOWN_PROPERTY_TYPES.contains(&base_type(property_type))
}

/// Minimal rule set applied when the property type is not recognised.
pub fn baseline_rules() -> Vec<Rule> {
    vec![
        Rule {
            kind: DocumentKind::TitleSearch,
            label: "Title search document",
            required: true,
        },
        Rule {
            kind: DocumentKind::SmokeAlarm,
            label: "Smoke alarm compliance certificate",
            required: true,
        },
    ]
}

pub fn rules_for(property_type: &str) -> Option<Vec<Rule>> {
    if !is_known_type(property_type) {
        return None;
    }

    Some(vec![
        Rule {
            kind: DocumentKind::TitleSearch,
            label: "Title search document",
            required: true,
        },
        Rule {
            kind: DocumentKind::SmokeAlarm,
            label: "Smoke alarm compliance certificate",
            required: true,
        },
        Rule {
            kind: DocumentKind::PoolSafety,
            label: "Pool safety certificate (if pool)",
            required: has_pool(property_type),
        },
        Rule {
            kind: DocumentKind::Supporting,
            label: "Supporting documents",
            required: false,
        },
    ])
}

/// Pure projection from the property type and its current documents to the
/// checklist and progress counters. No clock, no randomness: identical
/// inputs produce identical output.
pub fn evaluate(property_type: &str, documents: &[Document]) -> Evaluation {
    let rules = rules_for(property_type).unwrap_or_else(baseline_rules);

    let checklist: Vec<ChecklistItem> = rules
        .iter()
        .map(|rule| {
            let complete = documents
                .iter()
                .any(|doc| doc.kind == rule.kind && !doc.is_deleted());
            ChecklistItem {
                id: rule.kind,
                label: rule.label,
                required: rule.required,
                complete,
            }
        })
        .collect();

    let total = checklist.iter().filter(|item| item.required).count();
    let completed = checklist
        .iter()
        .filter(|item| item.required && item.complete)
        .count();

    Evaluation {
        checklist,
        progress: Progress { completed, total },
    }
}
