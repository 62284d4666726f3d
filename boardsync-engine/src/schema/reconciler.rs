//! Merging descriptors into an existing property template list

use std::collections::HashSet;

use boardsync_common::models::PropertyTemplate;

use super::descriptors::{MatchKey, PropertyDescriptor};

/// Result of merging descriptors into a board schema
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub properties: Vec<PropertyTemplate>,
    /// Ids of templates appended by this merge, in schema order
    pub added: Vec<String>,
    /// Ids of imported templates dropped because their source disappeared
    pub removed: Vec<String>,
    pub changed: bool,
}

/// Merge `descriptors` into `current` without touching the input.
///
/// Matched templates keep their id and their options' ids; mutable fields
/// (name, description, private flag, type of form-backed columns) follow the
/// descriptor and options are unioned by value. Unmatched descriptors are
/// appended. Imported custom properties whose source no longer exists are
/// removed; nothing else is ever removed.
pub fn reconcile(current: &[PropertyTemplate], descriptors: &[PropertyDescriptor]) -> ReconcileOutcome {
    let mut properties = current.to_vec();
    let mut added = Vec::new();
    let mut changed = false;

    for descriptor in descriptors {
        match properties.iter_mut().find(|p| descriptor.key.matches(p)) {
            Some(existing) => changed |= merge_into(existing, &descriptor.template),
            None => {
                added.push(descriptor.template.id.clone());
                properties.push(descriptor.template.clone());
                changed = true;
            }
        }
    }

    let imported: HashSet<&str> = descriptors
        .iter()
        .filter_map(|d| match &d.key {
            MatchKey::Id(id) if d.template.proposal_field_id.is_some() => Some(id.as_str()),
            _ => None,
        })
        .collect();

    let mut removed = Vec::new();
    properties.retain(|p| {
        let stale = p.proposal_field_id.is_some() && !imported.contains(p.id.as_str());
        if stale {
            removed.push(p.id.clone());
        }
        !stale
    });
    changed |= !removed.is_empty();

    ReconcileOutcome {
        properties,
        added,
        removed,
        changed,
    }
}

/// Apply a descriptor's mutable fields to an existing template; true if anything changed
fn merge_into(existing: &mut PropertyTemplate, candidate: &PropertyTemplate) -> bool {
    let before = existing.clone();

    existing.name = candidate.name.clone();
    existing.property_type = candidate.property_type;
    existing.description = candidate.description.clone();
    existing.private = candidate.private;
    existing.read_only = candidate.read_only;
    existing.read_only_values = candidate.read_only_values;
    existing.dynamic_options = candidate.dynamic_options;
    existing.form_field_id = candidate.form_field_id.clone();
    existing.proposal_field_id = candidate.proposal_field_id.clone();
    existing.evaluation_title = candidate.evaluation_title.clone();
    existing.criteria_title = candidate.criteria_title.clone();
    existing.reviewer_id = candidate.reviewer_id.clone();
    if candidate.relation_data.is_some() {
        existing.relation_data = candidate.relation_data.clone();
    }
    existing.union_options(&candidate.options);

    *existing != before
}
