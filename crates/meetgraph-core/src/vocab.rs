//! Canonical vocabularies (spec §3, §6): entity types, relationship types,
//! and state-status values, plus the normalization functions that map free
//! text onto them.
//!
//! Ported from the original `state_normalizer.py` / `relationship_normalizer.py`
//! tables; the alias lists below are transcribed from those modules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of business-entity types (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Project,
    Feature,
    Task,
    Decision,
    Deadline,
    Risk,
    Goal,
    Metric,
    Team,
    System,
    Technology,
}

impl EntityType {
    /// Parse a free-text type label, case-insensitively. Returns `None` for
    /// anything outside the closed set — callers must reject at the
    /// boundary rather than default to a catch-all (spec §9).
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace(['-', ' '], "_");
        Some(match normalized.as_str() {
            "person" => Self::Person,
            "project" => Self::Project,
            "feature" => Self::Feature,
            "task" => Self::Task,
            "decision" => Self::Decision,
            "deadline" => Self::Deadline,
            "risk" => Self::Risk,
            "goal" => Self::Goal,
            "metric" => Self::Metric,
            "team" => Self::Team,
            "system" => Self::System,
            "technology" => Self::Technology,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Project => "project",
            Self::Feature => "feature",
            Self::Task => "task",
            Self::Decision => "decision",
            Self::Deadline => "deadline",
            Self::Risk => "risk",
            Self::Goal => "goal",
            Self::Metric => "metric",
            Self::Team => "team",
            Self::System => "system",
            Self::Technology => "technology",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of relationship types (spec §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Owns,
    WorksOn,
    ReportsTo,
    DependsOn,
    Blocks,
    Includes,
    AssignedTo,
    ResponsibleFor,
    CollaboratesWith,
    MentionedIn,
    RelatesTo,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owns => "owns",
            Self::WorksOn => "works_on",
            Self::ReportsTo => "reports_to",
            Self::DependsOn => "depends_on",
            Self::Blocks => "blocks",
            Self::Includes => "includes",
            Self::AssignedTo => "assigned_to",
            Self::ResponsibleFor => "responsible_for",
            Self::CollaboratesWith => "collaborates_with",
            Self::MentionedIn => "mentioned_in",
            Self::RelatesTo => "relates_to",
        }
    }

    fn from_canonical(s: &str) -> Option<Self> {
        Some(match s {
            "owns" => Self::Owns,
            "works_on" => Self::WorksOn,
            "reports_to" => Self::ReportsTo,
            "depends_on" => Self::DependsOn,
            "blocks" => Self::Blocks,
            "includes" => Self::Includes,
            "assigned_to" => Self::AssignedTo,
            "responsible_for" => Self::ResponsibleFor,
            "collaborates_with" => Self::CollaboratesWith,
            "mentioned_in" => Self::MentionedIn,
            "relates_to" => Self::RelatesTo,
            _ => return None,
        })
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alias tables for relationship-type normalization, transcribed from
/// `relationship_normalizer.CANONICAL_RELATIONSHIPS`.
const RELATIONSHIP_ALIASES: &[(&str, &[&str])] = &[
    ("owns", &["owns", "owner", "owned_by", "has_ownership"]),
    (
        "works_on",
        &["works_on", "working_on", "assigned", "assigned_to", "working"],
    ),
    (
        "assigned_to",
        &["assigned_to", "assigned", "responsible", "tasked_with"],
    ),
    (
        "responsible_for",
        &["responsible_for", "responsible", "accountable", "in_charge_of"],
    ),
    (
        "depends_on",
        &[
            "depends_on",
            "depends",
            "dependent_on",
            "requires",
            "needs",
            "prerequisite",
            "reliant_on",
        ],
    ),
    ("blocks", &["blocks", "blocking", "blocker", "prevents", "impedes"]),
    ("reports_to", &["reports_to", "reports", "managed_by", "supervised_by"]),
    ("includes", &["includes", "contains", "has", "comprises", "encompasses"]),
    (
        "collaborates_with",
        &["collaborates_with", "collaborates", "works_with", "partners_with", "teams_with"],
    ),
    (
        "relates_to",
        &["relates_to", "related_to", "relates", "related", "connected_to", "associated_with"],
    ),
    ("mentioned_in", &["mentioned_in", "mentioned", "referenced_in", "cited_in"]),
];

/// Normalize a free-text relationship label to its canonical form. Unknown
/// labels default to `RelatesTo` (spec §6: "unknown types default to
/// relates_to"). Idempotent: normalizing a canonical value returns it
/// unchanged.
pub fn normalize_relationship_type(raw: &str) -> RelationshipType {
    let normalized = raw.trim().to_lowercase().replace(['-', ' '], "_");

    if let Some(exact) = RelationshipType::from_canonical(&normalized) {
        return exact;
    }

    for (canonical, aliases) in RELATIONSHIP_ALIASES {
        if aliases.contains(&normalized.as_str()) {
            return RelationshipType::from_canonical(canonical).expect("canonical table entry");
        }
    }

    RelationshipType::RelatesTo
}

/// Always valid after normalization (normalization defaults unknowns to
/// `relates_to`) — kept as a named predicate, ported from
/// `relationship_normalizer.is_valid_relationship_type`, for call sites that
/// want to distinguish "recognized alias" from "fell through to default".
pub fn is_recognized_relationship_alias(raw: &str) -> bool {
    let normalized = raw.trim().to_lowercase().replace(['-', ' '], "_");
    RelationshipType::from_canonical(&normalized).is_some()
        || RELATIONSHIP_ALIASES
            .iter()
            .any(|(_, aliases)| aliases.contains(&normalized.as_str()))
}

/// The canonical status vocabulary (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Planned,
    InProgress,
    Completed,
    Blocked,
    Cancelled,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
            Self::Cancelled => "cancelled",
        }
    }

    /// Title-case form for answer synthesis, ported from
    /// `state_normalizer.denormalize_for_display`.
    pub fn display(&self) -> &'static str {
        match self {
            Self::Planned => "Planned",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Blocked => "Blocked",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const STATUS_ALIASES: &[(Status, &[&str])] = &[
    (
        Status::Planned,
        &["planned", "planning", "not_started", "notstarted", "not started"],
    ),
    (
        Status::InProgress,
        &[
            "in_progress",
            "inprogress",
            "in progress",
            "in-progress",
            "in_process",
            "active",
            "ongoing",
        ],
    ),
    (
        Status::Completed,
        &["completed", "complete", "done", "finished", "closed"],
    ),
    (
        Status::Blocked,
        &["blocked", "on_hold", "onhold", "on hold", "paused", "stuck"],
    ),
    (
        Status::Cancelled,
        &["cancelled", "canceled", "abandoned", "stopped"],
    ),
];

/// Normalize a free-text status value to its canonical form (spec §6, P3
/// idempotence). Unrecognized values pass through lowercased/trimmed/
/// separator-normalized rather than being rejected — callers that need to
/// enforce the closed set use `Status::parse` instead.
pub fn normalize_status_str(raw: &str) -> String {
    let normalized = raw.trim().to_lowercase();
    for (canonical, aliases) in STATUS_ALIASES {
        if aliases.contains(&normalized.as_str()) {
            return canonical.as_str().to_string();
        }
    }
    normalized
}

impl Status {
    /// Parse a free-text status value into the closed enum, applying the
    /// same alias table as `normalize_status_str`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        for (canonical, aliases) in STATUS_ALIASES {
            if aliases.contains(&normalized.as_str()) || canonical.as_str() == normalized {
                return Some(*canonical);
            }
        }
        None
    }
}

/// Title-case a canonical or free-text status value for display, ported
/// from `state_normalizer.denormalize_for_display`. Falls back to a
/// word-capitalized rendering of the input when it isn't a recognized
/// canonical status.
pub fn display_status(raw: &str) -> String {
    if let Some(status) = Status::parse(raw) {
        return status.display().to_string();
    }
    raw.replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize an entity name for identity purposes (spec §3: `normalized_name`,
/// lowercase, whitespace-trimmed). Idempotent and collapses internal runs of
/// whitespace so "  API   Migration " and "api migration" collide.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_normalization_is_idempotent() {
        for raw in ["planning", "IN PROGRESS", "Done", "on_hold", "Cancelled"] {
            let once = normalize_status_str(raw);
            let twice = normalize_status_str(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn status_aliases_collapse_to_canonical() {
        assert_eq!(normalize_status_str("in planning phase".into()), "in planning phase");
        assert_eq!(normalize_status_str("planning"), "planned");
        assert_eq!(normalize_status_str("in-progress"), "in_progress");
        assert_eq!(normalize_status_str("on hold"), "blocked");
        assert_eq!(normalize_status_str("canceled"), "cancelled");
    }

    #[test]
    fn relationship_unknown_defaults_to_relates_to() {
        assert_eq!(normalize_relationship_type("fooblah"), RelationshipType::RelatesTo);
        assert_eq!(normalize_relationship_type("owner"), RelationshipType::Owns);
        assert_eq!(normalize_relationship_type("DEPENDS-ON"), RelationshipType::DependsOn);
    }

    #[test]
    fn entity_type_rejects_unknown() {
        assert!(EntityType::parse("gadget").is_none());
        assert_eq!(EntityType::parse("Project"), Some(EntityType::Project));
    }

    #[test]
    fn name_normalization_collapses_whitespace() {
        assert_eq!(normalize_name("  API   Migration  "), "api migration");
    }
}
