//! Intent classification and query-text parsing (spec §4.7 steps 1-2),
//! ported from `query_engine_v2.py`'s `INTENT_PATTERNS` table, time-window
//! parser, and filter/aggregation extraction.

use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use meetgraph_core::{Entity, IntentKind, QueryIntent, TimeRange};
use regex::Regex;

struct IntentSpec {
    intent: IntentKind,
    patterns: &'static [&'static str],
    weight: f32,
    keywords: &'static [&'static str],
}

const INTENT_SPECS: &[IntentSpec] = &[
    IntentSpec {
        intent: IntentKind::Timeline,
        patterns: &[
            r"how did .* (?:progress|evolve|change)",
            r"timeline (?:for|of)",
            r"evolution of",
            r"history of",
            r"changes over time",
            r"show (?:me )?(?:the )?progress",
            r"track(?:ing)? .* over time",
        ],
        weight: 0.9,
        keywords: &["timeline", "history", "evolution", "progress", "changes"],
    },
    IntentSpec {
        intent: IntentKind::Blocker,
        patterns: &[
            r"what(?:'s| is| are) (?:blocking|blocked)",
            r"blockers? (?:for|on|in)",
            r"what's blocked",
            r"waiting on",
            r"stuck on",
            r"impediments?",
            r"obstacles?",
        ],
        weight: 0.85,
        keywords: &["blocker", "blocked", "blocking", "waiting", "stuck", "impediment"],
    },
    IntentSpec {
        intent: IntentKind::Status,
        patterns: &[
            r"(?:current |latest )?status (?:of|for)",
            r"where (?:is|are)",
            r"what(?:'s| is) the status",
            r"progress on",
            r"how (?:is|are) .* doing",
            r"update on",
        ],
        weight: 0.8,
        keywords: &["status", "current", "latest", "progress", "update"],
    },
    IntentSpec {
        intent: IntentKind::Ownership,
        patterns: &[
            r"who (?:owns|is owner)",
            r"who(?:'s| is) (?:responsible|working|leading)",
            r"assigned to",
            r"ownership of",
            r"team (?:for|on|working)",
        ],
        weight: 0.8,
        keywords: &["owner", "owns", "responsible", "assigned", "team", "lead"],
    },
    IntentSpec {
        intent: IntentKind::Analytics,
        patterns: &[
            r"how many",
            r"count of",
            r"metrics? (?:for|on)",
            r"analytics? (?:for|on)",
            r"statistics?",
            r"breakdown of",
            r"distribution",
        ],
        weight: 0.75,
        keywords: &["metrics", "analytics", "count", "statistics", "breakdown"],
    },
    IntentSpec {
        intent: IntentKind::Relationship,
        patterns: &[
            r"(?:dependencies|depends) (?:on|for)",
            r"related to",
            r"connected to",
            r"impacts? on",
            r"affected by",
        ],
        weight: 0.75,
        keywords: &["dependencies", "related", "connected", "impacts", "affects"],
    },
    IntentSpec {
        intent: IntentKind::Search,
        patterns: &[
            r"find (?:all )?(?:mentions|references)",
            r"search for",
            r"look for",
            r"where .* mentioned",
            r"discussions? (?:about|on)",
        ],
        weight: 0.7,
        keywords: &["find", "search", "mentions", "references", "discussions"],
    },
];

fn compiled_patterns() -> &'static [Vec<Regex>] {
    static COMPILED: OnceLock<Vec<Vec<Regex>>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        INTENT_SPECS
            .iter()
            .map(|spec| {
                spec.patterns
                    .iter()
                    .map(|p| Regex::new(&format!("(?i){p}")).expect("static intent pattern is valid regex"))
                    .collect()
            })
            .collect()
    })
}

/// Text-derived filters a query implies beyond intent and entity mentions
/// (spec §2 supplement: `query_engine_v2._extract_query_filters`/
/// `_extract_aggregation_type`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilters {
    pub status: Option<String>,
    pub entity_type: Option<String>,
    pub aggregation: Option<AggregationKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationKind {
    Count,
    Average,
    Sum,
    Group,
}

/// Scores `query` against every intent's pattern/keyword set and returns the
/// winner (spec §4.7 step 1). A tie at the top score falls back to `search`.
pub fn classify_intent(query: &str, known_entities: &[Entity], now: DateTime<Utc>) -> QueryIntent {
    let query_lower = query.to_lowercase();
    let patterns = compiled_patterns();

    let mut scores = vec![0.0f32; INTENT_SPECS.len()];
    for (idx, spec) in INTENT_SPECS.iter().enumerate() {
        for pattern in &patterns[idx] {
            if pattern.is_match(query) {
                scores[idx] += spec.weight;
            }
        }
        for keyword in spec.keywords {
            if query_lower.contains(keyword) {
                scores[idx] += 0.3;
            }
        }
    }

    let max_score = scores.iter().cloned().fold(0.0f32, f32::max);
    let (intent_type, confidence) = if max_score <= 0.0 {
        (IntentKind::Search, 0.5)
    } else {
        let winners = scores.iter().filter(|&&s| s >= max_score - f32::EPSILON).count();
        let confidence = max_score.min(1.0);
        if winners > 1 {
            (IntentKind::Search, confidence)
        } else {
            let idx = scores.iter().position(|&s| s == max_score).expect("max score came from this vec");
            (INTENT_SPECS[idx].intent, confidence)
        }
    };

    QueryIntent {
        intent_type,
        confidence,
        entities: extract_query_entities(query, known_entities),
        time_range: extract_time_range(query, now),
    }
}

/// Case-insensitive substring scan of `query` against every known entity's
/// name (spec §4.7 step 2).
pub fn extract_query_entities(query: &str, known_entities: &[Entity]) -> Vec<String> {
    let query_lower = query.to_lowercase();
    let mut matched = Vec::new();
    for entity in known_entities {
        if query_lower.contains(&entity.name.to_lowercase()) || query_lower.contains(&entity.normalized_name) {
            if !matched.contains(&entity.name) {
                matched.push(entity.name.clone());
            }
        }
    }
    matched
}

fn days_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:last|past) (\d+) days?").unwrap())
}

fn quarter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bQ([1-4])(?:\s+(\d{4}))?\b").unwrap())
}

/// Parses the free-text time phrases spec.md §4.7 step 2 names:
/// today/yesterday/this week/last week/last N days/Qn [year].
pub fn extract_time_range(query: &str, now: DateTime<Utc>) -> Option<TimeRange> {
    let query_lower = query.to_lowercase();
    let start_of_day = |dt: DateTime<Utc>| dt.date_naive().and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    let end_of_day = |dt: DateTime<Utc>| dt.date_naive().and_hms_opt(23, 59, 59).map(|n| Utc.from_utc_datetime(&n));

    if query_lower.contains("today") {
        return start_of_day(now).map(|start| TimeRange { start, end: now });
    }
    if query_lower.contains("yesterday") {
        let yesterday = now - Duration::days(1);
        return match (start_of_day(yesterday), end_of_day(yesterday)) {
            (Some(start), Some(end)) => Some(TimeRange { start, end }),
            _ => None,
        };
    }
    if query_lower.contains("this week") {
        let start = now - Duration::days(now.weekday().num_days_from_monday() as i64);
        return start_of_day(start).map(|start| TimeRange { start, end: now });
    }
    if query_lower.contains("last week") {
        let start = now - Duration::days(now.weekday().num_days_from_monday() as i64 + 7);
        let end = start + Duration::days(6);
        return match (start_of_day(start), end_of_day(end)) {
            (Some(start), Some(end)) => Some(TimeRange { start, end }),
            _ => None,
        };
    }
    if let Some(caps) = days_regex().captures(&query_lower) {
        if let Ok(days) = caps[1].parse::<i64>() {
            return Some(TimeRange { start: now - Duration::days(days), end: now });
        }
    }
    if let Some(caps) = quarter_regex().captures(query) {
        let quarter: u32 = caps[1].parse().ok()?;
        let year: i32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(now.year());
        let (start_month, end_month) = match quarter {
            1 => (1, 3),
            2 => (4, 6),
            3 => (7, 9),
            _ => (10, 12),
        };
        let start = Utc.with_ymd_and_hms(year, start_month, 1, 0, 0, 0).single()?;
        let end = if end_month == 12 {
            Utc.with_ymd_and_hms(year, 12, 31, 23, 59, 59).single()?
        } else {
            let next_month_start = Utc.with_ymd_and_hms(year, end_month + 1, 1, 0, 0, 0).single()?;
            next_month_start - Duration::seconds(1)
        };
        return Some(TimeRange { start, end });
    }
    None
}

/// Status/type filters a query implies (spec §2 supplement).
pub fn extract_query_filters(query: &str) -> QueryFilters {
    let query_lower = query.to_lowercase();
    let mut filters = QueryFilters::default();

    if query_lower.contains("in progress") {
        filters.status = Some("in_progress".to_string());
    } else if query_lower.contains("blocked") {
        filters.status = Some("blocked".to_string());
    } else if query_lower.contains("completed") {
        filters.status = Some("completed".to_string());
    } else if query_lower.contains("planned") {
        filters.status = Some("planned".to_string());
    }

    if query_lower.contains("project") {
        filters.entity_type = Some("project".to_string());
    } else if query_lower.contains("feature") {
        filters.entity_type = Some("feature".to_string());
    } else if query_lower.contains("task") {
        filters.entity_type = Some("task".to_string());
    }

    filters.aggregation = extract_aggregation_type(&query_lower);
    filters
}

fn extract_aggregation_type(query_lower: &str) -> Option<AggregationKind> {
    if query_lower.contains("count") || query_lower.contains("how many") {
        Some(AggregationKind::Count)
    } else if query_lower.contains("average") || query_lower.contains("avg") {
        Some(AggregationKind::Average)
    } else if query_lower.contains("sum") || query_lower.contains("total") {
        Some(AggregationKind::Sum)
    } else if query_lower.contains("group by") {
        Some(AggregationKind::Group)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetgraph_core::EntityType;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 29, 12, 0, 0).unwrap()
    }

    #[test]
    fn classifies_blocker_intent() {
        let intent = classify_intent("what's blocking the API migration?", &[], now());
        assert_eq!(intent.intent_type, IntentKind::Blocker);
        assert!(intent.confidence > 0.0);
    }

    #[test]
    fn classifies_timeline_intent() {
        let intent = classify_intent("show me the progress of Project Alpha", &[], now());
        assert_eq!(intent.intent_type, IntentKind::Timeline);
    }

    #[test]
    fn no_pattern_match_falls_back_to_search() {
        let intent = classify_intent("hello there", &[], now());
        assert_eq!(intent.intent_type, IntentKind::Search);
        assert_eq!(intent.confidence, 0.5);
    }

    #[test]
    fn extracts_mentioned_entities_case_insensitively() {
        let entity = Entity::new(EntityType::Project, "Project Alpha");
        let intent = classify_intent("what's the status of project alpha?", std::slice::from_ref(&entity), now());
        assert_eq!(intent.entities, vec!["Project Alpha".to_string()]);
    }

    #[test]
    fn today_time_range_spans_midnight_to_now() {
        let range = extract_time_range("what happened today", now()).unwrap();
        assert_eq!(range.start.time().hour(), 0);
        assert_eq!(range.end, now());
    }

    #[test]
    fn last_n_days_parses_count() {
        let range = extract_time_range("show changes from the last 5 days", now()).unwrap();
        assert_eq!((range.end - range.start).num_days(), 5);
    }

    #[test]
    fn quarter_with_explicit_year() {
        let range = extract_time_range("revenue for Q2 2025", now()).unwrap();
        assert_eq!(range.start.year(), 2025);
        assert_eq!(range.start.month(), 4);
        assert_eq!(range.end.month(), 6);
    }

    #[test]
    fn quarter_without_year_uses_current_year() {
        let range = extract_time_range("status for Q4", now()).unwrap();
        assert_eq!(range.start.year(), 2026);
        assert_eq!(range.start.month(), 10);
    }

    #[test]
    fn filters_extract_status_and_type() {
        let filters = extract_query_filters("how many blocked projects are there?");
        assert_eq!(filters.status.as_deref(), Some("blocked"));
        assert_eq!(filters.entity_type.as_deref(), Some("project"));
        assert_eq!(filters.aggregation, Some(AggregationKind::Count));
    }
}
