//! Heuristic property/field matching.
//!
//! Scores every (table, field) candidate against each data property and
//! keeps the best candidate per property when it clears the confidence
//! threshold. The score blends three signals: name similarity between field
//! and property, similarity between table name and the property's domain
//! class, and agreement between sampled cell values and the value type the
//! property suggests.

use std::env;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{DataProperty, MatchMode, MatchRecord, MatchRequest, MatchResponse, Table};

/// Weights of the three scoring signals.
const NAME_WEIGHT: f64 = 0.6;
const DOMAIN_WEIGHT: f64 = 0.2;
const SAMPLE_WEIGHT: f64 = 0.2;

/// Minimum domain similarity for a table to stay in a property's candidate
/// set, and how many tables are kept.
const TABLE_CUTOFF: f64 = 0.35;
const TABLE_LIMIT: usize = 3;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("llm matching is not configured: set QWEN_API_KEY")]
    LlmNotConfigured,

    #[error("llm matching backend is unavailable")]
    LlmUnavailable,
}

/// A candidate column: one field of one table, with its sampled values.
#[derive(Debug, Clone)]
struct FieldCandidate {
    table_name: String,
    field: String,
    samples: Vec<Value>,
}

/// Run a match request. Heuristic mode always succeeds with one record per
/// property; llm mode fails with a configuration error rather than silently
/// downgrading.
pub fn run_match(request: &MatchRequest) -> Result<MatchResponse, MatchError> {
    let threshold = request.threshold.clamp(0.0, 1.0);
    info!(
        mode = ?request.mode,
        properties = request.properties.len(),
        tables = request.tables.len(),
        threshold,
        "starting match run"
    );

    match request.mode {
        MatchMode::Heuristic => Ok(MatchResponse {
            matches: heuristic_match(&request.properties, &request.tables, threshold),
        }),
        MatchMode::Llm => {
            if env::var("QWEN_API_KEY").is_err() {
                return Err(MatchError::LlmNotConfigured);
            }
            // No remote client is wired in; report it rather than pretend.
            Err(MatchError::LlmUnavailable)
        }
    }
}

/// Heuristic matching: best candidate per property, thresholded.
pub fn heuristic_match(
    properties: &[DataProperty],
    tables: &[Table],
    threshold: f64,
) -> Vec<MatchRecord> {
    let candidates = build_candidates(tables);
    log_relations(tables);

    properties
        .iter()
        .map(|prop| {
            let scoped = select_candidates_for_property(prop, &candidates, tables);
            let best = best_candidate(prop, &scoped);

            let mut record = MatchRecord::empty_for(prop);
            match best {
                Some((candidate, score)) if score >= threshold => {
                    info!(
                        property = prop.display_label(),
                        table = candidate.table_name,
                        field = candidate.field,
                        score,
                        "matched"
                    );
                    record.table_name = candidate.table_name.clone();
                    record.field = candidate.field.clone();
                    record.score = Some(round4(score));
                }
                Some((candidate, score)) => {
                    info!(
                        property = prop.display_label(),
                        field = candidate.field,
                        score,
                        "best candidate below threshold"
                    );
                    record.score = if score > 0.0 { Some(round4(score)) } else { None };
                }
                None => {
                    info!(property = prop.display_label(), "no candidate found");
                }
            }
            record
        })
        .collect()
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn build_candidates(tables: &[Table]) -> Vec<FieldCandidate> {
    let mut candidates = Vec::new();
    for table in tables {
        for field in &table.fields {
            let samples = table
                .sample_rows
                .iter()
                .filter_map(|row| row.get(field).cloned())
                .collect();
            candidates.push(FieldCandidate {
                table_name: table.name.clone(),
                field: field.clone(),
                samples,
            });
        }
    }
    candidates
}

/// Restrict candidates to the tables most plausible for the property's
/// domain class. No domains (or no table clears the cutoff strongly enough)
/// falls back gracefully.
fn select_candidates_for_property<'c>(
    prop: &DataProperty,
    candidates: &'c [FieldCandidate],
    tables: &[Table],
) -> Vec<&'c FieldCandidate> {
    let preferred = rank_tables_for_property(prop, tables);
    if preferred.is_empty() {
        return candidates.iter().collect();
    }
    candidates
        .iter()
        .filter(|c| preferred.iter().any(|t| t == &c.table_name))
        .collect()
}

fn rank_tables_for_property(prop: &DataProperty, tables: &[Table]) -> Vec<String> {
    if tables.is_empty() || prop.domains.is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<(String, f64)> = tables
        .iter()
        .filter(|t| !t.name.is_empty())
        .map(|t| (t.name.clone(), domain_similarity(&t.name, prop)))
        .collect();
    if scored.is_empty() {
        return Vec::new();
    }
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut selected: Vec<String> = scored
        .iter()
        .filter(|(_, score)| *score >= TABLE_CUTOFF)
        .map(|(name, _)| name.clone())
        .collect();
    if selected.is_empty() {
        selected.push(scored[0].0.clone());
    }
    selected.truncate(TABLE_LIMIT);
    selected
}

fn best_candidate<'c>(
    prop: &DataProperty,
    candidates: &[&'c FieldCandidate],
) -> Option<(&'c FieldCandidate, f64)> {
    let mut best: Option<(&FieldCandidate, f64)> = None;
    for &candidate in candidates {
        let score = score_candidate(prop, candidate);
        if score > best.map(|(_, s)| s).unwrap_or(0.0) {
            best = Some((candidate, score));
        }
    }
    best
}

fn score_candidate(prop: &DataProperty, candidate: &FieldCandidate) -> f64 {
    let name_score = name_similarity(
        &candidate.field,
        [prop.label.as_deref(), prop.local_name.as_deref()],
    );
    let domain_score = domain_similarity(&candidate.table_name, prop);
    let sample_score = sample_similarity(&candidate.samples, prop);

    NAME_WEIGHT * name_score + DOMAIN_WEIGHT * domain_score + SAMPLE_WEIGHT * sample_score
}

/// Best normalized edit-distance ratio between `text` and any candidate name.
fn name_similarity<'a>(text: &str, names: impl IntoIterator<Item = Option<&'a str>>) -> f64 {
    let normalized_text = normalize_text(text);
    let mut best = 0.0_f64;
    for name in names.into_iter().flatten() {
        let normalized_name = normalize_text(name);
        if normalized_name.is_empty() {
            continue;
        }
        best = best.max(similarity_ratio(&normalized_text, &normalized_name));
    }
    best
}

/// Similarity between a table name and the property's domain classes.
/// Properties without a domain are neutral rather than penalized.
fn domain_similarity(table_name: &str, prop: &DataProperty) -> f64 {
    if prop.domains.is_empty() {
        return 0.5;
    }
    let names = prop
        .domains
        .iter()
        .flat_map(|d| [d.label.as_deref(), d.local_name.as_deref()]);
    name_similarity(table_name, names)
}

/// Lowercase, fold separators to spaces, strip everything non-alphanumeric.
fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = true;
    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Normalized similarity in [0, 1] from the Levenshtein distance.
fn similarity_ratio(left: &str, right: &str) -> f64 {
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }
    let left_chars: Vec<char> = left.chars().collect();
    let right_chars: Vec<char> = right.chars().collect();
    let max_len = left_chars.len().max(right_chars.len());
    if max_len == 0 {
        return 1.0;
    }
    let dist = levenshtein(&left_chars, &right_chars);
    1.0 - dist as f64 / max_len as f64
}

/// Standard two-row dynamic-programming Levenshtein distance.
fn levenshtein(value: &[char], needle: &[char]) -> usize {
    let n = needle.len();
    if n == 0 {
        return value.len();
    }
    if value.is_empty() {
        return n;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr: Vec<usize> = vec![0; n + 1];

    for (i, c) in value.iter().enumerate() {
        curr[0] = i + 1;
        for j in 1..=n {
            let cost = if *c == needle[j - 1] { 0 } else { 1 };
            let deletion = prev[j] + 1;
            let insertion = curr[j - 1] + 1;
            let substitution = prev[j - 1] + cost;
            curr[j] = deletion.min(insertion).min(substitution);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[n]
}

// --- sample-type agreement ------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ValueKind {
    Email,
    Url,
    Phone,
    Boolean,
    Date,
    Number,
    Text,
    Unknown,
}

/// How well the sampled cell values agree with the value type the property
/// suggests.
fn sample_similarity(samples: &[Value], prop: &DataProperty) -> f64 {
    let hints = property_type_hints(prop);
    if hints.is_empty() {
        return 0.5;
    }
    match infer_sample_kind(samples) {
        ValueKind::Unknown => 0.5,
        kind if hints.contains(&kind) => 1.0,
        _ => 0.0,
    }
}

/// Type hints from the property label and range IRIs.
fn property_type_hints(prop: &DataProperty) -> Vec<ValueKind> {
    let mut hints = Vec::new();
    let mut add = |kind: ValueKind| {
        if !hints.contains(&kind) {
            hints.push(kind);
        }
    };

    for name in [prop.label.as_deref(), prop.local_name.as_deref()]
        .into_iter()
        .flatten()
    {
        let text = name.to_lowercase();
        if text.contains("email") {
            add(ValueKind::Email);
        }
        if text.contains("date") || text.contains("time") {
            add(ValueKind::Date);
        }
        if text.contains("url") || text.contains("link") {
            add(ValueKind::Url);
        }
        if text.contains("phone") || text.contains("mobile") {
            add(ValueKind::Phone);
        }
        if text.contains("age") || text.contains("amount") || text.contains("price") {
            add(ValueKind::Number);
        }
    }

    for range in &prop.ranges {
        let text = range
            .local_name
            .as_deref()
            .or(range.label.as_deref())
            .unwrap_or(&range.iri)
            .to_lowercase();
        if text.contains("boolean") {
            add(ValueKind::Boolean);
        }
        if text.contains("date") || text.contains("time") {
            add(ValueKind::Date);
        }
        if ["int", "decimal", "float", "double", "number"]
            .iter()
            .any(|t| text.contains(t))
        {
            add(ValueKind::Number);
        }
        if text.contains("string") {
            add(ValueKind::Text);
        }
    }

    hints
}

/// Majority-vote the kind of the sampled values; 60% agreement wins.
fn infer_sample_kind(samples: &[Value]) -> ValueKind {
    let values: Vec<String> = samples
        .iter()
        .filter_map(|v| match v {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.trim().to_string()),
            other => Some(other.to_string()),
        })
        .collect();
    if values.is_empty() {
        return ValueKind::Unknown;
    }

    let total = values.len() as f64;
    let share = |pred: fn(&str) -> bool| {
        values.iter().filter(|v| pred(v.as_str())).count() as f64 / total
    };

    // Checked most-specific first.
    if share(looks_like_email) >= 0.6 {
        return ValueKind::Email;
    }
    if share(looks_like_url) >= 0.6 {
        return ValueKind::Url;
    }
    if share(looks_like_bool) >= 0.6 {
        return ValueKind::Boolean;
    }
    if share(looks_like_date) >= 0.6 {
        return ValueKind::Date;
    }
    if share(looks_like_phone) >= 0.6 {
        return ValueKind::Phone;
    }
    if share(looks_like_number) >= 0.6 {
        return ValueKind::Number;
    }
    ValueKind::Text
}

fn looks_like_email(text: &str) -> bool {
    let mut parts = text.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !text.contains(char::is_whitespace)
        }
        _ => false,
    }
}

fn looks_like_url(text: &str) -> bool {
    text.starts_with("http://") || text.starts_with("https://") || text.starts_with("www.")
}

fn looks_like_number(text: &str) -> bool {
    let body = text.strip_prefix('-').unwrap_or(text);
    !body.is_empty()
        && body.chars().all(|c| c.is_ascii_digit() || c == '.')
        && body.chars().filter(|c| *c == '.').count() <= 1
        && !body.starts_with('.')
        && !body.ends_with('.')
}

fn looks_like_date(text: &str) -> bool {
    // YYYY-MM-DD or YYYY/MM/DD prefixes.
    let bytes = text.as_bytes();
    bytes.len() >= 8
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && (bytes[4] == b'-' || bytes[4] == b'/')
        && text[5..]
            .split(|c| c == '-' || c == '/')
            .take(2)
            .all(|part| !part.is_empty() && part.bytes().take(2).all(|b| b.is_ascii_digit()))
}

fn looks_like_phone(text: &str) -> bool {
    let body = text.strip_prefix('+').unwrap_or(text);
    let digits: String = body
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

fn looks_like_bool(text: &str) -> bool {
    matches!(
        text.to_lowercase().as_str(),
        "true" | "false" | "yes" | "no" | "0" | "1"
    )
}

/// Log table pairs that share field names; useful when reading match logs
/// for multi-table uploads.
fn log_relations(tables: &[Table]) {
    for (i, left) in tables.iter().enumerate() {
        for right in &tables[i + 1..] {
            let shared: Vec<&str> = left
                .fields
                .iter()
                .filter(|f| right.fields.contains(f))
                .map(String::as_str)
                .take(5)
                .collect();
            if !shared.is_empty() {
                debug!(
                    left = left.name,
                    right = right.name,
                    fields = ?shared,
                    "tables share fields"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IriRef, Row};

    fn prop(iri: &str, label: &str, domain: Option<&str>) -> DataProperty {
        DataProperty {
            iri: iri.to_string(),
            label: Some(label.to_string()),
            local_name: Some(label.to_string()),
            domains: domain
                .map(|d| {
                    vec![IriRef {
                        iri: format!("ex:{d}"),
                        label: Some(d.to_string()),
                        local_name: Some(d.to_string()),
                    }]
                })
                .unwrap_or_default(),
            ranges: vec![],
            is_leaf: true,
        }
    }

    fn table(name: &str, fields: &[&str]) -> Table {
        Table {
            name: name.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            sample_rows: Vec::<Row>::new(),
            rows: Vec::new(),
        }
    }

    fn request(properties: Vec<DataProperty>, tables: Vec<Table>, mode: MatchMode) -> MatchRequest {
        MatchRequest {
            properties,
            tables,
            mode,
            threshold: 0.5,
        }
    }

    #[test]
    fn normalize_text_folds_separators() {
        assert_eq!(normalize_text("Full_Name-1"), "full name 1");
        assert_eq!(normalize_text("  Email!!  "), "email");
    }

    #[test]
    fn similarity_ratio_bounds() {
        assert_eq!(similarity_ratio("name", "name"), 1.0);
        assert_eq!(similarity_ratio("abc", "xyz"), 0.0);
        let partial = similarity_ratio("username", "name");
        assert!(partial > 0.0 && partial < 1.0);
    }

    #[test]
    fn exact_field_name_wins() {
        let props = vec![prop("ex:email", "email", Some("Person"))];
        let tables = vec![table("person", &["id", "email", "phone"])];
        let matches = heuristic_match(&props, &tables, 0.5);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].table_name, "person");
        assert_eq!(matches[0].field, "email");
        assert!(matches[0].score.unwrap() >= 0.5);
    }

    #[test]
    fn below_threshold_keeps_score_but_no_selection() {
        let props = vec![prop("ex:zzz", "zzz", None)];
        let tables = vec![table("orders", &["total"])];
        let matches = heuristic_match(&props, &tables, 0.9);
        assert_eq!(matches[0].table_name, "");
        assert_eq!(matches[0].field, "");
    }

    #[test]
    fn one_record_per_property_always() {
        let props = vec![
            prop("ex:a", "alpha", None),
            prop("ex:b", "beta", None),
            prop("ex:c", "gamma", None),
        ];
        let tables = vec![table("t", &["alpha"])];
        let matches = heuristic_match(&props, &tables, 0.5);
        assert_eq!(matches.len(), 3);
        let iris: Vec<&str> = matches.iter().map(|m| m.property_iri.as_str()).collect();
        assert_eq!(iris, ["ex:a", "ex:b", "ex:c"]);
    }

    #[test]
    fn domain_steers_table_choice() {
        let props = vec![prop("ex:name", "name", Some("Person"))];
        let tables = vec![table("person", &["name"]), table("warehouse", &["name"])];
        let matches = heuristic_match(&props, &tables, 0.3);
        assert_eq!(matches[0].table_name, "person");
    }

    #[test]
    fn sample_kind_inference() {
        let emails: Vec<Value> = ["a@b.com", "c@d.org", "e@f.net"]
            .iter()
            .map(|s| Value::String(s.to_string()))
            .collect();
        assert_eq!(infer_sample_kind(&emails), ValueKind::Email);

        let numbers: Vec<Value> = ["1", "2.5", "-3"]
            .iter()
            .map(|s| Value::String(s.to_string()))
            .collect();
        assert_eq!(infer_sample_kind(&numbers), ValueKind::Number);

        let dates: Vec<Value> = ["2024-01-02", "2024/03/04"]
            .iter()
            .map(|s| Value::String(s.to_string()))
            .collect();
        assert_eq!(infer_sample_kind(&dates), ValueKind::Date);

        assert_eq!(infer_sample_kind(&[]), ValueKind::Unknown);
        assert_eq!(infer_sample_kind(&[Value::Null]), ValueKind::Unknown);
    }

    #[test]
    fn sample_agreement_boosts_score() {
        let mut sample_row = Row::new();
        sample_row.insert(
            "contact".to_string(),
            Value::String("someone@example.com".to_string()),
        );
        let mut email_table = table("person", &["contact"]);
        email_table.sample_rows = vec![sample_row];

        let props = vec![prop("ex:email", "email address", Some("Person"))];
        let with_samples = heuristic_match(&props, &[email_table], 0.0);
        let without_samples = heuristic_match(&props, &[table("person", &["contact"])], 0.0);
        assert!(with_samples[0].score.unwrap() > without_samples[0].score.unwrap());
    }

    #[test]
    fn threshold_is_clamped() {
        let req = MatchRequest {
            threshold: 7.5,
            ..request(
                vec![prop("ex:name", "name", None)],
                vec![table("t", &["name"])],
                MatchMode::Heuristic,
            )
        };
        // Clamped to 1.0; the run still yields one record per property.
        let response = run_match(&req).unwrap();
        assert_eq!(response.matches.len(), 1);
        assert_eq!(response.matches[0].table_name, "");
    }

    #[test]
    fn llm_mode_requires_configuration() {
        // Only meaningful when the variable is absent, which is the normal
        // test environment.
        if env::var("QWEN_API_KEY").is_ok() {
            return;
        }
        let req = request(vec![], vec![], MatchMode::Llm);
        assert!(matches!(run_match(&req), Err(MatchError::LlmNotConfigured)));
    }
}
