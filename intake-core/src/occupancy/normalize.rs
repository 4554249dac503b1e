//! Occupancy Normalization
//!
//! Older clients stored occupancy as a flat list of status names, or as a
//! JSON string, or not at all. Input is classified once into
//! [`RawAllocation`] and [`normalize`] always produces a list that covers
//! exactly twelve months.

use super::MONTHS_PER_YEAR;
use crate::types::{OccupancyAllocation, OccupancyStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Occupancy data as found in stored or submitted payloads
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RawAllocation {
    /// `{status, months}` pairs, possibly not summing to twelve
    Structured(Vec<OccupancyAllocation>),
    /// Status names without month counts
    LegacyStringList(Vec<String>),
    /// Allocations encoded inside a string
    Encoded(String),
    /// Nothing usable
    Malformed,
}

impl RawAllocation {
    /// Classify an untyped JSON value
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Array(items) if items.iter().all(Value::is_string) => {
                RawAllocation::LegacyStringList(
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                )
            }
            Value::Array(items) => {
                let parsed: Vec<OccupancyAllocation> =
                    items.iter().filter_map(loose_allocation).collect();
                if parsed.is_empty() {
                    RawAllocation::Malformed
                } else {
                    RawAllocation::Structured(parsed)
                }
            }
            Value::String(s) => RawAllocation::Encoded(s.clone()),
            _ => RawAllocation::Malformed,
        }
    }
}

impl From<Vec<OccupancyAllocation>> for RawAllocation {
    fn from(allocations: Vec<OccupancyAllocation>) -> Self {
        RawAllocation::Structured(allocations)
    }
}

/// Fallback used when nothing can be inferred
pub fn default_allocation() -> Vec<OccupancyAllocation> {
    vec![OccupancyAllocation::new(
        OccupancyStatus::PersonalUse,
        MONTHS_PER_YEAR,
    )]
}

/// Produce a best-effort allocation list summing to twelve months
///
/// Idempotent: normalizing an already normalized list returns it unchanged.
pub fn normalize(raw: RawAllocation) -> Vec<OccupancyAllocation> {
    match raw {
        RawAllocation::Structured(list) => normalize_structured(&list),
        RawAllocation::LegacyStringList(names) => normalize_legacy(&names),
        RawAllocation::Encoded(text) => normalize_encoded(&text),
        RawAllocation::Malformed => default_allocation(),
    }
}

fn status_index(status: OccupancyStatus) -> usize {
    match status {
        OccupancyStatus::PersonalUse => 0,
        OccupancyStatus::LongTermRent => 1,
        OccupancyStatus::ShortTermRent => 2,
    }
}

fn normalize_structured(list: &[OccupancyAllocation]) -> Vec<OccupancyAllocation> {
    let mut months = [0u32; 3];
    for alloc in list {
        let slot = &mut months[status_index(alloc.status)];
        *slot = slot.saturating_add(alloc.months).min(MONTHS_PER_YEAR);
    }

    let mut merged: Vec<OccupancyAllocation> = OccupancyStatus::ALL
        .iter()
        .zip(months)
        .filter(|(_, m)| *m > 0)
        .map(|(status, m)| OccupancyAllocation::new(*status, m))
        .collect();

    let total: u32 = merged.iter().map(|a| a.months).sum();
    if total == 0 {
        return default_allocation();
    }

    if total < MONTHS_PER_YEAR {
        let missing = MONTHS_PER_YEAR - total;
        match merged
            .iter_mut()
            .find(|a| a.status == OccupancyStatus::PersonalUse)
        {
            Some(personal) => personal.months += missing,
            None => merged.insert(
                0,
                OccupancyAllocation::new(OccupancyStatus::PersonalUse, missing),
            ),
        }
    } else if total > MONTHS_PER_YEAR {
        let mut excess = total - MONTHS_PER_YEAR;
        for alloc in merged.iter_mut().rev() {
            if excess == 0 {
                break;
            }
            let cut = excess.min(alloc.months);
            alloc.months -= cut;
            excess -= cut;
        }
        merged.retain(|a| a.months > 0);
    }

    merged
}

fn normalize_legacy(names: &[String]) -> Vec<OccupancyAllocation> {
    let mut statuses: Vec<OccupancyStatus> = Vec::new();
    for status in names.iter().filter_map(|n| OccupancyStatus::parse(n)) {
        if !statuses.contains(&status) {
            statuses.push(status);
        }
    }

    if statuses.is_empty() {
        return default_allocation();
    }

    let count = statuses.len() as u32;
    let base = MONTHS_PER_YEAR / count;
    let remainder = MONTHS_PER_YEAR % count;
    let inferred: Vec<OccupancyAllocation> = statuses
        .into_iter()
        .enumerate()
        .map(|(i, status)| {
            let extra = if (i as u32) < remainder { 1 } else { 0 };
            OccupancyAllocation::new(status, base + extra)
        })
        .collect();

    normalize_structured(&inferred)
}

fn normalize_encoded(text: &str) -> Vec<OccupancyAllocation> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return default_allocation();
    }

    match serde_json::from_str::<Value>(trimmed) {
        // Doubly encoded: read the inner text as status names
        Ok(Value::String(inner)) => normalize_legacy(&split_names(&inner)),
        Ok(value) => normalize(RawAllocation::from_json(&value)),
        Err(_) => normalize_legacy(&split_names(trimmed)),
    }
}

fn split_names(text: &str) -> Vec<String> {
    text.split([',', ';', '|'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read `{status, months}` from an object whose fields may be loosely typed
fn loose_allocation(value: &Value) -> Option<OccupancyAllocation> {
    let obj = value.as_object()?;
    let status = obj
        .get("status")
        .and_then(Value::as_str)
        .and_then(OccupancyStatus::parse)?;

    let months = match obj.get("months")? {
        Value::Number(n) => {
            if let Some(m) = n.as_u64() {
                m
            } else {
                let f = n.as_f64()?;
                if f.is_finite() && f > 0.0 {
                    f.round() as u64
                } else {
                    0
                }
            }
        }
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };

    Some(OccupancyAllocation::new(
        status,
        months.min(u64::from(u32::MAX)) as u32,
    ))
}

#[cfg(test)]
mod tests {
    use super::super::validate_allocations;
    use super::*;
    use serde_json::json;
    use OccupancyStatus::*;

    fn alloc(status: OccupancyStatus, months: u32) -> OccupancyAllocation {
        OccupancyAllocation::new(status, months)
    }

    fn samples() -> Vec<RawAllocation> {
        vec![
            RawAllocation::Structured(vec![]),
            RawAllocation::Structured(vec![alloc(LongTermRent, 12)]),
            RawAllocation::Structured(vec![alloc(ShortTermRent, 3), alloc(PersonalUse, 9)]),
            RawAllocation::Structured(vec![alloc(LongTermRent, 5)]),
            RawAllocation::Structured(vec![alloc(LongTermRent, 10), alloc(ShortTermRent, 10)]),
            RawAllocation::Structured(vec![alloc(PersonalUse, 40), alloc(PersonalUse, 2)]),
            RawAllocation::Structured(vec![alloc(PersonalUse, 12), alloc(LongTermRent, 0)]),
            RawAllocation::LegacyStringList(vec!["long_term".into(), "short-term".into()]),
            RawAllocation::LegacyStringList(vec![
                "personal".into(),
                "long_term_rent".into(),
                "short_term_rent".into(),
                "personal".into(),
            ]),
            RawAllocation::LegacyStringList(vec!["vacant".into()]),
            RawAllocation::Encoded(r#"[{"status":"short_term_rent","months":6}]"#.into()),
            RawAllocation::Encoded("personal_use, long_term_rent".into()),
            RawAllocation::Encoded("not json at all".into()),
            RawAllocation::Malformed,
        ]
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in samples() {
            let once = normalize(raw.clone());
            let twice = normalize(RawAllocation::Structured(once.clone()));
            assert_eq!(once, twice, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_normalized_output_always_validates() {
        for raw in samples() {
            let normalized = normalize(raw.clone());
            assert!(
                validate_allocations(&normalized).is_ok(),
                "invalid output {:?} for {:?}",
                normalized,
                raw
            );
        }
    }

    #[test]
    fn test_valid_list_unchanged() {
        let list = vec![alloc(PersonalUse, 2), alloc(LongTermRent, 10)];
        assert_eq!(normalize(list.clone().into()), list);
    }

    #[test]
    fn test_short_list_topped_up_with_personal_use() {
        assert_eq!(
            normalize(vec![alloc(LongTermRent, 5)].into()),
            vec![alloc(PersonalUse, 7), alloc(LongTermRent, 5)]
        );
    }

    #[test]
    fn test_overfull_list_trimmed_from_the_end() {
        assert_eq!(
            normalize(vec![alloc(LongTermRent, 10), alloc(ShortTermRent, 10)].into()),
            vec![alloc(LongTermRent, 10), alloc(ShortTermRent, 2)]
        );
    }

    #[test]
    fn test_legacy_list_split_evenly() {
        assert_eq!(
            normalize(RawAllocation::LegacyStringList(vec![
                "long_term".into(),
                "short_term".into()
            ])),
            vec![alloc(LongTermRent, 6), alloc(ShortTermRent, 6)]
        );
    }

    #[test]
    fn test_unusable_input_defaults_to_personal_use() {
        assert_eq!(normalize(RawAllocation::Malformed), default_allocation());
        assert_eq!(
            normalize(RawAllocation::LegacyStringList(vec!["vacant".into()])),
            default_allocation()
        );
        assert_eq!(normalize(RawAllocation::Encoded("  ".into())), default_allocation());
    }

    #[test]
    fn test_from_json_classification() {
        assert_eq!(
            RawAllocation::from_json(&json!(["personal_use"])),
            RawAllocation::LegacyStringList(vec!["personal_use".into()])
        );
        assert_eq!(
            RawAllocation::from_json(&json!([{"status": "long-term", "months": "12"}])),
            RawAllocation::Structured(vec![alloc(LongTermRent, 12)])
        );
        assert_eq!(
            RawAllocation::from_json(&json!("[]")),
            RawAllocation::Encoded("[]".into())
        );
        assert_eq!(RawAllocation::from_json(&json!(42)), RawAllocation::Malformed);
        assert_eq!(
            RawAllocation::from_json(&json!([{"foo": 1}])),
            RawAllocation::Malformed
        );
    }

    #[test]
    fn test_encoded_structured_payload() {
        assert_eq!(
            normalize(RawAllocation::Encoded(
                r#"[{"status":"short_term_rent","months":6}]"#.into()
            )),
            vec![alloc(PersonalUse, 6), alloc(ShortTermRent, 6)]
        );
    }
}
