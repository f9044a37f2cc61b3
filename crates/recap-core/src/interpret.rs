use serde_json::{Map, Value};

use crate::error::InterpretError;
use crate::timestamp::{extract_approximate_time, parse_timestamp};
use crate::types::{KeyPoint, StructuredSummary, TranscriptSegment};

pub const DEFAULT_MAX_KEY_POINTS: usize = 10;
pub const NO_OVERVIEW: &str = "No overview available.";

const SUMMARY_FIELDS: [&str; 3] = ["overview", "key_points", "keyPoints"];

/// Turns model output into a [`StructuredSummary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interpreter {
    max_key_points: usize,
}

impl Interpreter {
    pub fn new(max_key_points: usize) -> Self {
        Self { max_key_points }
    }

    /// Parse the summary payload out of `text`.
    ///
    /// The payload may be wrapped in prose or code fences. Partial output (an
    /// overview without points, or points without an overview) is accepted;
    /// only output with neither is an error.
    pub fn interpret(
        &self,
        text: &str,
        segments: &[TranscriptSegment],
    ) -> Result<StructuredSummary, InterpretError> {
        let payload = locate_payload(text).ok_or(InterpretError::NoPayload)?;

        let overview = payload
            .get("overview")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        let key_points: Vec<KeyPoint> = payload
            .get("key_points")
            .or_else(|| payload.get("keyPoints"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| key_point(item, segments))
                    .take(self.max_key_points)
                    .collect()
            })
            .unwrap_or_default();

        if overview.is_none() && key_points.is_empty() {
            return Err(InterpretError::NothingUsable);
        }

        Ok(StructuredSummary::new(
            overview.unwrap_or_else(|| NO_OVERVIEW.to_string()),
            key_points,
        ))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_KEY_POINTS)
    }
}

fn key_point(item: &Value, segments: &[TranscriptSegment]) -> Option<KeyPoint> {
    let item = item.as_object()?;
    let text = item
        .get("text")
        .or_else(|| item.get("point"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())?;
    let time = item
        .get("timestamp")
        .or_else(|| item.get("time"))
        .or_else(|| item.get("start"))?;
    let timestamp_seconds = coerce_time(time, segments)?;
    Some(KeyPoint {
        timestamp_seconds,
        text: text.to_string(),
    })
}

/// Raw numbers and clean timestamps are taken as-is; anything looser is
/// snapped to the nearest segment start.
fn coerce_time(value: &Value, segments: &[TranscriptSegment]) -> Option<f64> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .filter(|seconds| seconds.is_finite() && *seconds >= 0.0),
        Value::String(raw) => {
            let finite = |seconds: &f64| seconds.is_finite();
            if let Some(seconds) = parse_timestamp(raw).filter(finite) {
                return Some(seconds);
            }
            let approximate = extract_approximate_time(raw).filter(finite)?;
            Some(nearest_segment_start(approximate, segments).unwrap_or(approximate))
        }
        _ => None,
    }
}

fn nearest_segment_start(seconds: f64, segments: &[TranscriptSegment]) -> Option<f64> {
    let mut best: Option<f64> = None;
    for segment in segments {
        let start = segment.start_seconds;
        match best {
            Some(current) if (current - seconds).abs() <= (start - seconds).abs() => {}
            _ => best = Some(start),
        }
    }
    best
}

fn locate_payload(text: &str) -> Option<Map<String, Value>> {
    let trimmed = text.trim();
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        return Some(map);
    }
    largest_embedded_object(trimmed)
}

/// Largest well-formed JSON object embedded in `text`, preferring objects that
/// carry summary fields.
fn largest_embedded_object(text: &str) -> Option<Map<String, Value>> {
    let mut best: Option<((bool, usize), Map<String, Value>)> = None;
    let mut covered_until = 0;

    for (idx, _) in text.match_indices('{') {
        if idx < covered_until {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&text[idx..]).into_iter::<Value>();
        let Some(Ok(Value::Object(map))) = stream.next() else {
            continue;
        };
        let len = stream.byte_offset();
        covered_until = idx + len;

        let rank = (has_summary_fields(&map), len);
        if best.as_ref().is_none_or(|(best_rank, _)| rank > *best_rank) {
            best = Some((rank, map));
        }
    }

    best.map(|(_, map)| map)
}

fn has_summary_fields(map: &Map<String, Value>) -> bool {
    SUMMARY_FIELDS.iter().any(|field| map.contains_key(*field))
}
