use serde::{Deserialize, Serialize};

/// A single timed caption segment. Start times are assumed monotonic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    #[serde(rename = "start")]
    pub start_seconds: f64,
    #[serde(rename = "duration", default)]
    pub duration_seconds: f64,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start_seconds: f64, duration_seconds: f64) -> Self {
        Self {
            text: text.into(),
            start_seconds,
            duration_seconds,
        }
    }
}

/// All segment texts joined with single spaces.
pub fn plain_text(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|segment| segment.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// End of the last segment, or zero for an empty transcript.
pub fn transcript_duration(segments: &[TranscriptSegment]) -> f64 {
    segments
        .last()
        .map(|segment| segment.start_seconds + segment.duration_seconds)
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub timestamp_seconds: f64,
    pub text: String,
}

/// Overview plus time-ordered key points. Produced by both the remote and the local path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredSummary {
    pub overview: String,
    pub key_points: Vec<KeyPoint>,
}

impl StructuredSummary {
    /// Build a summary, stably sorting key points by time.
    pub fn new(overview: String, mut key_points: Vec<KeyPoint>) -> Self {
        key_points.sort_by(|a, b| a.timestamp_seconds.total_cmp(&b.timestamp_seconds));
        Self {
            overview,
            key_points,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.overview.trim().is_empty() {
            return Err("overview is empty".into());
        }
        for point in &self.key_points {
            if !point.timestamp_seconds.is_finite() || point.timestamp_seconds < 0.0 {
                return Err(format!(
                    "key point has invalid timestamp {}",
                    point.timestamp_seconds
                ));
            }
            if point.text.trim().is_empty() {
                return Err("key point text is empty".into());
            }
        }
        let sorted = self
            .key_points
            .windows(2)
            .all(|pair| pair[0].timestamp_seconds <= pair[1].timestamp_seconds);
        if !sorted {
            return Err("key points are not sorted by timestamp".into());
        }
        Ok(())
    }
}

/// Which path produced a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Remote,
    Fallback,
}
