use crate::types::{KeyPoint, StructuredSummary, TranscriptSegment};

pub const NO_CONTENT: &str = "No content available.";

const OVERVIEW_SEGMENTS: usize = 20;
const OVERVIEW_SENTENCES: usize = 3;
const OVERVIEW_MAX_CHARS: usize = 500;
const KEY_POINT_CONTEXT: usize = 5;
const KEY_POINT_MAX_CHARS: usize = 250;

/// Summarize a transcript without any model.
///
/// Deterministic and total: the same segments always give the same summary,
/// and an empty transcript gives the "no content" overview with no points.
pub fn summarize_locally(
    segments: &[TranscriptSegment],
    max_key_points: usize,
) -> StructuredSummary {
    let overview = overview(segments);
    let key_points = key_points(segments, max_key_points);
    StructuredSummary::new(overview, key_points)
}

fn overview(segments: &[TranscriptSegment]) -> String {
    let head = segments
        .iter()
        .take(OVERVIEW_SEGMENTS)
        .map(|segment| segment.text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let sentences: Vec<&str> = head
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .take(OVERVIEW_SENTENCES)
        .collect();
    if sentences.is_empty() {
        return NO_CONTENT.to_string();
    }

    let mut overview = truncate_at_word(&sentences.join(". "), OVERVIEW_MAX_CHARS);
    if !overview.ends_with('.') {
        overview.push('.');
    }
    overview
}

fn key_points(segments: &[TranscriptSegment], count: usize) -> Vec<KeyPoint> {
    if segments.is_empty() || count == 0 {
        return Vec::new();
    }
    let interval = (segments.len() / count).max(1);

    (0..segments.len())
        .step_by(interval)
        .filter_map(|idx| {
            let end = (idx + KEY_POINT_CONTEXT + 1).min(segments.len());
            let combined = segments[idx..end]
                .iter()
                .map(|segment| segment.text.trim())
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if combined.is_empty() {
                return None;
            }
            Some(KeyPoint {
                timestamp_seconds: segments[idx].start_seconds.max(0.0),
                text: truncate_at_word(&combined, KEY_POINT_MAX_CHARS),
            })
        })
        .take(count)
        .collect()
}

/// Cut `text` to at most `max_chars` characters plus an ellipsis, at the last
/// space when that keeps at least 70% of the budget.
fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    let min_keep = max_chars * 7 / 10;
    match cut.rfind(' ') {
        Some(pos) if cut[..pos].chars().count() > min_keep => format!("{}...", &cut[..pos]),
        _ => format!("{cut}..."),
    }
}

#[cfg(test)]
mod tests {
    use super::{NO_CONTENT, summarize_locally, truncate_at_word};
    use crate::types::TranscriptSegment;

    fn transcript(n: usize) -> Vec<TranscriptSegment> {
        (0..n)
            .map(|i| {
                let start = i as f64 * 10.0;
                TranscriptSegment::new(format!("Sentence number {i}."), start, 10.0)
            })
            .collect()
    }

    #[test]
    fn empty_transcript_has_no_content() {
        let summary = summarize_locally(&[], 10);
        assert_eq!(summary.overview, NO_CONTENT);
        assert!(summary.key_points.is_empty());
        assert!(summary.validate().is_ok());
    }

    #[test]
    fn blank_segments_have_no_content() {
        let segments = vec![TranscriptSegment::new("   ", 0.0, 1.0)];
        let summary = summarize_locally(&segments, 10);
        assert_eq!(summary.overview, NO_CONTENT);
        assert!(summary.key_points.is_empty());
    }

    #[test]
    fn overview_takes_first_three_sentences() {
        let summary = summarize_locally(&transcript(10), 10);
        assert_eq!(
            summary.overview,
            "Sentence number 0. Sentence number 1. Sentence number 2."
        );
    }

    #[test]
    fn key_points_are_evenly_spaced() {
        let segments = transcript(40);
        let summary = summarize_locally(&segments, 4);
        let times: Vec<_> = summary
            .key_points
            .iter()
            .map(|p| p.timestamp_seconds)
            .collect();
        assert_eq!(times, vec![0.0, 100.0, 200.0, 300.0]);
        assert!(summary.key_points[0].text.starts_with("Sentence number 0."));
        assert!(summary.key_points[0].text.contains("Sentence number 5."));
        assert!(!summary.key_points[0].text.contains("Sentence number 6."));
    }

    #[test]
    fn fewer_segments_than_points() {
        let summary = summarize_locally(&transcript(3), 10);
        assert_eq!(summary.key_points.len(), 3);
        assert!(summary.validate().is_ok());
    }

    #[test]
    fn output_is_deterministic() {
        let segments = transcript(57);
        let first = serde_json::to_string(&summarize_locally(&segments, 10)).unwrap();
        let second = serde_json::to_string(&summarize_locally(&segments, 10)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn long_text_is_truncated_at_word_boundary() {
        let text = "alpha ".repeat(100);
        let cut = truncate_at_word(text.trim(), 250);
        assert!(cut.ends_with("..."));
        assert!(cut.chars().count() <= 253);
        assert!(!cut.trim_end_matches("...").ends_with(' '));
    }

    #[test]
    fn truncation_handles_multibyte_text() {
        let text = "é".repeat(300);
        let cut = truncate_at_word(&text, 250);
        assert_eq!(cut.chars().count(), 253);
    }
}
