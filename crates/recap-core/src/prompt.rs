use crate::timestamp::format_timestamp;
use crate::types::TranscriptSegment;

/// Character budget for the transcript block, to stay inside model context limits.
pub const DEFAULT_TRANSCRIPT_BUDGET: usize = 8_000;
const TRUNCATION_MARKER: &str = "... (transcript truncated due to length)";

/// Render segments as `[MM:SS] text` lines, stopping before the rendered lines
/// and their newline separators exceed `budget` characters.
pub fn format_transcript(segments: &[TranscriptSegment], budget: usize) -> String {
    let mut lines = Vec::new();
    let mut used = 0;
    for segment in segments {
        let line = format!(
            "[{}] {}",
            format_timestamp(segment.start_seconds),
            segment.text.trim()
        );
        let cost = line.chars().count() + usize::from(!lines.is_empty());
        if used + cost > budget {
            lines.push(TRUNCATION_MARKER.to_string());
            break;
        }
        used += cost;
        lines.push(line);
    }
    lines.join("\n")
}

pub fn build_prompt(segments: &[TranscriptSegment], max_key_points: usize) -> String {
    const JSON_SCHEMA_SAMPLE: &str = r#"
{
    "overview": "2-3 sentence overview",
    "key_points": [
        {"timestamp": "MM:SS", "text": "Key point description"}
    ]
}
"#;
    let transcript = format_transcript(segments, DEFAULT_TRANSCRIPT_BUDGET);

    format!(
        r#"
<task>
Analyze this video transcript. Provide a brief 2-3 sentence overview of the main topic and key takeaways, and extract up to {max_key_points} key points with their timestamps.
</task>

<schema>
Respond with JSON only, matching this schema:
{schema}
</schema>

<rules>
- Keep the overview concise and informative
- Each key point is a complete, meaningful statement, not a fragment
- Use the exact timestamps that appear in the transcript
- Spread key points across the whole video
</rules>

<input_transcript>
{transcript}
</input_transcript>
"#,
        max_key_points = max_key_points,
        schema = JSON_SCHEMA_SAMPLE,
        transcript = transcript
    )
}
