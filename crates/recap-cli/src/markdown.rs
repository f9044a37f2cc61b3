use recap_core::timestamp::format_timestamp;
use recap_core::{ModelFamily, Provenance, StructuredSummary, TranscriptSegment, plain_text};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const UNTITLED: &str = "Untitled Video";

pub struct Document<'a> {
    pub title: &'a str,
    pub provenance: Provenance,
    pub family: Option<ModelFamily>,
    pub generated_at: &'a str,
}

pub fn now_rfc3339() -> Result<String, time::error::Format> {
    OffsetDateTime::now_utc().format(&Rfc3339)
}

/// Newlines become spaces; a blank title becomes "Untitled Video".
pub fn sanitize_title(title: &str) -> String {
    let single_line = title.replace(['\r', '\n'], " ");
    let trimmed = single_line.trim();
    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Title, overview, key points, summary, then the full transcript.
pub fn render(
    doc: &Document<'_>,
    summary: &StructuredSummary,
    segments: &[TranscriptSegment],
) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", sanitize_title(doc.title)));
    out.push_str(&format!(
        "_Summary: {}, generated {}_\n\n",
        provenance_label(doc.provenance, doc.family),
        doc.generated_at
    ));

    out.push_str("## Overview\n\n");
    out.push_str(&summary.overview);
    out.push_str("\n\n");

    out.push_str("## Key Points\n\n");
    for point in &summary.key_points {
        out.push_str(&format!(
            "- **{}** - {}\n",
            format_timestamp(point.timestamp_seconds),
            point.text
        ));
    }
    out.push('\n');

    out.push_str("## Summary\n\n");
    out.push_str(&summary.overview);
    out.push_str("\n\n");

    out.push_str("## Full Transcript\n\n");
    out.push_str(&plain_text(segments));
    out.push('\n');
    out
}

fn provenance_label(provenance: Provenance, family: Option<ModelFamily>) -> String {
    match (provenance, family) {
        (Provenance::Remote, Some(family)) => format!("{family} model"),
        (Provenance::Remote, None) => "remote model".to_string(),
        (Provenance::Fallback, _) => "local fallback".to_string(),
    }
}
