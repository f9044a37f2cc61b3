use recap_core::TranscriptSegment;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("no {language} transcript available for video {video_id}")]
    NotFound { video_id: String, language: String },
    #[error("transcript io error: {0}")]
    Io(#[from] io::Error),
    #[error("transcript {path} is invalid: {message}")]
    Invalid { path: String, message: String },
    #[error("video {video_id} is unavailable: {reason}")]
    Unavailable { video_id: String, reason: String },
    #[error("transcripts are disabled for video {video_id}")]
    Disabled { video_id: String },
    #[error("transcript request failed: {0}")]
    Network(String),
    #[error("no transcript languages to try")]
    NoLanguages,
}

/// Supplies timed transcript segments for a video in a given language.
pub trait TranscriptSource {
    fn name(&self) -> &'static str;
    fn fetch(
        &self,
        video_id: &str,
        language: &str,
    ) -> Result<Vec<TranscriptSegment>, TranscriptError>;
}

/// Reads `{dir}/{video_id}.{language}.json`, an array of `{text, start, duration}`.
pub struct FileTranscriptSource {
    dir: PathBuf,
}

impl FileTranscriptSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, video_id: &str, language: &str) -> PathBuf {
        self.dir.join(format!("{video_id}.{language}.json"))
    }
}

impl TranscriptSource for FileTranscriptSource {
    fn name(&self) -> &'static str {
        "file"
    }

    fn fetch(
        &self,
        video_id: &str,
        language: &str,
    ) -> Result<Vec<TranscriptSegment>, TranscriptError> {
        let path = self.path_for(video_id, language);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(TranscriptError::NotFound {
                    video_id: video_id.to_string(),
                    language: language.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        let segments: Vec<TranscriptSegment> =
            serde_json::from_str(&content).map_err(|e| TranscriptError::Invalid {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        if let Some(bad) = segments
            .iter()
            .find(|segment| !segment.start_seconds.is_finite() || segment.start_seconds < 0.0)
        {
            return Err(TranscriptError::Invalid {
                path: path.display().to_string(),
                message: format!("segment start {} is not a valid time", bad.start_seconds),
            });
        }
        Ok(segments)
    }
}

/// Try `languages` in order and return the first transcript found with its
/// language. Only a missing language moves on to the next one.
pub fn fetch_first_available(
    source: &dyn TranscriptSource,
    video_id: &str,
    languages: &[String],
) -> Result<(Vec<TranscriptSegment>, String), TranscriptError> {
    let mut last_error = TranscriptError::NoLanguages;
    for language in languages {
        match source.fetch(video_id, language) {
            Ok(segments) => {
                tracing::info!(source = source.name(), %language, segments = segments.len(), "transcript found");
                return Ok((segments, language.clone()));
            }
            Err(err @ TranscriptError::NotFound { .. }) => {
                tracing::debug!(%language, error = %err, "transcript unavailable");
                last_error = err;
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::{FileTranscriptSource, TranscriptError, TranscriptSource, fetch_first_available};
    use std::fs;

    const SAMPLE: &str = r#"[
        {"text": "Hallo zusammen.", "start": 0.0, "duration": 2.5},
        {"text": "Heute geht es um Rust.", "start": 2.5, "duration": 3.0}
    ]"#;

    fn langs(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn reads_segments_from_file() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("abc.de.json"), SAMPLE).unwrap();
        let source = FileTranscriptSource::new(temp.path());

        let segments = source.fetch("abc", "de").unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].start_seconds, 2.5);
        assert_eq!(segments[1].text, "Heute geht es um Rust.");
    }

    #[test]
    fn missing_language_is_not_found() {
        let temp = tempfile::tempdir().unwrap();
        let source = FileTranscriptSource::new(temp.path());
        assert!(matches!(
            source.fetch("abc", "en"),
            Err(TranscriptError::NotFound { .. })
        ));
    }

    #[test]
    fn malformed_file_is_invalid() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("abc.en.json"), "{\"not\": \"a list\"}").unwrap();
        fs::write(
            temp.path().join("neg.en.json"),
            r#"[{"text": "x", "start": -1.0, "duration": 1.0}]"#,
        )
        .unwrap();
        let source = FileTranscriptSource::new(temp.path());
        assert!(matches!(
            source.fetch("abc", "en"),
            Err(TranscriptError::Invalid { .. })
        ));
        assert!(matches!(
            source.fetch("neg", "en"),
            Err(TranscriptError::Invalid { .. })
        ));
    }

    #[test]
    fn tries_languages_in_order() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("abc.de.json"), SAMPLE).unwrap();
        fs::write(temp.path().join("abc.fr.json"), "[]").unwrap();
        let source = FileTranscriptSource::new(temp.path());

        let (segments, language) =
            fetch_first_available(&source, "abc", &langs(&["en", "de", "fr"])).unwrap();
        assert_eq!(language, "de");
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn invalid_transcript_stops_the_search() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("abc.en.json"), "not json").unwrap();
        fs::write(temp.path().join("abc.de.json"), SAMPLE).unwrap();
        let source = FileTranscriptSource::new(temp.path());

        let err = fetch_first_available(&source, "abc", &langs(&["en", "de"])).unwrap_err();
        assert!(matches!(err, TranscriptError::Invalid { .. }));
    }

    #[test]
    fn exhausted_languages_return_last_error() {
        let temp = tempfile::tempdir().unwrap();
        let source = FileTranscriptSource::new(temp.path());

        let err = fetch_first_available(&source, "abc", &langs(&["en", "ml"])).unwrap_err();
        assert!(err.to_string().contains("no ml transcript"));
        assert!(matches!(
            fetch_first_available(&source, "abc", &[]),
            Err(TranscriptError::NoLanguages)
        ));
    }
}
