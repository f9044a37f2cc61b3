use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const MAX_NAME_BYTES: usize = 255;
const DEFAULT_STEM: &str = "transcript";
const INVALID_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write output file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Turn a title into a filename stem that is safe on common filesystems.
pub fn sanitize_filename(title: &str) -> String {
    let mut sanitized = String::with_capacity(title.len());
    for ch in title.chars() {
        if INVALID_CHARS.contains(&ch) {
            continue;
        }
        let ch = if ch == ' ' { '_' } else { ch };
        if ch == '_' && sanitized.ends_with('_') {
            continue;
        }
        sanitized.push(ch);
    }

    let mut stem = sanitized.trim_matches('_').to_string();
    if stem.len() > MAX_NAME_BYTES {
        let mut cut = MAX_NAME_BYTES;
        while !stem.is_char_boundary(cut) {
            cut -= 1;
        }
        stem.truncate(cut);
    }

    if !stem.chars().any(char::is_alphanumeric) {
        return DEFAULT_STEM.to_string();
    }
    stem
}

/// Smallest free path among `{stem}.md`, `{stem}_1.md`, `{stem}_2.md`, ...
pub fn available_path(dir: &Path, stem: &str) -> PathBuf {
    let first = dir.join(format!("{stem}.md"));
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| dir.join(format!("{stem}_{n}.md")))
        .find(|path| !path.exists())
        .unwrap_or(first)
}

/// Write `content` under `dir` using a name derived from `title`. Returns the final path.
pub fn write_markdown(dir: &Path, title: &str, content: &str) -> Result<PathBuf, OutputError> {
    let wrap = |path: &Path| {
        let path = path.display().to_string();
        move |source: io::Error| OutputError::Write { path, source }
    };

    fs::create_dir_all(dir).map_err(wrap(dir))?;
    let stem = sanitize_filename(title);
    let path = available_path(dir, &stem);
    let tmp_path = dir.join(format!(".{stem}.md.tmp"));
    fs::write(&tmp_path, content).map_err(wrap(&tmp_path))?;
    fs::rename(&tmp_path, &path).map_err(wrap(&path))?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "output written");
    Ok(path)
}
