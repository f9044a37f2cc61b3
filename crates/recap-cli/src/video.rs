use thiserror::Error;

const BARE_ID_LEN: usize = 11;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VideoUrlError {
    #[error(
        "invalid video url {0}; expected youtube.com/watch?v=, youtu.be/ or youtube.com/shorts/"
    )]
    InvalidUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub video_id: String,
    pub original_url: String,
}

impl VideoRef {
    /// Placeholder title used until a real title source exists.
    pub fn default_title(&self) -> String {
        format!("Video_{}", self.video_id)
    }
}

pub fn parse_video_url(url: &str) -> Result<VideoRef, VideoUrlError> {
    let trimmed = url.trim();
    let video_id = extract_video_id(trimmed)
        .filter(|id| is_valid_id(id))
        .ok_or_else(|| VideoUrlError::InvalidUrl(trimmed.to_string()))?;
    Ok(VideoRef {
        video_id: video_id.to_string(),
        original_url: trimmed.to_string(),
    })
}

fn extract_video_id(url: &str) -> Option<&str> {
    if url.len() == BARE_ID_LEN && is_valid_id(url) {
        return Some(url);
    }

    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let split = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (host, tail) = rest.split_at(split);
    let host = host.to_ascii_lowercase();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .unwrap_or(&host);

    let tail = tail.split('#').next().unwrap_or_default();
    let (path, query) = match tail.split_once('?') {
        Some((path, query)) => (path, query),
        None => (tail, ""),
    };

    match host {
        "youtu.be" => first_segment(path.strip_prefix('/')?),
        "youtube.com" => {
            if path == "/watch" || path == "/watch/" {
                query
                    .split('&')
                    .find_map(|pair| pair.strip_prefix("v="))
                    .filter(|id| !id.is_empty())
            } else {
                first_segment(path.strip_prefix("/shorts/")?)
            }
        }
        _ => None,
    }
}

fn first_segment(path: &str) -> Option<&str> {
    path.split('/').next().filter(|segment| !segment.is_empty())
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}
