use recap_core::TranscriptSegment;
use recap_core::http::default_agent;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::sync::LazyLock;
use std::time::Duration;

use crate::transcript::{TranscriptError, TranscriptSource};

pub const YOUTUBE_BASE_URL: &str = "https://www.youtube.com";
const PLAYER_CLIENT_NAME: &str = "ANDROID";
const PLAYER_CLIENT_VERSION: &str = "20.10.38";

static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("api key pattern")
});
static CONSENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name="v" value="(.*?)""#).expect("consent pattern"));
static TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<text\s+start="([^"]*)"(?:\s+dur="([^"]*)")?[^>]*>(.*?)</text>"#)
        .expect("caption pattern")
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("tag pattern"));

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
    /// `asr` for auto-generated captions.
    #[serde(default)]
    kind: Option<String>,
}

impl CaptionTrack {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// Fetches captions from YouTube: the watch page yields the innertube key,
/// the player endpoint lists caption tracks, and the chosen track is
/// downloaded as timed text.
pub struct YouTubeTranscriptSource {
    agent: ureq::Agent,
    base_url: String,
    tracks: RefCell<Option<(String, Vec<CaptionTrack>)>>,
}

impl YouTubeTranscriptSource {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(YOUTUBE_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        Self {
            agent: default_agent(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            tracks: RefCell::new(None),
        }
    }

    /// Caption tracks for `video_id`, fetched once per video.
    fn caption_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>, TranscriptError> {
        if let Some((cached_id, tracks)) = self.tracks.borrow().as_ref()
            && cached_id == video_id
        {
            return Ok(tracks.clone());
        }

        let html = self.watch_page(video_id)?;
        let api_key = API_KEY_RE
            .captures(&html)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                if html.contains("class=\"g-recaptcha\"") {
                    unavailable(video_id, "YouTube asked for a captcha; too many requests")
                } else {
                    unavailable(video_id, "watch page has no innertube api key")
                }
            })?;

        let player = self.player(video_id, &api_key)?;
        let tracks = tracks_from_player(video_id, &player)?;
        tracing::debug!(%video_id, tracks = tracks.len(), "caption tracks listed");
        *self.tracks.borrow_mut() = Some((video_id.to_string(), tracks.clone()));
        Ok(tracks)
    }

    fn watch_page(&self, video_id: &str) -> Result<String, TranscriptError> {
        let url = format!("{}/watch?v={video_id}", self.base_url);
        let html = self.get_text(&url, None)?;
        if !html.contains("action=\"https://consent.youtube.com/s\"") {
            return Ok(html);
        }

        let value = CONSENT_RE
            .captures(&html)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| unavailable(video_id, "could not accept the cookie consent page"))?;
        let html = self.get_text(&url, Some(&format!("CONSENT=YES+{value}")))?;
        if html.contains("action=\"https://consent.youtube.com/s\"") {
            return Err(unavailable(video_id, "cookie consent was not accepted"));
        }
        Ok(html)
    }

    fn player(&self, video_id: &str, api_key: &str) -> Result<Value, TranscriptError> {
        let url = format!("{}/youtubei/v1/player?key={api_key}", self.base_url);
        let payload = json!({
            "context": {
                "client": {
                    "clientName": PLAYER_CLIENT_NAME,
                    "clientVersion": PLAYER_CLIENT_VERSION,
                }
            },
            "videoId": video_id,
        });
        let response = self
            .agent
            .post(&url)
            .header("Accept-Language", "en-US")
            .send_json(&payload)
            .map_err(network)?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(TranscriptError::Network(format!("player request returned HTTP {status}")));
        }
        response.into_body().read_json::<Value>().map_err(network)
    }

    fn get_text(&self, url: &str, cookie: Option<&str>) -> Result<String, TranscriptError> {
        let mut request = self.agent.get(url).header("Accept-Language", "en-US");
        if let Some(cookie) = cookie {
            request = request.header("Cookie", cookie);
        }
        let response = request.call().map_err(network)?;
        let status = response.status().as_u16();
        if status == 429 {
            return Err(TranscriptError::Network(
                "YouTube is rate limiting requests (HTTP 429)".into(),
            ));
        }
        if status != 200 {
            return Err(TranscriptError::Network(format!("GET {url} returned HTTP {status}")));
        }
        response.into_body().read_to_string().map_err(network)
    }
}

impl TranscriptSource for YouTubeTranscriptSource {
    fn name(&self) -> &'static str {
        "youtube"
    }

    fn fetch(
        &self,
        video_id: &str,
        language: &str,
    ) -> Result<Vec<TranscriptSegment>, TranscriptError> {
        let tracks = self.caption_tracks(video_id)?;
        let track = pick_track(&tracks, language).ok_or_else(|| TranscriptError::NotFound {
            video_id: video_id.to_string(),
            language: language.to_string(),
        })?;

        let url = track.base_url.replace("&fmt=srv3", "");
        let xml = self.get_text(&url, None)?;
        tracing::debug!(
            %video_id,
            %language,
            generated = track.is_generated(),
            "caption track downloaded"
        );
        Ok(parse_timed_text(&xml))
    }
}

/// Manually created captions win over generated ones in the same language.
fn pick_track<'a>(tracks: &'a [CaptionTrack], language: &str) -> Option<&'a CaptionTrack> {
    let matching = |track: &&CaptionTrack| track.language_code == language;
    tracks
        .iter()
        .filter(matching)
        .find(|track| !track.is_generated())
        .or_else(|| tracks.iter().find(matching))
}

fn tracks_from_player(
    video_id: &str,
    player: &Value,
) -> Result<Vec<CaptionTrack>, TranscriptError> {
    let playability = &player["playabilityStatus"];
    let status = playability["status"].as_str().unwrap_or("OK");
    if status != "OK" {
        let reason = playability["reason"]
            .as_str()
            .unwrap_or("video is not playable");
        return Err(unavailable(video_id, &format!("{status}: {reason}")));
    }

    let tracks = &player["captions"]["playerCaptionsTracklistRenderer"]["captionTracks"];
    if !tracks.is_array() {
        return Err(TranscriptError::Disabled {
            video_id: video_id.to_string(),
        });
    }
    serde_json::from_value(tracks.clone()).map_err(|e| TranscriptError::Invalid {
        path: format!("caption tracks for {video_id}"),
        message: e.to_string(),
    })
}

/// Segments out of a timed-text document. Markup inside a caption is
/// dropped and empty captions are skipped.
fn parse_timed_text(xml: &str) -> Vec<TranscriptSegment> {
    TEXT_RE
        .captures_iter(xml)
        .filter_map(|cap| {
            let start: f64 = cap.get(1)?.as_str().parse().ok()?;
            if !start.is_finite() || start < 0.0 {
                return None;
            }
            let duration = cap
                .get(2)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .unwrap_or(0.0);
            // Caption bodies are escaped twice: once as xml and once as html.
            let raw = unescape(&unescape(cap.get(3)?.as_str()));
            let text = TAG_RE.replace_all(&raw, "").replace('\n', " ");
            let text = text.trim();
            (!text.is_empty()).then(|| TranscriptSegment::new(text, start, duration))
        })
        .collect()
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let decoded = rest.find(';').and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|ch| (ch, end + 1))
        });
        match decoded {
            Some((ch, len)) => {
                out.push(ch);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn unavailable(video_id: &str, reason: &str) -> TranscriptError {
    TranscriptError::Unavailable {
        video_id: video_id.to_string(),
        reason: reason.to_string(),
    }
}

fn network(err: ureq::Error) -> TranscriptError {
    TranscriptError::Network(err.to_string())
}
