use async_trait::async_trait;
use eyre::{Result, bail, eyre};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::CaptionEntry;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// One caption track offered for a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackInfo {
    pub language_code: String,
    pub is_generated: bool,
    pub is_translatable: bool,
    #[serde(skip)]
    pub base_url: String,
}

/// Anything that can list and fetch caption tracks for a video ID
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Fetch captions in exactly this language, failing if the video has none.
    async fn fetch_preferred(&self, video_id: &str, lang: &str) -> Result<(TrackInfo, Vec<CaptionEntry>)>;

    async fn list_tracks(&self, video_id: &str) -> Result<Vec<TrackInfo>>;

    async fn fetch_track(&self, track: &TrackInfo) -> Result<Vec<CaptionEntry>>;
}

#[derive(Debug, Deserialize)]
struct InnerTubePlayerResponse {
    captions: Option<CaptionsData>,
}

#[derive(Debug, Deserialize)]
struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
struct CaptionTracklistRenderer {
    #[serde(rename = "captionTracks")]
    caption_tracks: Option<Vec<CaptionTrack>>,
}

#[derive(Debug, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode")]
    language_code: String,
    kind: Option<String>,
    #[serde(rename = "isTranslatable", default)]
    is_translatable: bool,
}

impl From<CaptionTrack> for TrackInfo {
    fn from(track: CaptionTrack) -> Self {
        TrackInfo {
            is_generated: track.kind.as_deref() == Some("asr"),
            language_code: track.language_code,
            is_translatable: track.is_translatable,
            base_url: track.base_url,
        }
    }
}

/// Caption source backed by YouTube's InnerTube player API
pub struct InnerTubeSource {
    client: reqwest::Client,
}

impl InnerTubeSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn player_tracks(&self, video_id: &str) -> Result<Vec<TrackInfo>> {
        // Step 1: Fetch the watch page to get the InnerTube API key
        let watch_url = format!("https://www.youtube.com/watch?v={video_id}");
        debug!("Fetching watch page: {watch_url}");

        let page_html = self
            .client
            .get(&watch_url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let api_key = extract_api_key(&page_html)?;
        debug!("Extracted InnerTube API key: {api_key}");

        // Step 2: Call InnerTube player endpoint
        let player_url = format!("https://www.youtube.com/youtubei/v1/player?key={api_key}&prettyPrint=false");

        let body = serde_json::json!({
            "context": {
                "client": {
                    "hl": "en",
                    "gl": "US",
                    "clientName": "WEB",
                    "clientVersion": "2.20241126.01.00"
                }
            },
            "videoId": video_id
        });

        let resp: InnerTubePlayerResponse = self
            .client
            .post(&player_url)
            .header("User-Agent", USER_AGENT)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let tracks = resp
            .captions
            .and_then(|c| c.player_captions_tracklist_renderer)
            .and_then(|r| r.caption_tracks)
            .unwrap_or_default();

        debug!("Video {video_id} offers {} caption track(s)", tracks.len());
        Ok(tracks.into_iter().map(TrackInfo::from).collect())
    }
}

#[async_trait]
impl CaptionSource for InnerTubeSource {
    async fn fetch_preferred(&self, video_id: &str, lang: &str) -> Result<(TrackInfo, Vec<CaptionEntry>)> {
        let tracks = self.player_tracks(video_id).await?;
        let track = pick_language_track(&tracks, lang)
            .ok_or_else(|| eyre!("no {lang} captions available for video {video_id}"))?
            .clone();
        let entries = self.fetch_track(&track).await?;
        Ok((track, entries))
    }

    async fn list_tracks(&self, video_id: &str) -> Result<Vec<TrackInfo>> {
        self.player_tracks(video_id).await
    }

    async fn fetch_track(&self, track: &TrackInfo) -> Result<Vec<CaptionEntry>> {
        debug!("Fetching caption track: lang={} generated={}", track.language_code, track.is_generated);

        let caption_xml = self
            .client
            .get(&track.base_url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_caption_xml(&caption_xml)
    }
}

/// Human-authored track in `lang` if there is one, else an auto-generated one
fn pick_language_track<'a>(tracks: &'a [TrackInfo], lang: &str) -> Option<&'a TrackInfo> {
    let mut in_lang = tracks.iter().filter(|t| t.language_code == lang);
    let first = in_lang.clone().next()?;
    Some(in_lang.find(|t| !t.is_generated).unwrap_or(first))
}

fn extract_api_key(html: &str) -> Result<String> {
    let re = Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#)?;
    if let Some(caps) = re.captures(html) {
        return Ok(caps[1].to_string());
    }

    // Fallback: try the newer pattern
    let re2 = Regex::new(r#"innertubeApiKey\s*[=:]\s*"([^"]+)""#)?;
    if let Some(caps) = re2.captures(html) {
        return Ok(caps[1].to_string());
    }

    bail!("could not extract InnerTube API key from watch page");
}

fn parse_caption_xml(xml: &str) -> Result<Vec<CaptionEntry>> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut current_start: Option<f64> = None;
    let mut current_dur: Option<f64> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"text" => {
                let mut start = None;
                let mut dur = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"start" => {
                            start = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
                        }
                        b"dur" => {
                            dur = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
                        }
                        _ => {}
                    }
                }
                current_start = start;
                // Some tracks omit dur on the last cue
                current_dur = dur.or(Some(0.0));
            }
            Ok(Event::Text(ref e)) => {
                if let (Some(start), Some(duration)) = (current_start.take(), current_dur.take()) {
                    let raw_text = e.unescape().unwrap_or_default().to_string();
                    let text = html_escape::decode_html_entities(&raw_text).replace('\n', " ");
                    let text = text.trim();
                    if !text.is_empty() {
                        entries.push(CaptionEntry {
                            text: text.to_string(),
                            start,
                            duration,
                        });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!("error parsing caption XML: {e}"),
            _ => {}
        }
    }

    Ok(entries)
}
