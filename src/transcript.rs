use log::{debug, info, warn};

use crate::Transcript;
use crate::error::RetrievalError;
use crate::youtube::CaptionSource;

/// Fetch a transcript in `preferred`, falling back to the first usable track.
///
/// A fallback track is usable when it is auto-generated or is in `secondary`.
/// The first usable track in listing order wins.
pub async fn retrieve(
    source: &dyn CaptionSource,
    video_id: &str,
    preferred: &str,
    secondary: &str,
) -> Result<Transcript, RetrievalError> {
    let preferred_err = match source.fetch_preferred(video_id, preferred).await {
        Ok((track, entries)) => return build(video_id, track.language_code, entries),
        Err(e) => e,
    };
    warn!("Preferred {preferred} captions unavailable for {video_id}: {preferred_err:#}");

    let tracks = source
        .list_tracks(video_id)
        .await
        .map_err(|listing| RetrievalError::Unavailable {
            preferred: format!("{preferred_err:#}"),
            listing: format!("{listing:#}"),
        })?;

    for track in &tracks {
        debug!(
            "Track: lang={} generated={} translatable={}",
            track.language_code, track.is_generated, track.is_translatable
        );
    }

    let Some(track) = tracks
        .iter()
        .find(|t| t.is_generated || t.language_code == secondary)
    else {
        return Err(RetrievalError::NoSuitableTranscript { available: tracks });
    };

    info!("Falling back to {} captions (generated: {})", track.language_code, track.is_generated);
    let entries = source
        .fetch_track(track)
        .await
        .map_err(|e| RetrievalError::Fetch {
            language: track.language_code.clone(),
            reason: format!("{e:#}"),
        })?;

    build(video_id, track.language_code.clone(), entries)
}

fn build(video_id: &str, language: String, entries: Vec<crate::CaptionEntry>) -> Result<Transcript, RetrievalError> {
    if entries.is_empty() {
        return Err(RetrievalError::Empty { language });
    }
    Ok(Transcript {
        video_id: video_id.to_string(),
        language,
        entries,
    })
}
