//! Best-effort media download (§4.1 step 2): write a downloaded attachment
//! to `{media_root}/{kind_folder}/{iso-timestamp}_{message-id}.{ext}`.

use chrono::{DateTime, Utc};

use triagebot_core::types::{MediaDescriptor, MessageKind};

use crate::chat_transport::{ChatTransport, MediaRef};

/// Download `media_ref` and persist it under `media_root`, returning a
/// [`MediaDescriptor`] with `local_path` set on success or left `None` on
/// any failure — a failed download never blocks the inbound pipeline.
pub async fn download_and_store(
    transport: &dyn ChatTransport,
    media_root: &str,
    message_id: &str,
    at: DateTime<Utc>,
    media_ref: &MediaRef,
) -> MediaDescriptor {
    let base = MediaDescriptor {
        kind: media_ref.kind,
        mime: media_ref.mime.clone(),
        size_bytes: media_ref.size_bytes,
        local_path: None,
    };

    let Some(folder) = media_ref.kind.media_folder() else {
        return base;
    };

    match transport.download_media(media_ref).await {
        Ok(downloaded) => {
            let dir = std::path::Path::new(media_root).join(folder);
            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                tracing::warn!(error = %e, "failed to create media directory");
                return base;
            }

            let ext = extension_for_mime(&downloaded.mime);
            let filename = format!("{}_{message_id}.{ext}", at.to_rfc3339());
            let path = dir.join(&filename);

            match tokio::fs::write(&path, &downloaded.bytes).await {
                Ok(()) => MediaDescriptor {
                    local_path: Some(path.to_string_lossy().into_owned()),
                    ..base
                },
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "failed to write downloaded media");
                    base
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, message_id, "media download failed");
            base
        }
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "audio/ogg" => "ogg",
        "audio/mpeg" => "mp3",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_mime_types() {
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("application/pdf"), "pdf");
        assert_eq!(extension_for_mime("application/x-unknown"), "bin");
    }

    #[test]
    fn kinds_without_a_folder_skip_download() {
        assert!(MessageKind::Text.media_folder().is_none());
        assert!(MessageKind::Image.media_folder().is_some());
    }
}
