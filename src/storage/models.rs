use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Rendering strategy of a record, derived from the primary MIME segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Image,
    #[default]
    Other,
    Video,
}

impl MediaKind {
    /// Classify a MIME type string by its part before the first `/`.
    pub fn from_mime(mime_type: &str) -> Self {
        let primary = mime_type.split('/').next().unwrap_or("").trim();
        match primary.to_ascii_lowercase().as_str() {
            "audio" => MediaKind::Audio,
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            _ => MediaKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Image => "image",
            MediaKind::Other => "other",
            MediaKind::Video => "video",
        }
    }

    /// Kinds that can be shown as a tile (img, video or audio element).
    pub fn is_previewable(&self) -> bool {
        !matches!(self, MediaKind::Other)
    }
}

/// Metadata describing one uploaded media object.
///
/// Everything except `is_published` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub file_name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub media_kind: MediaKind,
    pub url: String,
    #[serde(rename = "size")]
    pub byte_size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub author: String,
    pub author_id: String,
    pub is_published: bool,
}

/// Wire shape accepted on input. Remote record APIs may omit the derived
/// kind, the size or the publish flag.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileRecordWire {
    id: String,
    file_name: String,
    #[serde(rename = "type")]
    mime_type: String,
    #[serde(default)]
    media_kind: Option<MediaKind>,
    url: String,
    #[serde(default, rename = "size")]
    byte_size: u64,
    uploaded_at: DateTime<Utc>,
    #[serde(default)]
    author: String,
    #[serde(default)]
    author_id: String,
    #[serde(default)]
    is_published: Option<bool>,
}

impl<'de> Deserialize<'de> for FileRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = FileRecordWire::deserialize(deserializer)?;
        let media_kind = wire
            .media_kind
            .unwrap_or_else(|| MediaKind::from_mime(&wire.mime_type));
        Ok(FileRecord {
            id: wire.id,
            file_name: wire.file_name,
            mime_type: wire.mime_type,
            media_kind,
            url: wire.url,
            byte_size: wire.byte_size,
            uploaded_at: wire.uploaded_at,
            author: wire.author,
            author_id: wire.author_id,
            is_published: wire.is_published.unwrap_or(false),
        })
    }
}
