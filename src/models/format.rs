//! Upstream format catalog models
//!
//! These mirror the JSON the bridge returns from `GET /formats/{videoId}`.
//! The catalog is loose about types (ids and heights sometimes arrive as
//! numbers, sometimes as strings), so deserialization is lenient and never
//! rejects a whole list because of one odd row.

use serde::{Deserialize, Deserializer, Serialize};

/// Body of `GET /formats/{videoId}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatsResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub formats: Vec<FormatDescriptor>,
}

/// One upstream-reported encoding variant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// Catalog-scoped variant id ("itag")
    #[serde(
        rename = "itag",
        alias = "format_id",
        alias = "formatId",
        default,
        deserialize_with = "lenient_string"
    )]
    pub format_id: String,
    /// Container / file extension
    #[serde(rename = "ext", alias = "container", default)]
    pub container: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub has_video: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub has_audio: bool,
    #[serde(rename = "vcodec", default, deserialize_with = "lenient_opt_string")]
    pub video_codec: Option<String>,
    #[serde(rename = "acodec", default, deserialize_with = "lenient_opt_string")]
    pub audio_codec: Option<String>,
    #[serde(rename = "height", default, deserialize_with = "lenient_u32")]
    pub height_pixels: Option<u32>,
    /// Total bitrate in kbit/s
    #[serde(rename = "tbr", default, deserialize_with = "lenient_f64")]
    pub bitrate: Option<f64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_string"
    )]
    pub quality_label: Option<String>,
}

/// How a variant carries its streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatClass {
    /// Audio and video in one stream
    Progressive,
    /// Video without audio
    VideoOnly,
    /// Audio-only or no video at all; never offered
    Unusable,
}

impl FormatDescriptor {
    pub fn new<S: Into<String>>(format_id: S) -> Self {
        Self {
            format_id: format_id.into(),
            ..Default::default()
        }
    }

    /// Progressive audio+video variant (builder for tests and fixtures)
    pub fn progressive<S: Into<String>>(format_id: S, container: &str, height: u32) -> Self {
        Self {
            format_id: format_id.into(),
            container: Some(container.to_string()),
            has_video: true,
            has_audio: true,
            video_codec: Some("avc1.42001E".to_string()),
            audio_codec: Some("mp4a.40.2".to_string()),
            height_pixels: Some(height),
            ..Default::default()
        }
    }

    /// Video-only variant (builder for tests and fixtures)
    pub fn video_only<S: Into<String>>(
        format_id: S,
        container: &str,
        codec: &str,
        height: u32,
    ) -> Self {
        Self {
            format_id: format_id.into(),
            container: Some(container.to_string()),
            has_video: true,
            has_audio: false,
            video_codec: Some(codec.to_string()),
            audio_codec: None,
            height_pixels: Some(height),
            ..Default::default()
        }
    }

    pub fn classify(&self) -> FormatClass {
        match (self.has_video, self.has_audio) {
            (true, true) => FormatClass::Progressive,
            (true, false) => FormatClass::VideoOnly,
            _ => FormatClass::Unusable,
        }
    }

    /// Trimmed format id, `None` when blank
    pub fn trimmed_id(&self) -> Option<&str> {
        let id = self.format_id.trim();
        (!id.is_empty()).then_some(id)
    }

    pub fn height(&self) -> u32 {
        self.height_pixels.unwrap_or(0)
    }

    /// Whether the video codec is AVC / H.264
    pub fn is_avc(&self) -> bool {
        let codec = self.video_codec.as_deref().unwrap_or("").to_lowercase();
        codec.contains("avc") || codec.contains("h264")
    }

    pub fn is_mp4(&self) -> bool {
        self.container
            .as_deref()
            .is_some_and(|ext| ext.trim().eq_ignore_ascii_case("mp4"))
    }

    /// Container to advertise, `mp4` when the catalog left it blank
    pub fn container_or_default(&self) -> String {
        match self.container.as_deref().map(str::trim) {
            Some(ext) if !ext.is_empty() => ext.to_string(),
            _ => "mp4".to_string(),
        }
    }
}

/// Normalize codec names for comparison and advertisement.
///
/// Catalog codec strings carry profile suffixes (`avc1.64001F`, `mp4a.40.2`);
/// only the family is kept. Returns `None` for blank or `none`.
pub fn normalize_codec_name(codec: &str) -> Option<String> {
    let lowered = codec.trim().to_lowercase();
    let family = lowered.split('.').next().unwrap_or("");
    let normalized = match family {
        "" | "none" => return None,
        "h264" | "avc" | "avc1" | "avc3" => "h264",
        "h265" | "hevc" | "hev1" | "hvc1" => "h265",
        "vp9" | "vp09" => "vp9",
        "av1" | "av01" => "av1",
        "aac" | "mp4a" => "aac",
        "mp3" | "mp3float" => "mp3",
        "ac3" | "ac-3" => "ac3",
        "eac3" | "eac-3" | "ec-3" => "eac3",
        other => other,
    };
    Some(normalized.to_string())
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<FormatDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<FormatDescriptor>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Flag(bool),
    Other(serde::de::IgnoredAny),
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Text(s)) => s,
        Some(Loose::Unsigned(n)) => n.to_string(),
        Some(Loose::Signed(n)) => n.to_string(),
        Some(Loose::Float(f)) => f.to_string(),
        Some(Loose::Flag(_)) | Some(Loose::Other(_)) | None => String::new(),
    })
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Text(s)) => Some(s),
        Some(Loose::Unsigned(n)) => Some(n.to_string()),
        Some(Loose::Signed(n)) => Some(n.to_string()),
        Some(Loose::Float(f)) => Some(f.to_string()),
        Some(Loose::Flag(_)) | Some(Loose::Other(_)) | None => None,
    })
}

/// `true`, `1`, `"true"`, `"yes"` and `"1"` count as set; anything else does not
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Flag(b)) => b,
        Some(Loose::Text(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "1"
        ),
        Some(Loose::Unsigned(n)) => n != 0,
        Some(Loose::Signed(n)) => n != 0,
        Some(Loose::Float(f)) => f != 0.0,
        Some(Loose::Other(_)) | None => false,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Float(f)) => Some(f),
        Some(Loose::Unsigned(n)) => Some(n as f64),
        Some(Loose::Signed(n)) => Some(n as f64),
        Some(Loose::Text(s)) => s.trim().parse::<f64>().ok(),
        Some(Loose::Flag(_)) | Some(Loose::Other(_)) | None => None,
    };
    Ok(value.filter(|f| f.is_finite()))
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Text(s)) => {
            let s = s.trim();
            s.parse::<u32>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(f64_to_u32))
        }
        Some(Loose::Unsigned(n)) => u32::try_from(n).ok(),
        Some(Loose::Signed(n)) => u32::try_from(n).ok(),
        Some(Loose::Float(f)) => f64_to_u32(f),
        Some(Loose::Flag(_)) | Some(Loose::Other(_)) | None => None,
    })
}

fn f64_to_u32(f: f64) -> Option<u32> {
    (f.is_finite() && f >= 0.0 && f <= u32::MAX as f64).then(|| f as u32)
}
