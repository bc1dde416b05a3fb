use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Output formats the service knows how to label.
///
/// The worker always emits whatever container its best-audio selection picks;
/// the requested format only drives the advertised filename and content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    #[default]
    Mp3,
    M4a,
    Opus,
    Wav,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 4] = [
        AudioFormat::Mp3,
        AudioFormat::M4a,
        AudioFormat::Opus,
        AudioFormat::Wav,
    ];

    /// Normalize a raw format token. Unknown tokens fall back to mp3 rather
    /// than erroring; existing callers of the endpoint rely on that leniency.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "m4a" => AudioFormat::M4a,
            "opus" => AudioFormat::Opus,
            "wav" => AudioFormat::Wav,
            _ => AudioFormat::Mp3,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Opus => "opus",
            AudioFormat::Wav => "wav",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Opus => "audio/ogg",
            AudioFormat::Wav => "audio/wav",
        }
    }
}

/// Why a raw request was rejected before any process was spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// No locator supplied at all.
    MissingInput,
    /// Locator does not match any known YouTube video URL shape.
    MalformedLocator,
}

impl ValidationError {
    /// Short machine-readable token for JSON error bodies.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::MissingInput => "missing_input",
            ValidationError::MalformedLocator => "malformed_locator",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingInput => write!(f, "URL is required"),
            ValidationError::MalformedLocator => {
                write!(f, "not a recognized YouTube video URL")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// A validated download request. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub locator: String,
    pub format: AudioFormat,
}

fn locator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(https?://)?((www|m|music)\.)?(youtube\.com/(watch\?v=|shorts/|embed/|v/)|youtu\.be/)[0-9A-Za-z_-]{11}",
        )
        .expect("locator regex should compile")
    })
}

/// Validate raw request parameters into a `DownloadRequest`.
///
/// The locator check is a structural prefix test: the video id segment must
/// start with 11 permitted characters, and anything after that (query
/// parameters, playlist context) is tolerated. Accepted shapes are watch,
/// shorts, embed and `v/` links plus `youtu.be` short links, each with an
/// optional `www`/`m`/`music` subdomain.
pub fn validate(locator: &str, format: Option<&str>) -> Result<DownloadRequest, ValidationError> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Err(ValidationError::MissingInput);
    }
    if !locator_regex().is_match(locator) {
        return Err(ValidationError::MalformedLocator);
    }

    Ok(DownloadRequest {
        locator: locator.to_string(),
        format: format.map(AudioFormat::from_token).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_known_url_shapes() {
        let urls = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "http://youtube.com/watch?v=dQw4w9WgXcQ",
            "youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLabc",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?t=42",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://music.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/v/dQw4w9WgXcQ",
        ];
        for url in urls {
            assert!(validate(url, None).is_ok(), "rejected {url}");
        }
    }

    #[test]
    fn test_rejects_malformed_locators() {
        let urls = [
            "not a url",
            "https://example.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?v=short",
            "https://youtube.com/playlist?list=PLabc",
            "https://youtu.be/",
            "ftp://youtube.com/watch?v=dQw4w9WgXcQ",
        ];
        for url in urls {
            assert!(
                matches!(validate(url, None), Err(ValidationError::MalformedLocator)),
                "accepted {url}"
            );
        }
    }

    #[test]
    fn test_empty_locator_is_missing_input() {
        assert!(matches!(
            validate("", Some("mp3")),
            Err(ValidationError::MissingInput)
        ));
        assert!(matches!(
            validate("   ", None),
            Err(ValidationError::MissingInput)
        ));
    }

    #[test]
    fn test_unknown_format_falls_back_to_mp3() {
        assert_eq!(AudioFormat::from_token("flac"), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_token(""), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_token("M4A"), AudioFormat::M4a);

        let request = validate("https://youtu.be/dQw4w9WgXcQ", Some("ogg-vorbis")).unwrap();
        assert_eq!(request.format, AudioFormat::Mp3);

        let request = validate("https://youtu.be/dQw4w9WgXcQ", None).unwrap();
        assert_eq!(request.format, AudioFormat::Mp3);
    }

    #[test]
    fn test_format_labels() {
        assert_eq!(AudioFormat::Mp3.extension(), "mp3");
        assert_eq!(AudioFormat::Mp3.content_type(), "audio/mpeg");
        assert_eq!(AudioFormat::M4a.content_type(), "audio/mp4");
    }
}
