//! Core data types for the embed link extractor
//!
//! Contains the request, page payload and response structures used
//! throughout the library.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Kind of title a catalog id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    #[serde(alias = "tv")]
    Series,
}

impl MediaKind {
    /// Path segment TMDB uses for this kind ("movie" or "tv")
    pub fn tmdb_segment(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "tv",
        }
    }

    pub fn is_series(&self) -> bool {
        matches!(self, MediaKind::Series)
    }
}

/// What to extract for a title
///
/// Season and episode numbers only exist for series targets, so a movie
/// request can never carry them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Movie,
    /// One specific episode
    Episode { season: u32, episode: u32 },
    /// Every episode of one season
    Season { season: u32 },
    /// Every episode of every season in `start..=end`
    SeasonRange { start: u32, end: u32 },
}

impl Target {
    pub fn kind(&self) -> MediaKind {
        match self {
            Target::Movie => MediaKind::Movie,
            _ => MediaKind::Series,
        }
    }
}

/// A validated extraction request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    /// TMDB id of the title
    pub tmdb_id: String,
    pub target: Target,
    /// Server names to keep, compared lower-cased. Empty keeps every server.
    pub servers: Vec<String>,
    /// Language code to keep (e.g. "LAT"). Empty keeps every language.
    pub language: String,
}

/// One language group of the page's `dataLink` variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedGroup {
    #[serde(rename = "video_language", alias = "language", default, deserialize_with = "lenient_string")]
    pub language: String,

    /// Entries that fail to parse are skipped
    #[serde(rename = "sortedEmbeds", alias = "embeds", default, deserialize_with = "lenient_entries")]
    pub embeds: Vec<EmbedEntry>,
}

/// One server entry inside an [`EmbedGroup`]
///
/// `link` is kept as raw JSON: it may be a ready URL, an encrypted
/// token or a wrapper object, depending on the page revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedEntry {
    #[serde(
        rename = "servername",
        alias = "server",
        alias = "serverName",
        default,
        deserialize_with = "lenient_string"
    )]
    pub server: String,

    #[serde(default)]
    pub link: Value,

    #[serde(rename = "type", default, deserialize_with = "lenient_opt_string")]
    pub kind: Option<String>,
}

/// Page fields drift between revisions; anything that is not text
/// (null, numbers, objects) is coerced instead of failing the whole page.
fn coerce_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(coerce_text(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(coerce_text(Value::deserialize(deserializer)?))
}

fn lenient_entries<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<EmbedEntry>, D::Error> {
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// The three shapes a link or decrypted value takes on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkValue {
    /// A bare string
    Direct(String),
    /// An object carrying a string `.link` property
    Wrapped(String),
    /// An array whose first element is the usable URL
    ///
    /// Items are resolved in place; an item carrying no URL is kept as an
    /// empty string.
    Sequence(Vec<String>),
}

impl LinkValue {
    /// Classifies a raw JSON value, returning `None` for shapes that never
    /// carry a URL (numbers, null, objects without `.link`).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(LinkValue::Direct(s.clone())),
            Value::Object(map) => map
                .get("link")
                .and_then(Value::as_str)
                .map(|s| LinkValue::Wrapped(s.to_string())),
            // Positions are kept so the first element stays the primary URL
            Value::Array(items) => Some(LinkValue::Sequence(
                items
                    .iter()
                    .map(|item| {
                        LinkValue::from_value(item)
                            .and_then(|v| v.url().map(str::to_string))
                            .unwrap_or_default()
                    })
                    .collect(),
            )),
            _ => None,
        }
    }

    /// The usable URL, if any
    pub fn url(&self) -> Option<&str> {
        let candidate = match self {
            LinkValue::Direct(s) | LinkValue::Wrapped(s) => s.as_str(),
            LinkValue::Sequence(items) => items.first()?.as_str(),
        };
        let trimmed = candidate.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// A ready-to-play URL as exposed directly on the page
    ///
    /// Only bare strings and wrapper objects qualify, and only when the
    /// value already looks like an http(s) URL rather than a token.
    pub fn direct_url(&self) -> Option<&str> {
        match self {
            LinkValue::Direct(_) | LinkValue::Wrapped(_) => {
                self.url().filter(|url| url.starts_with("http"))
            }
            LinkValue::Sequence(_) => None,
        }
    }
}

/// A playable link resolved for one server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedLink {
    /// Lower-cased server name (e.g. "vidcloud")
    pub server: String,
    pub link: String,
    pub language: String,
}

impl ResolvedLink {
    pub fn new(server: &str, link: &str, language: &str) -> Self {
        Self {
            server: server.trim().to_lowercase(),
            link: link.trim().to_string(),
            language: language.to_string(),
        }
    }
}

/// Why a page yielded nothing at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Body text matched a "not found" marker
    NotFoundMarker(String),
    /// Navigation did not settle in time
    NavigationTimeout,
    /// `dataLink` never became a non-empty array
    DataTimeout,
    /// Browser launch failure, protocol error or panic
    Fault(String),
}

/// Result of extracting one movie or episode page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// At least one link matched
    Found(Vec<ResolvedLink>),
    /// The title or episode does not exist (or could not be reached)
    Unavailable(UnavailableReason),
    /// The page loaded but no server/language combination matched
    Empty,
}

impl ExtractionOutcome {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ExtractionOutcome::Unavailable(_))
    }

    /// Links carried by the outcome; empty for `Unavailable` and `Empty`
    pub fn into_links(self) -> Vec<ResolvedLink> {
        match self {
            ExtractionOutcome::Found(links) => links,
            _ => Vec::new(),
        }
    }
}

/// One season of a series as listed by TMDB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonInfo {
    pub season_number: u32,
    pub episode_count: u32,
}

/// Overall status of an extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    Success,
    Error,
    Stopped,
}

/// Links found for one episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeLinks {
    pub episode: u32,
    pub links: Vec<ResolvedLink>,
}

/// Episodes processed for one season
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonLinks {
    pub season: u32,
    pub episodes: Vec<EpisodeLinks>,
}

/// Payload of a successful (or stopped) extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractionData {
    Movie { movie: Vec<ResolvedLink> },
    Series { seasons: Vec<SeasonLinks> },
}

/// Response body of an extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub status: ExtractionStatus,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<ExtractionData>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub warning: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
}

impl ExtractionReport {
    /// An error report carrying only a user-facing message
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ExtractionStatus::Error,
            data: None,
            warning: None,
            message: Some(message.into()),
        }
    }
}

/// A ranked TMDB search match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: u64,
    pub title: String,
    /// First four characters of the release or first-air date
    pub year: Option<String>,
    pub kind: MediaKind,
    /// Small poster thumbnail URL
    pub poster: Option<String>,
}

/// Still image of one episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeStill {
    pub episode: u32,
    pub name: Option<String>,
    pub still_url: Option<String>,
}

/// Episode stills of one season
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonStills {
    pub season: u32,
    pub episodes: Vec<EpisodeStill>,
}

/// Enrichment metadata for a title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleMetadata {
    pub id: u64,
    pub title: String,
    pub overview: Option<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub seasons: Option<Vec<SeasonStills>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_embed_group_deserializes_page_shape() {
        let raw = json!([
            {
                "video_language": "LAT",
                "sortedEmbeds": [
                    { "servername": "VidCloud", "link": "https://vidcloud.example/e/1", "type": "video" },
                    { "servername": "streamwish", "link": "eyJhbGciOi.token", "type": "video" }
                ]
            }
        ]);

        let groups: Vec<EmbedGroup> = serde_json::from_value(raw).expect("page shape should parse");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].language, "LAT");
        assert_eq!(groups[0].embeds.len(), 2);
        assert_eq!(groups[0].embeds[0].server, "VidCloud");
        assert_eq!(groups[0].embeds[0].kind.as_deref(), Some("video"));
    }

    #[test]
    fn test_embed_group_tolerates_missing_fields() {
        let raw = json!([{ "video_language": "SUB" }, { "sortedEmbeds": [{ "link": "x" }] }]);
        let groups: Vec<EmbedGroup> = serde_json::from_value(raw).expect("sparse shape should parse");
        assert!(groups[0].embeds.is_empty());
        assert_eq!(groups[1].language, "");
        assert_eq!(groups[1].embeds[0].server, "");
        assert_eq!(groups[1].embeds[0].kind, None);
    }

    #[test]
    fn test_link_value_shapes() {
        assert_eq!(
            LinkValue::from_value(&json!("https://a")),
            Some(LinkValue::Direct("https://a".to_string()))
        );
        assert_eq!(
            LinkValue::from_value(&json!({ "link": "https://b" })),
            Some(LinkValue::Wrapped("https://b".to_string()))
        );
        assert_eq!(
            LinkValue::from_value(&json!(["https://c", "backup"])),
            Some(LinkValue::Sequence(vec!["https://c".to_string(), "backup".to_string()]))
        );
        assert_eq!(
            LinkValue::from_value(&json!([{ "link": "https://primary" }, "https://mirror"]))
                .as_ref()
                .and_then(LinkValue::url),
            Some("https://primary")
        );
        assert_eq!(
            LinkValue::from_value(&json!([42, "https://mirror"]))
                .as_ref()
                .and_then(LinkValue::url),
            None
        );
        assert_eq!(LinkValue::from_value(&json!({ "url": "https://d" })), None);
        assert_eq!(LinkValue::from_value(&json!(42)), None);
        assert_eq!(LinkValue::from_value(&Value::Null), None);
    }

    #[test]
    fn test_embed_entry_tolerates_wrong_field_types() {
        let raw = json!([{
            "video_language": "LAT",
            "sortedEmbeds": [
                { "servername": "vidcloud", "link": "https://ok", "type": 1 },
                { "servername": null, "link": "tok" },
                "not an entry",
                { "servername": 7, "link": "https://seven", "type": null }
            ]
        }, {
            "video_language": null,
            "sortedEmbeds": null
        }]);

        let groups: Vec<EmbedGroup> = serde_json::from_value(raw).expect("drifted shape should parse");
        assert_eq!(groups[0].embeds.len(), 3);
        assert_eq!(groups[0].embeds[0].server, "vidcloud");
        assert_eq!(groups[0].embeds[0].kind.as_deref(), Some("1"));
        assert_eq!(groups[0].embeds[1].server, "");
        assert_eq!(groups[0].embeds[2].server, "7");
        assert_eq!(groups[0].embeds[2].kind, None);
        assert_eq!(groups[1].language, "");
        assert!(groups[1].embeds.is_empty());
    }

    #[test]
    fn test_link_value_url() {
        assert_eq!(LinkValue::Direct(" https://a ".into()).url(), Some("https://a"));
        assert_eq!(LinkValue::Sequence(vec!["https://c".into()]).url(), Some("https://c"));
        assert_eq!(LinkValue::Sequence(vec![]).url(), None);
        assert_eq!(LinkValue::Wrapped("   ".into()).url(), None);
    }

    #[test]
    fn test_link_value_direct_url_requires_http() {
        assert_eq!(LinkValue::Direct("http://a".into()).direct_url(), Some("http://a"));
        assert_eq!(LinkValue::Wrapped("https://b".into()).direct_url(), Some("https://b"));
        assert_eq!(LinkValue::Direct("eyJ0eXAi".into()).direct_url(), None);
        assert_eq!(LinkValue::Sequence(vec!["https://c".into()]).direct_url(), None);
    }

    #[test]
    fn test_resolved_link_normalizes_server() {
        let link = ResolvedLink::new("  VidCloud ", "http://x ", "LAT");
        assert_eq!(link.server, "vidcloud");
        assert_eq!(link.link, "http://x");
        assert_eq!(link.language, "LAT");
    }

    #[test]
    fn test_media_kind_serde() {
        let kind: MediaKind = serde_json::from_str("\"series\"").unwrap();
        assert_eq!(kind, MediaKind::Series);
        let kind: MediaKind = serde_json::from_str("\"tv\"").unwrap();
        assert_eq!(kind, MediaKind::Series);
        assert_eq!(serde_json::to_string(&MediaKind::Movie).unwrap(), "\"movie\"");
        assert_eq!(MediaKind::Series.tmdb_segment(), "tv");
    }

    #[test]
    fn test_report_serialization_skips_empty_fields() {
        let report = ExtractionReport::error("TMDB ID requerido");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json, json!({ "status": "error", "message": "TMDB ID requerido" }));
    }

    #[test]
    fn test_series_data_serialization() {
        let data = ExtractionData::Series {
            seasons: vec![SeasonLinks {
                season: 1,
                episodes: vec![EpisodeLinks {
                    episode: 2,
                    links: vec![ResolvedLink::new("vidcloud", "http://v", "LAT")],
                }],
            }],
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(
            json,
            json!({ "seasons": [{ "season": 1, "episodes": [{ "episode": 2, "links": [
                { "server": "vidcloud", "link": "http://v", "language": "LAT" }
            ]}]}]})
        );
    }
}
