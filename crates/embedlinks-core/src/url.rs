//! URL helper functions
//!
//! Builds embed page URLs and TMDB image URLs.

/// Default host of the embed pages
pub const EMBED_BASE_URL: &str = "https://embed69.org";

/// Default TMDB image CDN
pub const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";

/// Builds the embed page URL for a movie
///
/// # Example
/// ```
/// use embedlinks_core::url::build_movie_url;
/// let url = build_movie_url("https://embed69.org", "tt0137523");
/// assert_eq!(url, "https://embed69.org/f/tt0137523/");
/// ```
pub fn build_movie_url(base: &str, imdb_id: &str) -> String {
    format!("{}/f/{}/", base.trim_end_matches('/'), imdb_id)
}

/// Builds the embed page URL for one episode
///
/// The episode number is zero-padded to two digits.
///
/// # Example
/// ```
/// use embedlinks_core::url::build_episode_url;
/// let url = build_episode_url("https://embed69.org", "tt0903747", 1, 7);
/// assert_eq!(url, "https://embed69.org/f/tt0903747-1x07/");
/// ```
pub fn build_episode_url(base: &str, imdb_id: &str, season: u32, episode: u32) -> String {
    format!(
        "{}/f/{}-{}x{:02}/",
        base.trim_end_matches('/'),
        imdb_id,
        season,
        episode
    )
}

/// Builds a TMDB image URL for a size ("w92", "w500", "original")
///
/// Returns `None` when TMDB has no image for the slot.
///
/// # Example
/// ```
/// use embedlinks_core::url::build_image_url;
/// let url = build_image_url("https://image.tmdb.org/t/p", "w500", Some("/abc.jpg"));
/// assert_eq!(url.as_deref(), Some("https://image.tmdb.org/t/p/w500/abc.jpg"));
/// ```
pub fn build_image_url(base: &str, size: &str, path: Option<&str>) -> Option<String> {
    let path = path.map(str::trim).filter(|p| !p.is_empty())?;
    Some(format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        size,
        path.trim_start_matches('/')
    ))
}

/// Builds the TMDB search path for a query
///
/// URL encodes the query.
pub fn build_search_path(segment: &str, query: &str) -> String {
    format!("/search/{}?query={}", segment, urlencoding::encode(query))
}
