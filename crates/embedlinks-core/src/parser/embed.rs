//! Parser for the embed page's `dataLink` payload
//!
//! Filters language groups and servers, runs the direct-link pass and maps
//! decrypted values back onto their server metadata.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::error::{EmbedError, Result};
use crate::types::{EmbedGroup, LinkValue, ResolvedLink};

/// A server entry that survived filtering, flattened with its language
#[derive(Debug, Clone, PartialEq)]
pub struct KeptEmbed {
    pub server: String,
    pub language: String,
    pub link: Value,
}

/// Parses the raw `dataLink` value read from the page
///
/// Groups and entries that do not have the expected shape are skipped so
/// the rest of the page stays usable.
///
/// # Errors
/// Returns `ParseError` if the value is not an array
pub fn parse_data_link(raw: Value) -> Result<Vec<EmbedGroup>> {
    let Value::Array(items) = raw else {
        return Err(EmbedError::ParseError(
            "dataLink is not an array".to_string(),
        ));
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<EmbedGroup>(item) {
            Ok(group) => Some(group),
            Err(e) => {
                debug!("skipping malformed dataLink group: {}", e);
                None
            }
        })
        .collect())
}

/// Keeps only groups whose language equals `language`
///
/// An empty `language` keeps every group.
pub fn retain_language(groups: Vec<EmbedGroup>, language: &str) -> Vec<EmbedGroup> {
    if language.is_empty() {
        return groups;
    }
    groups
        .into_iter()
        .filter(|g| g.language == language)
        .collect()
}

/// Keeps only embeds whose lower-cased server name is in `servers`
///
/// Comparison is case-insensitive on both sides. An empty `servers`
/// keeps every embed.
pub fn retain_servers(groups: Vec<EmbedGroup>, servers: &[String]) -> Vec<EmbedGroup> {
    let wanted = server_set(servers);
    if wanted.is_empty() {
        return groups;
    }
    groups
        .into_iter()
        .map(|mut g| {
            g.embeds
                .retain(|e| wanted.contains(&e.server.trim().to_lowercase()));
            g
        })
        .collect()
}

/// Applies both filters and flattens the result in page order
pub fn filter_embeds(groups: Vec<EmbedGroup>, servers: &[String], language: &str) -> Vec<KeptEmbed> {
    retain_servers(retain_language(groups, language), servers)
        .into_iter()
        .flat_map(|g| {
            let language = g.language;
            g.embeds.into_iter().map(move |e| KeptEmbed {
                server: e.server,
                language: language.clone(),
                link: e.link,
            })
        })
        .collect()
}

/// Emits every embed whose link is already a ready http(s) URL
pub fn direct_links(kept: &[KeptEmbed]) -> Vec<ResolvedLink> {
    kept.iter()
        .filter_map(|embed| {
            let value = LinkValue::from_value(&embed.link)?;
            let url = value.direct_url()?;
            Some(ResolvedLink::new(&embed.server, url, &embed.language))
        })
        .collect()
}

/// Raw link values to hand to the decryption routine, in filter order
pub fn decrypt_batch(kept: &[KeptEmbed]) -> Vec<Value> {
    kept.iter().map(|embed| embed.link.clone()).collect()
}

/// Pairs decrypted values positionally with the embeds they came from
///
/// Entries with no usable URL are dropped. Extra output values beyond the
/// batch length are ignored.
///
/// # Errors
/// Returns `Decryption` if the output is not an array or carries an
/// `error` field
pub fn map_decrypted(kept: &[KeptEmbed], output: &Value) -> Result<Vec<ResolvedLink>> {
    if let Some(err) = output.get("error") {
        return Err(EmbedError::Decryption(match err {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }));
    }

    let values = output.as_array().ok_or_else(|| {
        EmbedError::Decryption("decryption output is not an array".to_string())
    })?;

    Ok(kept
        .iter()
        .zip(values)
        .filter_map(|(embed, value)| {
            let decoded = LinkValue::from_value(value)?;
            let url = decoded.url()?;
            Some(ResolvedLink::new(&embed.server, url, &embed.language))
        })
        .collect())
}

/// Normalizes a link list
///
/// Trims and lower-cases server names, drops blank URLs, removes duplicate
/// `(server, link)` pairs and groups links by server in order of first
/// appearance. Applying it twice is the same as applying it once.
pub fn process_links_by_server(links: Vec<ResolvedLink>) -> Vec<ResolvedLink> {
    let mut order: Vec<String> = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut by_server: Vec<Vec<ResolvedLink>> = Vec::new();

    for link in links {
        let link = ResolvedLink::new(&link.server, &link.link, &link.language);
        if link.link.is_empty() {
            continue;
        }
        if !seen.insert((link.server.clone(), link.link.clone())) {
            continue;
        }
        match order.iter().position(|s| *s == link.server) {
            Some(idx) => by_server[idx].push(link),
            None => {
                order.push(link.server.clone());
                by_server.push(vec![link]);
            }
        }
    }

    by_server.into_iter().flatten().collect()
}

fn server_set(servers: &[String]) -> HashSet<String> {
    servers
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
