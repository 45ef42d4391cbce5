//! Parsers for embed pages
//!
//! `embed` handles the page's `dataLink` payload, `page` inspects the
//! rendered HTML.

pub mod embed;
pub mod page;

pub use embed::{filter_embeds, parse_data_link};
pub use page::find_not_found_marker;
