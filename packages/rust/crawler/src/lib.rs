//! Page fetching, context scraping, and channel page field extraction.
//!
//! This crate provides:
//! - [`HttpFetcher`] — shared HTTP GET capability with timeout and identification header
//! - [`ContextScraper`] — reduces a result page to bounded plain text
//! - [`extractors`] — ordered field extractor chain (structured parse, then patterns)
//! - [`listing`] — channel listing / item page parsing helpers

pub mod context;
pub mod extractors;
pub mod fetcher;
pub mod listing;

pub use context::{ContextScraper, MAX_CONTEXT_CHARS, visible_text};
pub use extractors::{
    CoreFields, ExtractorChain, FieldExtractor, ItemFields, PatternExtractor, StructuredExtractor,
};
pub use fetcher::HttpFetcher;
pub use listing::{
    DESCRIPTION_WORD_LIMIT, build_query, extract_description, item_url, listing_url,
    parse_listing, truncate_words,
};
