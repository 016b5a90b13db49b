//! Channel extraction: listing page → item page → enrichment.

use tracing::{debug, error, info, instrument, warn};

use channelwatch_crawler::{
    ExtractorChain, HttpFetcher, build_query, extract_description, item_url, listing_url,
    parse_listing,
};
use channelwatch_shared::{ChannelItem, ChannelWatchError, Result};

use crate::enrichment::SearchEnricher;

/// Fetches a channel's newest item and assembles its enriched payload.
pub struct ChannelExtractor {
    fetcher: HttpFetcher,
    chain: ExtractorChain,
    enricher: SearchEnricher,
    site_base_url: String,
}

impl ChannelExtractor {
    pub fn new(
        fetcher: HttpFetcher,
        enricher: SearchEnricher,
        site_base_url: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            chain: ExtractorChain::new(),
            enricher,
            site_base_url: site_base_url.into(),
        }
    }

    /// Fetch the newest item of `channel_id`, or `None` if it could not be
    /// extracted completely.
    ///
    /// All failures are logged here and never reach the caller.
    #[instrument(skip_all, fields(channel_id = %channel_id))]
    pub async fn fetch_latest(&self, channel_id: &str) -> Option<ChannelItem> {
        match self.try_fetch_latest(channel_id).await {
            Ok(item) => {
                debug!(item_id = %item.item_id, "fetched item data");
                Some(item)
            }
            Err(e @ ChannelWatchError::Parse { .. }) => {
                warn!(error = %e, "could not extract item data");
                None
            }
            Err(e) => {
                error!(error = %e, "error fetching item for channel");
                None
            }
        }
    }

    async fn try_fetch_latest(&self, channel_id: &str) -> Result<ChannelItem> {
        let listing = listing_url(&self.site_base_url, channel_id)?;
        let listing_html = self.fetcher.get_text(&listing).await?;
        let fields = parse_listing(&listing_html, &self.chain)?;

        let url = item_url(&self.site_base_url, &fields.item_id)?;
        let item_html = self.fetcher.get_text(&url).await?;
        let description = extract_description(&item_html);
        if description.is_empty() {
            debug!(item_id = %fields.item_id, "item has no description");
        }

        let query = build_query(&fields.title, &description);
        let search_results = self.enricher.search(&query).await;
        info!(
            item_id = %fields.item_id,
            results = search_results.len(),
            "item enriched"
        );

        Ok(ChannelItem {
            channel_id: channel_id.to_string(),
            item_id: fields.item_id,
            title: fields.title,
            url,
            thumbnail_url: fields.thumbnail_url,
            description,
            search_results,
        })
    }
}
