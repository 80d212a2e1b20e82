use std::future::Future;

use tracing::debug;

use crate::errors::{ProviderError, ProviderErrorKind};
use crate::provider::Page;

/// Upper bound on pages followed for one listing.
pub const MAX_PAGES: usize = 10_000;

/// Drain a paginated listing into one ordered sequence.
///
/// Pages are requested strictly one after another. Only an absent token ends
/// the listing; a present token is followed even when it is empty.
pub async fn collect_pages<T, F, Fut>(source: &str, mut fetch: F) -> Result<Vec<T>, ProviderError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, ProviderError>>,
{
    let mut items = Vec::new();
    let mut token: Option<String> = None;

    for page_number in 1..=MAX_PAGES {
        let page = fetch(token.take()).await?;
        debug!(
            event_name = "scan.page.fetched",
            source,
            page = page_number,
            items = page.items.len(),
            has_more = page.next_token.is_some(),
            "listing page fetched"
        );
        items.extend(page.items);

        match page.next_token {
            Some(next) => token = Some(next),
            None => return Ok(items),
        }
    }

    Err(ProviderError::new(
        source,
        "paginate",
        ProviderErrorKind::Other,
        format!("listing did not finish within {MAX_PAGES} pages"),
    ))
}
