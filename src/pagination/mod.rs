//! Multi-page list fetcher honoring two URL dialects (§4.3).
//!
//! Given a base URL path, query parameters, and a page handler, fetches the
//! first page, invokes the handler, and continues while the response carries
//! a `nextPageKey`.
//!
//! - **v2 dialect** (path contains `api/v2`): on continuation, all original
//!   query params are dropped; only `nextPageKey` is sent.
//! - **v1/other dialect**: original query params are preserved; `nextPageKey`
//!   is added alongside them.
//!
//! On HTTP-400 during continuation, the paginator logs and returns what it
//! has so far (pages may have been removed mid-iteration); other errors
//! propagate unchanged.

use crate::error::Error;
use std::future::Future;
use tracing::warn;

/// One fetched page: the caller-extracted items plus the raw `nextPageKey`.
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_key: Option<String>,
}

fn is_v2_dialect(path: &str) -> bool {
    path.contains("api/v2")
}

/// Fetches all pages from `path`, starting with `initial_params`, calling
/// `fetch_page(query_params)` for each page until `next_page_key` is absent.
///
/// `fetch_page` receives the exact query parameter list to send for that
/// request (dialect-resolved) and returns one [`Page`].
///
/// # Errors
/// Propagates any error from `fetch_page` except a transport error carrying
/// HTTP status 400 encountered on a continuation page (not the first page),
/// which instead truncates pagination and returns the items gathered so far.
pub async fn paginate<T, F, Fut>(
    path: &str,
    initial_params: Vec<(String, String)>,
    mut fetch_page: F,
) -> Result<Vec<T>, Error>
where
    F: FnMut(Vec<(String, String)>) -> Fut,
    Fut: Future<Output = Result<(Page<T>, Option<u16>), Error>>,
{
    let v2 = is_v2_dialect(path);
    let mut items = Vec::new();
    let mut params = initial_params;
    let mut first_page = true;

    loop {
        match fetch_page(params.clone()).await {
            Ok((page, _status)) => {
                items.extend(page.items);
                match page.next_page_key {
                    Some(key) => {
                        params = if v2 {
                            vec![("nextPageKey".to_string(), key)]
                        } else {
                            let mut next = params.clone();
                            next.retain(|(k, _)| k != "nextPageKey");
                            next.push(("nextPageKey".to_string(), key));
                            next
                        };
                        first_page = false;
                    }
                    None => break,
                }
            }
            Err(err) => {
                if !first_page && matches!(err.status(), Some(400)) {
                    warn!(page = "continuation", "pagination stopped early on HTTP 400");
                    break;
                }
                return Err(err);
            }
        }
    }

    Ok(items)
}
