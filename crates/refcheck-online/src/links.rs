use std::time::Duration;

use refcheck_core::collaborators::CollaboratorFuture;
use refcheck_core::{CollaboratorError, LinkStatus, LinkVerifier};

use crate::request_error;

/// Checks DOIs and URLs with a `HEAD` request, retrying with `GET` when the
/// server refuses `HEAD` (405, and 403 from some publisher CDNs).
pub struct HttpLinkVerifier {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpLinkVerifier {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: crate::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn status_of(&self, method: reqwest::Method, url: &str) -> Result<u16, reqwest::Error> {
        let resp = self
            .client
            .request(method, url)
            .timeout(self.timeout)
            .send()
            .await?;
        Ok(resp.status().as_u16())
    }
}

/// Whether a `HEAD` answer should be confirmed with a `GET`.
pub fn needs_get_fallback(status: u16) -> bool {
    matches!(status, 403 | 405 | 501)
}

/// `https://doi.org/<doi>` for a bare DOI, the input itself for a URL,
/// `None` for anything else.
pub fn resolvable_url(doi_or_url: &str) -> Option<String> {
    let target = doi_or_url.trim();
    if target.starts_with("http://") || target.starts_with("https://") {
        return url::Url::parse(target).ok().map(|u| u.to_string());
    }
    let doi = target.strip_prefix("doi:").unwrap_or(target).trim();
    doi.starts_with("10.").then(|| format!("https://doi.org/{}", doi))
}

/// Outcome of a failed request: timeouts are "not verified", connection
/// failures mean the link is broken.
fn failure(e: reqwest::Error) -> Result<Option<LinkStatus>, CollaboratorError> {
    if e.is_connect() || e.is_redirect() {
        Ok(Some(LinkStatus::unreachable(e.to_string())))
    } else {
        Err(request_error(e))
    }
}

impl LinkVerifier for HttpLinkVerifier {
    fn check<'a>(&'a self, doi_or_url: &'a str) -> CollaboratorFuture<'a, LinkStatus> {
        Box::pin(async move {
            let Some(url) = resolvable_url(doi_or_url) else {
                tracing::debug!(target = doi_or_url, "not a checkable link");
                return Ok(None);
            };
            let mut status = match self.status_of(reqwest::Method::HEAD, &url).await {
                Ok(s) => s,
                Err(e) => return failure(e),
            };
            if needs_get_fallback(status) {
                status = match self.status_of(reqwest::Method::GET, &url).await {
                    Ok(s) => s,
                    Err(e) => return failure(e),
                };
            }
            tracing::debug!(url, status, "link checked");
            Ok(Some(LinkStatus::from_status(status)))
        })
    }
}
