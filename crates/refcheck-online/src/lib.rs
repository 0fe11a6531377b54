//! Network-backed collaborators: the Crossref metadata provider and
//! verifier, a web-page `citation_*` metadata provider and an HTTP link
//! verifier.
//!
//! All of them implement the capability traits from `refcheck-core` and
//! report failures as [`CollaboratorError`]; the core turns those into
//! "verify manually" issues.

use std::time::Duration;

use refcheck_core::CollaboratorError;

pub mod crossref;
pub mod links;
pub mod web;

pub use crossref::Crossref;
pub use links::HttpLinkVerifier;
pub use web::WebPageProvider;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// User agent sent with every request. Crossref asks polite clients to
/// include a contact address.
pub fn user_agent(mailto: Option<&str>) -> String {
    match mailto {
        Some(email) => format!("refcheck/{} (mailto:{})", env!("CARGO_PKG_VERSION"), email),
        None => format!("refcheck/{}", env!("CARGO_PKG_VERSION")),
    }
}

/// Build the shared HTTP client.
pub fn build_client(timeout: Duration, mailto: Option<&str>) -> Result<reqwest::Client, CollaboratorError> {
    reqwest::Client::builder()
        .user_agent(user_agent(mailto))
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| CollaboratorError::Http(e.to_string()))
}

/// Map a transport error onto the collaborator error taxonomy.
pub(crate) fn request_error(e: reqwest::Error) -> CollaboratorError {
    if e.is_timeout() {
        CollaboratorError::Timeout
    } else if e.is_decode() {
        CollaboratorError::Parse(e.to_string())
    } else {
        CollaboratorError::Http(e.to_string())
    }
}

/// Shared status handling: 429 is rate limiting, anything else outside
/// 2xx is a plain status failure.
pub(crate) fn check_status(status: reqwest::StatusCode) -> Result<(), CollaboratorError> {
    if status.as_u16() == 429 {
        return Err(CollaboratorError::RateLimited);
    }
    if !status.is_success() {
        return Err(CollaboratorError::Status(status.as_u16()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent() {
        assert!(user_agent(None).starts_with("refcheck/"));
        assert!(user_agent(Some("me@example.org")).ends_with("(mailto:me@example.org)"));
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(reqwest::StatusCode::OK).is_ok());
        assert_eq!(
            check_status(reqwest::StatusCode::TOO_MANY_REQUESTS),
            Err(CollaboratorError::RateLimited)
        );
        assert_eq!(
            check_status(reqwest::StatusCode::SERVICE_UNAVAILABLE),
            Err(CollaboratorError::Status(503))
        );
    }

    #[test]
    fn test_build_client() {
        assert!(build_client(DEFAULT_TIMEOUT, Some("me@example.org")).is_ok());
    }
}
