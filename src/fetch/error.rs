use thiserror::Error;

/// Errors that can occur while fetching one page from the remote source.
///
/// Transport-level failures (no route, timeouts) are connectivity errors;
/// everything else means the server was reached but the response was
/// unusable. See [`FetchError::is_connectivity`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// DNS, connection refused, TLS, or the body stream broke mid-transfer
    #[error("Network unreachable: {0}")]
    Connectivity(String),
    /// Request exceeded the client timeout
    #[error("Request timed out")]
    Timeout,
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body could not be decoded into a page
    #[error("Malformed response: {0}")]
    Decoding(String),
    /// Response body exceeded the size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// The request could not be built (bad base URL, invalid page number)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// The fetch task died before producing a result
    #[error("Fetch task failed: {0}")]
    Internal(String),
}

impl FetchError {
    /// True when the failure means "no network route" rather than a bad
    /// response from a reachable server.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, FetchError::Connectivity(_) | FetchError::Timeout)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_decode() {
            FetchError::Decoding(e.to_string())
        } else if e.is_builder() {
            FetchError::InvalidRequest(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::HttpStatus(status.as_u16())
        } else {
            FetchError::Connectivity(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Decoding(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_classification() {
        assert!(FetchError::Connectivity("dns".into()).is_connectivity());
        assert!(FetchError::Timeout.is_connectivity());
        assert!(!FetchError::HttpStatus(500).is_connectivity());
        assert!(!FetchError::Decoding("eof".into()).is_connectivity());
        assert!(!FetchError::ResponseTooLarge(10).is_connectivity());
        assert!(!FetchError::Internal("panic".into()).is_connectivity());
    }

    #[test]
    fn test_json_error_maps_to_decoding() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        assert!(matches!(FetchError::from(err), FetchError::Decoding(_)));
    }
}
