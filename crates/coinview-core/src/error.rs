use thiserror::Error;

/// Server failures recognized by status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    TooManyRequests,
    /// HTTP 550: the API has no data for the request.
    NoData,
}

impl ServerErrorKind {
    /// Map a documented status code; undocumented codes yield `None`.
    pub const fn from_status(status: u16) -> Option<Self> {
        match status {
            400 => Some(Self::BadRequest),
            401 => Some(Self::Unauthorized),
            403 => Some(Self::Forbidden),
            429 => Some(Self::TooManyRequests),
            550 => Some(Self::NoData),
            _ => None,
        }
    }

    pub const fn status(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::TooManyRequests => 429,
            Self::NoData => 550,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::TooManyRequests => "too_many_requests",
            Self::NoData => "no_data",
        }
    }
}

/// Failure of a fetch or decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// The request URL could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Connectivity precondition failed; no request was sent.
    #[error("the network connection appears to be offline")]
    Offline,

    /// Non-200 response or transport failure.
    #[error("server error: {message}")]
    Server {
        kind: Option<ServerErrorKind>,
        message: String,
        /// Whether repeating the request can plausibly succeed.
        transient: bool,
    },

    /// Response bytes did not match the expected shape.
    #[error("the response could not be decoded")]
    DecodingFailed,
}

impl NetworkError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Server failure; only rate limiting and unclassified statuses are
    /// transient.
    pub fn server(kind: Option<ServerErrorKind>, message: impl Into<String>) -> Self {
        Self::Server {
            kind,
            message: message.into(),
            transient: matches!(kind, None | Some(ServerErrorKind::TooManyRequests)),
        }
    }

    /// Transport failure before any status was received.
    pub fn transport(message: impl Into<String>, transient: bool) -> Self {
        Self::Server {
            kind: None,
            message: message.into(),
            transient,
        }
    }

    /// Recognized server kind, if this is a classified server error.
    pub const fn server_kind(&self) -> Option<ServerErrorKind> {
        match self {
            Self::Server { kind, .. } => *kind,
            _ => None,
        }
    }

    pub const fn is_offline(&self) -> bool {
        matches!(self, Self::Offline)
    }

    /// Whether repeating the same request can plausibly succeed.
    ///
    /// Rate limiting, unclassified server failures and transport failures the
    /// transport marks as transient qualify. Client mistakes, auth failures,
    /// missing data and local preconditions do not.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Server { transient, .. } => *transient,
            Self::InvalidRequest(_) | Self::Offline | Self::DecodingFailed => false,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "network.invalid_request",
            Self::Offline => "network.offline",
            Self::DecodingFailed => "network.decoding_failed",
            Self::Server { kind: None, .. } => "network.server",
            Self::Server { kind: Some(kind), .. } => match kind {
                ServerErrorKind::BadRequest => "network.server.bad_request",
                ServerErrorKind::Unauthorized => "network.server.unauthorized",
                ServerErrorKind::Forbidden => "network.server.forbidden",
                ServerErrorKind::TooManyRequests => "network.server.too_many_requests",
                ServerErrorKind::NoData => "network.server.no_data",
            },
        }
    }
}

/// Client configuration could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    MissingVar(&'static str),

    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidVar { name: &'static str, value: String },

    #[error("base url '{0}' is not a valid http(s) url")]
    InvalidBaseUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_status_codes_map_both_ways() {
        for status in [400, 401, 403, 429, 550] {
            let kind = ServerErrorKind::from_status(status).expect("documented status");
            assert_eq!(kind.status(), status);
        }
        assert_eq!(ServerErrorKind::from_status(418), None);
        assert_eq!(ServerErrorKind::from_status(500), None);
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(NetworkError::server(None, "boom").is_retryable());
        assert!(NetworkError::server(Some(ServerErrorKind::TooManyRequests), "slow down").is_retryable());
        assert!(!NetworkError::server(Some(ServerErrorKind::Unauthorized), "bad key").is_retryable());
        assert!(!NetworkError::server(Some(ServerErrorKind::NoData), "none").is_retryable());
        assert!(!NetworkError::Offline.is_retryable());
        assert!(!NetworkError::invalid_request("empty id").is_retryable());
        assert!(!NetworkError::DecodingFailed.is_retryable());
    }

    #[test]
    fn transport_failures_carry_their_own_retry_flag() {
        let permanent = NetworkError::transport("malformed request", false);
        assert!(!permanent.is_retryable());
        assert_eq!(permanent.server_kind(), None);
        assert_eq!(permanent.code(), "network.server");
        assert!(NetworkError::transport("connection reset", true).is_retryable());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(NetworkError::Offline.code(), "network.offline");
        assert_eq!(
            NetworkError::server(Some(ServerErrorKind::Forbidden), "no").code(),
            "network.server.forbidden"
        );
        assert_eq!(NetworkError::server(None, "?").code(), "network.server");
    }
}
