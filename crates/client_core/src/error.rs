use thiserror::Error;

/// Status reported when a request never got a response.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// A failed request, carrying whatever the server answered.
///
/// Network, validation and server failures are not told apart; the display
/// form is the text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("code {status}: {body}")]
pub struct RequestFailure {
    pub status: u16,
    pub body: String,
}

impl RequestFailure {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn transport(err: &reqwest::Error) -> Self {
        Self::new(TRANSPORT_FAILURE_STATUS, err.to_string())
    }

    pub fn is_transport(&self) -> bool {
        self.status == TRANSPORT_FAILURE_STATUS
    }
}
