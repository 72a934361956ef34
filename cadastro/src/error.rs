use thiserror::Error;

pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred. Please try again.";

/// Everything that can go wrong between the console and the remote API.
///
/// None of these are fatal; callers turn them into a notice and leave the view as it was.
#[derive(Debug, Error)]
pub enum Error {
    /// Required fields were empty; caught before any request is sent.
    #[error("required fields missing: {}", .fields.join(", "))]
    Validation { fields: Vec<&'static str> },

    /// The login endpoint rejected the credentials.
    #[error("login rejected: {0}")]
    Authentication(String),

    /// An authenticated request came back 401. The session has already been told.
    #[error("session expired, log in again")]
    AuthorizationExpired,

    #[error("API error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("credential storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("could not decode API response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn validation(fields: Vec<&'static str>) -> Self {
        Error::Validation { fields }
    }

    /// Text for the user-facing notice: the server's own message where there is one.
    pub fn notice_message(&self) -> String {
        match self {
            Error::Validation { .. } => "Fill in all required fields".to_string(),
            Error::Remote { message, .. } => message.clone(),
            Error::Authentication(message) => message.clone(),
            Error::AuthorizationExpired => self.to_string(),
            Error::Transport(_) | Error::Decode(_) | Error::Storage(_) => {
                GENERIC_ERROR_MESSAGE.to_string()
            }
        }
    }

    /// Whether a list query may be issued a second time after this failure.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Error::Validation { .. } | Error::Authentication(_) | Error::AuthorizationExpired
        )
    }
}

#[test]
fn test_notice_message() {
    let err = Error::Remote {
        status: 409,
        message: "username already taken".to_string(),
    };
    assert_eq!(err.notice_message(), "username already taken");
    assert_eq!(err.to_string(), "API error (409): username already taken");

    let err = Error::validation(vec!["email", "password"]);
    assert_eq!(err.to_string(), "required fields missing: email, password");
    assert!(!err.is_retryable());
    assert!(!Error::AuthorizationExpired.is_retryable());
    assert!(Error::Remote {
        status: 502,
        message: GENERIC_ERROR_MESSAGE.to_string()
    }
    .is_retryable());
}
