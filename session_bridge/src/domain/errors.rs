use std::fmt;

// Domain-level errors for provider calls made on behalf of the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthError {
    // The connectivity gate reported the service unreachable; no call was made.
    Offline,
    // Transport-class failure: unreachable host, timeout, gateway errors.
    Network(String),
    // The provider rejected the supplied credentials.
    InvalidCredentials(String),
    Other(String),
}

impl AuthError {
    // Text shown to the user when sign-in fails with this error.
    pub fn sign_in_message(&self) -> &'static str {
        match self {
            AuthError::Offline => {
                "Unable to reach the authentication service. Please check your connection."
            }
            AuthError::Network(_) => "Network error. Please check your connection and try again.",
            AuthError::InvalidCredentials(_) => "Invalid email or password",
            AuthError::Other(_) => "Failed to sign in. Please try again.",
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, AuthError::Offline | AuthError::Network(_))
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Offline => write!(f, "auth service is offline"),
            AuthError::Network(message) => write!(f, "auth network error: {message}"),
            AuthError::InvalidCredentials(message) => {
                write!(f, "auth rejected credentials: {message}")
            }
            AuthError::Other(message) => write!(f, "auth error: {message}"),
        }
    }
}

impl std::error::Error for AuthError {}
