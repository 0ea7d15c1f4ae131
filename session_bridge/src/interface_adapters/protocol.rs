use serde::{Deserialize, Serialize};

// Body for `POST /auth/v1/token?grant_type=password`.
#[derive(Serialize)]
pub struct PasswordGrantRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

// Body for `POST /auth/v1/token?grant_type=refresh_token`.
#[derive(Serialize)]
pub struct RefreshGrantRequest<'a> {
    pub refresh_token: &'a str,
}

// Error envelope returned by the provider. Older releases send
// `error`/`error_description`, newer ones `error_code`/`msg`.
#[derive(Debug, Default, Deserialize)]
pub struct ProviderErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ProviderErrorResponse {
    pub fn code(&self) -> Option<&str> {
        self.error_code.as_deref().or(self.error.as_deref())
    }

    pub fn message(&self) -> Option<&str> {
        self.msg
            .as_deref()
            .or(self.error_description.as_deref())
            .or(self.message.as_deref())
    }
}
