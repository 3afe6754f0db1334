use thiserror::Error;

/// Authorization errors for requests carrying a session
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}
