use thiserror::Error;

pub type SealResult<T> = Result<T, SealError>;

#[derive(Debug, Error)]
pub enum SealError {
    /// Authenticated decryption rejected the input. Callers must not trust
    /// any of it; `cause` only exists for diagnostics.
    #[error("{context} failed authentication")]
    Authentication {
        context: &'static str,
        #[source]
        cause: AuthFailure,
    },

    /// The passphrase-derived key could not unwrap the key material.
    #[error("invalid passphrase")]
    InvalidPassphrase,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("masterkey has been destroyed")]
    KeyDestroyed,

    #[error("malformed key file: {0}")]
    Format(String),

    #[error("unsupported vault version: expected {expected}, found {found}")]
    UnsupportedVersion { expected: u32, found: u32 },

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why an authenticated decryption was rejected.
#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("ciphertext is not authentic")]
    Unauthentic,

    #[error("decrypted name is not UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

impl SealError {
    pub fn authentication(context: &'static str, cause: AuthFailure) -> Self {
        Self::Authentication { context, cause }
    }

    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}
