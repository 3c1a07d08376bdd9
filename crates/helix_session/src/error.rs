use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Crypto(#[from] helix_crypto::CryptoError),

    #[error(transparent)]
    Proto(#[from] helix_proto::ProtoError),

    #[error("no session for peer `{0}`")]
    NotFound(String),

    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("invalid identifier `{0}`")]
    IdentifierInvalid(String),

    #[error("identifier `{0}` is already taken")]
    IdentifierTaken(String),

    #[error("registration reply timed out")]
    RegistrationTimeout,

    #[error("transport error: {0}")]
    Transport(String),
}
