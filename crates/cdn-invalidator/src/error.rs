use cdn_common::EnvelopeError;
use thiserror::Error;

/// A queue message that can never become a valid request, however often it is redelivered.
#[derive(Error, Debug)]
pub enum MalformedMessage {
    #[error("malformed message: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("malformed message: missing or empty field `{0}`")]
    MissingField(&'static str),
}
