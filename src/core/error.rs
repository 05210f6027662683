use thiserror::Error;

use super::vocab::VocabError;

/// Errors raised by the tokenizer.
///
/// Configuration and argument errors are raised before any output is built,
/// so a failed call never yields a partial [`Encoding`](super::Encoding).
#[derive(Error, Debug)]
pub enum TokenizerError {
    /// The tokenizer lacks something a requested layout or operation needs,
    /// e.g. a missing bos/eos token or a pad token for padding.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Invalid call: mismatched batch lengths, incompatible strategy
    /// combinations or an input variant the tokenizer cannot handle.
    #[error("Invalid argument: {0}")]
    Argument(String),
    /// The operation is not implemented by this tokenizer.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    /// A token or id could not be mapped and no unk token is configured.
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Regex compilation error: {0}")]
    RegexError(#[from] Box<fancy_regex::Error>),
    #[error("Vocabulary error: {0}")]
    VocabError(#[from] VocabError),
    #[error("Config parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<fancy_regex::Error> for TokenizerError {
    fn from(err: fancy_regex::Error) -> Self {
        TokenizerError::RegexError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, TokenizerError>;
