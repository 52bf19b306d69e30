use stowage_types::HistoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    /// Deal proposal rejected or failed; terminal for that one action,
    /// never retried automatically.
    #[error("deal proposal failed: {message}")]
    ProposalFailed { message: String },

    /// An observation would have broken history ordering.
    #[error(transparent)]
    History(#[from] HistoryError),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
