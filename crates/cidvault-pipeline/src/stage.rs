use std::time::Duration;

use crate::error::PipelineError;

/// Publish flow: `Idle → Encrypting → Pinning → AwaitingSignature →
/// AwaitingFinality → Done`, or `Failed` from any non-terminal stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublishStage {
    Idle,
    Encrypting,
    Pinning,
    AwaitingSignature,
    AwaitingFinality,
    Done,
    Failed(PipelineError),
}

impl PublishStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Encrypting => "encrypting",
            Self::Pinning => "pinning",
            Self::AwaitingSignature => "awaiting_signature",
            Self::AwaitingFinality => "awaiting_finality",
            Self::Done => "done",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    pub fn can_advance_to(&self, next: &Self) -> bool {
        use PublishStage::*;
        match (self, next) {
            (from, Failed(_)) => !from.is_terminal(),
            (Idle, Encrypting)
            | (Encrypting, Pinning)
            | (Pinning, AwaitingSignature)
            | (AwaitingSignature, AwaitingFinality)
            | (AwaitingFinality, Done) => true,
            _ => false,
        }
    }
}

/// Retrieve flow: `Idle → Listing → Selecting → Fetching → Decrypting →
/// Ready`, or `Failed` from any non-terminal stage.
///
/// A session may also re-list from `Selecting` or `Ready`, select another
/// document from `Ready`, and start straight at `Selecting` when the caller
/// already knows the CID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetrievalStage {
    Idle,
    Listing,
    Selecting,
    Fetching,
    Decrypting,
    Ready,
    Failed(PipelineError),
}

impl RetrievalStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listing => "listing",
            Self::Selecting => "selecting",
            Self::Fetching => "fetching",
            Self::Decrypting => "decrypting",
            Self::Ready => "ready",
            Self::Failed(_) => "failed",
        }
    }

    /// `Ready` is not terminal: the user may pick another document.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn can_advance_to(&self, next: &Self) -> bool {
        use RetrievalStage::*;
        match (self, next) {
            (from, Failed(_)) => !from.is_terminal(),
            (Idle, Listing)
            | (Listing, Selecting)
            | (Selecting, Fetching)
            | (Fetching, Decrypting)
            | (Decrypting, Ready) => true,
            (Idle, Selecting) | (Selecting, Listing) | (Ready, Listing) | (Ready, Fetching) => true,
            _ => false,
        }
    }
}

/// One recorded stage change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageTransition {
    pub from: &'static str,
    pub to: &'static str,
    /// Time spent in `from`.
    pub elapsed: Duration,
}
