use thiserror::Error;

/// Main error type for the collector core.
///
/// Every core operation either returns a typed value or fails with one of
/// these kinds; nothing is recovered silently. A prompt that times out is
/// not an error, see [`crate::prompt::Outcome`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectorError {
    /// A creature, owner, species or other entity does not exist
    #[error("not found: {0}")]
    NotFound(#[from] NotFoundError),
    /// An argument is out of range (slot, id, amount, page...)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The request is well formed but the current state forbids it
    #[error("precondition failed: {0}")]
    PreconditionFailed(#[from] PreconditionError),
    /// Stored or provided data holds an impossible value
    #[error("data integrity violation: {0}")]
    DataIntegrity(String),
    /// The persistence collaborator failed to read or write
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Errors for lookups that came back empty
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundError {
    #[error("species '{0}'")]
    Species(String),
    #[error("creature #{id} of owner {owner}")]
    Creature { owner: String, id: u32 },
    #[error("no selected creature for owner {0}")]
    SelectedCreature(String),
    #[error("profile for {0}")]
    Profile(String),
    #[error("move '{0}'")]
    Move(String),
    #[error("market listing #{0}")]
    Listing(u32),
    #[error("session '{0}'")]
    Session(String),
    #[error("shop item '{0}'")]
    Item(String),
}

/// Errors for requests the current state does not allow
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("it is not {0}'s turn")]
    NotYourTurn(String),
    #[error("{0} is not part of this session")]
    NotAParticipant(String),
    #[error("session is in the wrong phase: {0}")]
    WrongPhase(String),
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u64, available: u64 },
    #[error("{0} has already started")]
    AlreadyStarted(String),
    #[error("a starter was already chosen")]
    StarterAlreadyChosen,
    #[error("team slot {0} is already occupied")]
    SlotOccupied(u8),
    #[error("team slot {0} is already empty")]
    SlotEmpty(u8),
    #[error("creature #{0} is already on the team")]
    AlreadyOnTeam(u32),
    #[error("a listing cannot be bought by its own seller")]
    OwnListing,
    #[error("only the seller may withdraw listing #{0}")]
    NotListingOwner(u32),
    #[error("a session is already running for '{0}'")]
    SessionActive(String),
    #[error("{0} already joined")]
    AlreadyJoined(String),
    #[error("a raid is in progress in '{0}'")]
    RaidInProgress(String),
    #[error("cannot target yourself")]
    SelfTarget,
    #[error("request is out of date: {0}")]
    Stale(String),
}

/// Type alias for Results using CollectorError
pub type CollectorResult<T> = Result<T, CollectorError>;

impl CollectorError {
    pub fn invalid(details: impl Into<String>) -> Self {
        CollectorError::InvalidArgument(details.into())
    }

    pub fn integrity(details: impl Into<String>) -> Self {
        CollectorError::DataIntegrity(details.into())
    }
}

impl From<std::io::Error> for CollectorError {
    fn from(err: std::io::Error) -> Self {
        CollectorError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for CollectorError {
    fn from(err: serde_json::Error) -> Self {
        CollectorError::Storage(err.to_string())
    }
}
