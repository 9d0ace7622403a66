use crate::player::PlayerTarget;
use thiserror::Error;
use uuid::Uuid;

/// Main error type for the creature battle engine
#[derive(Debug, Error)]
pub enum BattleEngineError {
    /// Error related to definition lookup or loading
    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),
    /// Error related to invalid player actions
    #[error("Action error: {0}")]
    Action(#[from] ActionError),
    /// Error related to configuration loading
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    /// Error raised by the session manager
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Errors related to move/ability/item definitions
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The specified move was not found in the catalog
    #[error("Move not found: {0}")]
    MoveNotFound(String),
    /// A catalog file could not be parsed
    #[error("Malformed definition data in {source_name}: {message}")]
    MalformedData { source_name: String, message: String },
    #[error("Failed to read definitions from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed config: {0}")]
    Malformed(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Errors related to player actions against a live battle state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Move index is out of bounds
    #[error("Invalid move index: {0}")]
    InvalidMoveIndex(usize),
    /// The move exists but cannot be used right now
    #[error("{0} has no PP left")]
    MoveUnusable(String),
    /// The side already has an action queued for this turn
    #[error("{0:?} already submitted an action this turn")]
    AlreadySubmitted(PlayerTarget),
    /// The battle has already ended
    #[error("Battle is not accepting actions")]
    NotAcceptingActions,
}

/// Failures reported by persistence collaborators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Record already exists: {0}")]
    Conflict(String),
    #[error("Insufficient balance for {user}: needs {required}, has {available}")]
    InsufficientBalance {
        user: Uuid,
        required: i64,
        available: i64,
    },
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Coarse classification of a session failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before any mutation
    Validation,
    /// The request does not fit the current battle state
    Precondition,
    /// Funds or ownership are missing
    Resource,
    /// A collaborator write failed
    Persistence,
}

/// What the transport layer should tell the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportSignal {
    /// Try again later: already acted, waiting on the opponent
    NotNow,
    PaymentRequired,
    Failure,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Battle not found: {0}")]
    BattleNotFound(Uuid),
    #[error("Player {0} already has an active battle")]
    BattleAlreadyExists(Uuid),
    #[error("Player {0} is not part of this battle")]
    PlayerNotInBattle(Uuid),
    #[error("Battle is not active")]
    BattleNotActive,
    #[error("User not found: {0}")]
    UserNotFound(Uuid),
    #[error("Creature not found: {0}")]
    CreatureNotFound(Uuid),
    #[error("Creature {creature} is not owned by {player}")]
    CreatureNotOwned { creature: Uuid, player: Uuid },
    #[error("Player {0} has already chosen a combatant")]
    CombatantAlreadySelected(Uuid),
    #[error("Insufficient funds for {user}: wager {required}, balance {available}")]
    InsufficientFunds {
        user: Uuid,
        required: i64,
        available: i64,
    },
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error("Persistence failed: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Compensation failed for battle {battle_id}: {original}; rollback also failed: {compensation}")]
    CompensationFailed {
        battle_id: Uuid,
        original: RepositoryError,
        compensation: RepositoryError,
    },
    #[error("Session state lock was poisoned")]
    LockPoisoned,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::InvalidRequest(_)
            | SessionError::Action(ActionError::InvalidMoveIndex(_)) => ErrorKind::Validation,
            SessionError::BattleNotFound(_)
            | SessionError::BattleAlreadyExists(_)
            | SessionError::PlayerNotInBattle(_)
            | SessionError::BattleNotActive
            | SessionError::UserNotFound(_)
            | SessionError::CreatureNotFound(_)
            | SessionError::CombatantAlreadySelected(_)
            | SessionError::Action(_)
            | SessionError::Definition(_) => ErrorKind::Precondition,
            SessionError::InsufficientFunds { .. } | SessionError::CreatureNotOwned { .. } => {
                ErrorKind::Resource
            }
            SessionError::Repository(RepositoryError::InsufficientBalance { .. }) => {
                ErrorKind::Resource
            }
            SessionError::Repository(_)
            | SessionError::CompensationFailed { .. }
            | SessionError::LockPoisoned => ErrorKind::Persistence,
        }
    }

    pub fn transport_signal(&self) -> TransportSignal {
        match self {
            SessionError::Action(ActionError::AlreadySubmitted(_))
            | SessionError::BattleAlreadyExists(_)
            | SessionError::CombatantAlreadySelected(_) => TransportSignal::NotNow,
            SessionError::InsufficientFunds { .. }
            | SessionError::Repository(RepositoryError::InsufficientBalance { .. }) => {
                TransportSignal::PaymentRequired
            }
            _ => TransportSignal::Failure,
        }
    }

    /// Human-readable reason for the transport layer.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

pub type BattleResult<T> = Result<T, BattleEngineError>;
pub type ActionResult<T> = Result<T, ActionError>;
pub type DefinitionResult<T> = Result<T, DefinitionError>;
pub type RepositoryResult<T> = Result<T, RepositoryError>;
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_already_submitted_maps_to_not_now() {
        let err = SessionError::from(ActionError::AlreadySubmitted(PlayerTarget::Player1));
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(err.transport_signal(), TransportSignal::NotNow);
    }

    #[test]
    fn test_insufficient_funds_maps_to_payment_required() {
        let err = SessionError::InsufficientFunds {
            user: Uuid::nil(),
            required: 100,
            available: 10,
        };
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert_eq!(err.transport_signal(), TransportSignal::PaymentRequired);
        assert!(err.reason().contains("wager 100"));
    }

    #[test]
    fn test_other_errors_map_to_generic_failure() {
        let err = SessionError::BattleNotFound(Uuid::nil());
        assert_eq!(err.transport_signal(), TransportSignal::Failure);
        assert_eq!(
            SessionError::from(ActionError::InvalidMoveIndex(7)).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            SessionError::from(RepositoryError::Unavailable("down".into())).kind(),
            ErrorKind::Persistence
        );
    }
}
