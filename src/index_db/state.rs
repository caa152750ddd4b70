//! Storage state machine (§4.10 "Storage states").

use crate::error::{BarError, IndexError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageState {
    Create,
    UpdateRequested,
    Update,
    Ok,
    Error,
    Deleted,
}

impl StorageState {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageState::Create => "CREATE",
            StorageState::UpdateRequested => "UPDATE_REQUESTED",
            StorageState::Update => "UPDATE",
            StorageState::Ok => "OK",
            StorageState::Error => "ERROR",
            StorageState::Deleted => "DELETED",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, BarError> {
        Ok(match s {
            "CREATE" => StorageState::Create,
            "UPDATE_REQUESTED" => StorageState::UpdateRequested,
            "UPDATE" => StorageState::Update,
            "OK" => StorageState::Ok,
            "ERROR" => StorageState::Error,
            "DELETED" => StorageState::Deleted,
            other => return Err(BarError::Index(IndexError::Schema(format!("unknown storage state {}", other)))),
        })
    }

    /// Validates one transition edge from §4.10's rule list. `Deleted` is
    /// reachable from any state ("any -> DELETED when the backing blob is
    /// removed").
    pub fn can_transition_to(self, next: StorageState) -> bool {
        use StorageState::*;
        if next == Deleted {
            return true;
        }
        matches!(
            (self, next),
            (Create, UpdateRequested)
                | (UpdateRequested, Update)
                | (Update, Ok)
                | (Update, Error)
                | (Update, UpdateRequested)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_edges_are_accepted() {
        assert!(StorageState::Create.can_transition_to(StorageState::UpdateRequested));
        assert!(StorageState::UpdateRequested.can_transition_to(StorageState::Update));
        assert!(StorageState::Update.can_transition_to(StorageState::Ok));
        assert!(StorageState::Update.can_transition_to(StorageState::Error));
        assert!(StorageState::Update.can_transition_to(StorageState::UpdateRequested));
    }

    #[test]
    fn deleted_is_reachable_from_anywhere() {
        for state in [StorageState::Create, StorageState::Update, StorageState::Ok, StorageState::Error] {
            assert!(state.can_transition_to(StorageState::Deleted));
        }
    }

    #[test]
    fn illegal_edge_is_rejected() {
        assert!(!StorageState::Create.can_transition_to(StorageState::Ok));
        assert!(!StorageState::Ok.can_transition_to(StorageState::Update));
    }

    #[test]
    fn round_trips_through_string() {
        for state in
            [StorageState::Create, StorageState::UpdateRequested, StorageState::Update, StorageState::Ok, StorageState::Error, StorageState::Deleted]
        {
            assert_eq!(StorageState::from_str(state.as_str()).unwrap(), state);
        }
    }
}
