//! `JobState` transition table (§4.9 "States").

use crate::error::BarError;
use crate::job::ArchiveType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    None,
    Waiting,
    Running,
    Done,
    Error,
    Aborted,
    Disconnected,
}

/// An event fed into the state machine. `Start` carries the archive type a
/// schedule or manual invocation selected (§4.9 "Archive type election");
/// the rest are run-lifecycle events.
#[derive(Clone, Copy)]
pub enum Trigger {
    Start { archive_type: ArchiveType },
    Admit,
    Succeed,
    Fail,
    Abort,
    SlaveLost,
    SlaveReconnect,
}

/// Applies `trigger` to `state`, returning the next state or
/// `BarError::Internal` if the transition isn't in the table (§4.9).
pub fn apply(state: JobState, trigger: Trigger) -> Result<JobState, BarError> {
    use JobState::*;
    use Trigger::*;

    let next = match (state, trigger) {
        (None, Start { .. }) => Waiting,
        (Done, Start { .. }) | (Error, Start { .. }) | (Aborted, Start { .. }) => Waiting,
        (Waiting, Admit) => Running,
        (Running, Succeed) => Done,
        (Running, Fail) => Error,
        (Running, Abort) => Aborted,
        (Running, SlaveLost) => Disconnected,
        (Disconnected, SlaveReconnect) => Running,
        _ => {
            return Err(BarError::Internal(format!(
                "no transition from job state {:?} on trigger {:?}",
                state, trigger
            )))
        }
    };
    Ok(next)
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Start { archive_type } => write!(f, "Start({:?})", archive_type),
            Trigger::Admit => write!(f, "Admit"),
            Trigger::Succeed => write!(f, "Succeed"),
            Trigger::Fail => write!(f, "Fail"),
            Trigger::Abort => write!(f, "Abort"),
            Trigger::SlaveLost => write!(f, "SlaveLost"),
            Trigger::SlaveReconnect => write!(f, "SlaveReconnect"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_lifecycle_round_trips_to_waiting() {
        let mut s = JobState::None;
        s = apply(s, Trigger::Start { archive_type: ArchiveType::Full }).unwrap();
        assert_eq!(s, JobState::Waiting);
        s = apply(s, Trigger::Admit).unwrap();
        assert_eq!(s, JobState::Running);
        s = apply(s, Trigger::Succeed).unwrap();
        assert_eq!(s, JobState::Done);
        s = apply(s, Trigger::Start { archive_type: ArchiveType::Incremental }).unwrap();
        assert_eq!(s, JobState::Waiting);
    }

    #[test]
    fn slave_loss_and_reconnect() {
        let mut s = JobState::Running;
        s = apply(s, Trigger::SlaveLost).unwrap();
        assert_eq!(s, JobState::Disconnected);
        s = apply(s, Trigger::SlaveReconnect).unwrap();
        assert_eq!(s, JobState::Running);
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let err = apply(JobState::None, Trigger::Admit).unwrap_err();
        assert!(matches!(err, BarError::Internal(_)));
    }
}
