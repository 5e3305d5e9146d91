use chrono::{DateTime, Utc};

use crate::models::poll_models::{Poll, PollStatus};

/// Where a poll sits in its lifecycle at a given instant. `Expired` is a
/// read-time view of an active poll whose `closes_at` has passed; the stored
/// status only ever becomes `closed` through an explicit close by the
/// creator. No background sweeper exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Draft,
    Scheduled,
    Votable,
    Expired,
    Closed,
}

/// Machine-readable reason a poll is not accepting votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotVotableReason {
    NotStarted,
    NotActive,
    Closed,
}

impl NotVotableReason {
    pub fn as_str(self) -> &'static str {
        match self {
            NotVotableReason::NotStarted => "not-started",
            NotVotableReason::NotActive => "not-active",
            NotVotableReason::Closed => "closed",
        }
    }
}

/// Pure, stateless predicate over poll fields and wall-clock time.
pub fn phase(poll: &Poll, now: DateTime<Utc>) -> PollPhase {
    match poll.status {
        PollStatus::Closed => PollPhase::Closed,
        PollStatus::Draft => match poll.starts_at {
            Some(starts_at) if starts_at > now => PollPhase::Scheduled,
            _ => PollPhase::Draft,
        },
        PollStatus::Active => {
            if matches!(poll.starts_at, Some(starts_at) if now < starts_at) {
                PollPhase::Scheduled
            } else if matches!(poll.closes_at, Some(closes_at) if now >= closes_at) {
                PollPhase::Expired
            } else {
                PollPhase::Votable
            }
        }
    }
}

pub fn check_votable(poll: &Poll, now: DateTime<Utc>) -> Result<(), NotVotableReason> {
    match phase(poll, now) {
        PollPhase::Votable => Ok(()),
        PollPhase::Scheduled => Err(NotVotableReason::NotStarted),
        PollPhase::Draft => Err(NotVotableReason::NotActive),
        PollPhase::Expired | PollPhase::Closed => Err(NotVotableReason::Closed),
    }
}

pub fn accepting_votes(poll: &Poll, now: DateTime<Utc>) -> bool {
    phase(poll, now) == PollPhase::Votable
}
