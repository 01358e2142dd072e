use thiserror::Error;
use uuid::Uuid;

/// Phases a room cycles through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoomPhase {
    /// Players gather, rename themselves and ready up.
    #[default]
    Lobby,
    /// A race is in progress; players report their results.
    Running,
    /// Final scores are shown until everybody readies up again.
    Ending,
}

/// Events that move a room to its next phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// The ready-up countdown elapsed; the race starts.
    CountdownElapsed,
    /// Every player reported a result.
    RaceCompleted,
    /// Everyone readied up on the score screen; back to the lobby.
    Rematch,
}

/// `event` has no meaning in phase `from`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// Phase the room was in.
    pub from: RoomPhase,
    /// Rejected event.
    pub event: RoomEvent,
}

/// Errors returned when starting a transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// A delayed transition is waiting and must be applied or aborted first.
    #[error("a transition is already pending")]
    AlreadyPending,
    /// The event is not valid from the current phase.
    #[error(transparent)]
    InvalidTransition(InvalidTransition),
}

/// Errors returned when resolving the pending transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PendingError {
    /// Nothing is pending.
    #[error("no transition is pending")]
    NoPending,
    /// Another plan is pending; `got` is stale.
    #[error("pending plan {expected} does not match {got}")]
    IdMismatch {
        /// Plan currently pending.
        expected: PlanId,
        /// Plan the caller asked for.
        got: PlanId,
    },
}

/// Identifier of a delayed transition.
pub type PlanId = Uuid;

/// A validated transition waiting for [`RoomStateMachine::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    /// Identifier handed to the timer that will apply the plan.
    pub id: PlanId,
    /// Phase reached once the plan is applied.
    pub to: RoomPhase,
}

/// Lobby → Running → Ending → Lobby cycle with at most one delayed transition in flight.
#[derive(Debug, Clone, Default)]
pub struct RoomStateMachine {
    phase: RoomPhase,
    pending: Option<Plan>,
}

impl RoomStateMachine {
    /// Create a state machine in the lobby.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Identifier of the pending plan, if any.
    pub fn pending_plan(&self) -> Option<PlanId> {
        self.pending.map(|plan| plan.id)
    }

    /// Validate `event` and park it until [`RoomStateMachine::apply`] or
    /// [`RoomStateMachine::abort`] is called with the returned id.
    pub fn plan(&mut self, event: RoomEvent) -> Result<Plan, PlanError> {
        let to = self.next_phase(event)?;
        let plan = Plan {
            id: Uuid::new_v4(),
            to,
        };
        self.pending = Some(plan);
        Ok(plan)
    }

    /// Move to the phase of the pending plan `plan_id`.
    ///
    /// A stale id leaves the pending plan untouched.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<RoomPhase, PendingError> {
        let plan = self.take_pending(plan_id)?;
        self.phase = plan.to;
        Ok(self.phase)
    }

    /// Drop the pending plan `plan_id` without changing phase.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), PendingError> {
        self.take_pending(plan_id).map(|_| ())
    }

    /// Transition on `event` right away.
    pub fn advance(&mut self, event: RoomEvent) -> Result<RoomPhase, PlanError> {
        self.phase = self.next_phase(event)?;
        Ok(self.phase)
    }

    fn take_pending(&mut self, plan_id: PlanId) -> Result<Plan, PendingError> {
        match self.pending {
            None => Err(PendingError::NoPending),
            Some(plan) if plan.id != plan_id => Err(PendingError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            }),
            Some(plan) => {
                self.pending = None;
                Ok(plan)
            }
        }
    }

    fn next_phase(&self, event: RoomEvent) -> Result<RoomPhase, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        match (self.phase, event) {
            (RoomPhase::Lobby, RoomEvent::CountdownElapsed) => Ok(RoomPhase::Running),
            (RoomPhase::Running, RoomEvent::RaceCompleted) => Ok(RoomPhase::Ending),
            (RoomPhase::Ending, RoomEvent::Rematch) => Ok(RoomPhase::Lobby),
            (from, event) => Err(PlanError::InvalidTransition(InvalidTransition {
                from,
                event,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut RoomStateMachine, event: RoomEvent) -> RoomPhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn initial_state_is_lobby() {
        let sm = RoomStateMachine::new();
        assert_eq!(sm.phase(), RoomPhase::Lobby);
        assert!(sm.pending_plan().is_none());
    }

    #[test]
    fn full_cycle_returns_to_lobby() {
        let mut sm = RoomStateMachine::new();

        assert_eq!(apply(&mut sm, RoomEvent::CountdownElapsed), RoomPhase::Running);
        assert_eq!(apply(&mut sm, RoomEvent::RaceCompleted), RoomPhase::Ending);
        assert_eq!(apply(&mut sm, RoomEvent::Rematch), RoomPhase::Lobby);
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        let mut sm = RoomStateMachine::new();
        let err = sm.plan(RoomEvent::RaceCompleted).unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.from, RoomPhase::Lobby);
                assert_eq!(invalid.event, RoomEvent::RaceCompleted);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        apply(&mut sm, RoomEvent::CountdownElapsed);
        assert!(matches!(
            sm.plan(RoomEvent::Rematch),
            Err(PlanError::InvalidTransition(_))
        ));
    }

    #[test]
    fn pending_plan_blocks_second_plan() {
        let mut sm = RoomStateMachine::new();
        let plan = sm.plan(RoomEvent::CountdownElapsed).unwrap();
        assert_eq!(sm.pending_plan(), Some(plan.id));
        assert_eq!(plan.to, RoomPhase::Running);
        assert_eq!(
            sm.plan(RoomEvent::CountdownElapsed).unwrap_err(),
            PlanError::AlreadyPending
        );
        assert_eq!(sm.phase(), RoomPhase::Lobby);
    }

    #[test]
    fn stale_plan_id_is_rejected_and_keeps_pending() {
        let mut sm = RoomStateMachine::new();
        let plan = sm.plan(RoomEvent::CountdownElapsed).unwrap();
        let stale = Uuid::new_v4();

        assert!(matches!(
            sm.apply(stale),
            Err(PendingError::IdMismatch { got, .. }) if got == stale
        ));
        assert!(matches!(
            sm.abort(stale),
            Err(PendingError::IdMismatch { expected, .. }) if expected == plan.id
        ));
        assert_eq!(sm.pending_plan(), Some(plan.id));
        assert_eq!(sm.apply(plan.id).unwrap(), RoomPhase::Running);
    }

    #[test]
    fn abort_clears_pending() {
        let mut sm = RoomStateMachine::new();
        let plan = sm.plan(RoomEvent::CountdownElapsed).unwrap();
        sm.abort(plan.id).unwrap();
        assert!(sm.pending_plan().is_none());
        assert_eq!(sm.apply(plan.id).unwrap_err(), PendingError::NoPending);
        assert_eq!(sm.abort(plan.id).unwrap_err(), PendingError::NoPending);
        assert_eq!(sm.phase(), RoomPhase::Lobby);
    }

    #[test]
    fn advance_applies_immediately() {
        let mut sm = RoomStateMachine::new();
        apply(&mut sm, RoomEvent::CountdownElapsed);
        assert_eq!(sm.advance(RoomEvent::RaceCompleted).unwrap(), RoomPhase::Ending);
        assert!(sm.pending_plan().is_none());
    }

    #[test]
    fn advance_reports_errors_without_moving() {
        let mut sm = RoomStateMachine::new();
        assert!(matches!(
            sm.advance(RoomEvent::Rematch),
            Err(PlanError::InvalidTransition(_))
        ));
        assert_eq!(sm.phase(), RoomPhase::Lobby);

        let plan = sm.plan(RoomEvent::CountdownElapsed).unwrap();
        assert_eq!(
            sm.advance(RoomEvent::CountdownElapsed).unwrap_err(),
            PlanError::AlreadyPending
        );
        assert_eq!(sm.phase(), RoomPhase::Lobby);
        assert_eq!(sm.pending_plan(), Some(plan.id));
    }
}
