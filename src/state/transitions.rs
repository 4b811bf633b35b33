use std::future::Future;

use tracing::warn;

use crate::{
    error::ServiceError,
    state::state_machine::{PartyEvent, PartyPhase, PartyStateMachine, Plan},
};

/// Plan `event`, run `work` with the plan, then apply it on success or abort it on failure.
///
/// `work` is expected to persist the planned phase; the machine only moves once it succeeded.
pub async fn run_transition<F, Fut, T>(
    machine: &mut PartyStateMachine,
    event: PartyEvent,
    work: F,
) -> Result<(T, PartyPhase), ServiceError>
where
    F: FnOnce(Plan) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let plan = machine.plan(event.clone())?;
    let plan_id = plan.id;

    match work(plan).await {
        Ok(value) => {
            let next = machine.apply(plan_id)?;
            Ok((value, next))
        }
        Err(err) => {
            if let Err(abort_err) = machine.abort(plan_id) {
                warn!(
                    event = ?event,
                    plan_id = %plan_id,
                    error = ?abort_err,
                    "failed to abort transition after work error"
                );
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::state_machine::FinishReason;

    #[tokio::test]
    async fn successful_work_applies_the_plan() {
        let mut sm = PartyStateMachine::new();
        let (version, next) = run_transition(
            &mut sm,
            PartyEvent::Finish(FinishReason::HostEnded),
            |plan| async move { Ok(plan.version_next) },
        )
        .await
        .unwrap();

        assert_eq!(version, 1);
        assert_eq!(next, PartyPhase::Ended);
        assert_eq!(sm.version(), 1);
    }

    #[tokio::test]
    async fn failed_work_aborts_the_plan() {
        let mut sm = PartyStateMachine::new();
        let result: Result<((), PartyPhase), ServiceError> = run_transition(
            &mut sm,
            PartyEvent::Finish(FinishReason::HostEnded),
            |_| async { Err(ServiceError::Degraded) },
        )
        .await;

        assert!(matches!(result, Err(ServiceError::Degraded)));
        assert_eq!(sm.phase(), PartyPhase::Waiting);
        assert!(sm.plan(PartyEvent::Finish(FinishReason::HostEnded)).is_ok());
    }
}
