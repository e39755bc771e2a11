//! Step recovery and mid-tick population changes, driven through the
//! facade with the shared scripted fixture.

use flock::engine::AgentStatus;
use flock::prelude::*;
use flock_test_utils::{scripted_model, Scripted};

fn steps(m: &Model<Scripted>, id: AgentId) -> Option<u32> {
    m.agent(id).map(|p| p.steps)
}

#[test]
fn abort_keeps_tick_and_applied_changes() {
    let scripts = [Scripted::new(), Scripted::new().failing_on(2)];
    let mut m = scripted_model(scripts, Activation::Sequential, StepRecovery::AbortTick).unwrap();
    let ids = m.agents().ids();

    let err = m.run_for(3).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StepFailure);
    assert_eq!(err.agent(), Some(ids[1]));
    assert_eq!(err.tick(), Some(TickId(1)));
    assert_eq!(m.tick(), TickId(1));
    // The first agent already ran in the aborted tick.
    assert_eq!(steps(&m, ids[0]), Some(2));
}

#[test]
fn skip_leaves_failing_agent_scheduled() {
    let scripts = [Scripted::new(), Scripted::new().failing_on(2)];
    let mut m = scripted_model(scripts, Activation::Random, StepRecovery::SkipAgent).unwrap();
    let ids = m.agents().ids();

    m.run_for(3).unwrap();
    assert_eq!(m.tick(), TickId(3));
    assert_eq!(steps(&m, ids[0]), Some(3));
    assert_eq!(steps(&m, ids[1]), Some(3));
    assert!(m.scheduler().contains(ids[1]));
}

#[test]
fn remove_drops_failing_agent() {
    let scripts = [Scripted::new(), Scripted::new().failing_on(2)];
    let mut m = scripted_model(scripts, Activation::Random, StepRecovery::RemoveAgent).unwrap();
    let ids = m.agents().ids();

    m.run_for(3).unwrap();
    assert_eq!(m.agents().count(), 1);
    assert_eq!(m.agents().status(ids[1]), AgentStatus::Removed);
    assert!(!m.scheduler().contains(ids[1]));
    assert_eq!(steps(&m, ids[0]), Some(3));
}

#[test]
fn newborns_start_next_tick() {
    let mut m = scripted_model(
        [Scripted::new().spawning_on(1)],
        Activation::Sequential,
        StepRecovery::AbortTick,
    )
    .unwrap();
    m.step().unwrap();
    let ids = m.agents().ids();
    assert_eq!(ids.len(), 2);
    assert_eq!(steps(&m, ids[1]), Some(0));

    m.step().unwrap();
    assert_eq!(steps(&m, ids[0]), Some(2));
    assert_eq!(steps(&m, ids[1]), Some(1));
}

#[test]
fn self_removal_leaves_tombstone() {
    let scripts = [Scripted::new().removing_on(1), Scripted::new()];
    let mut m = scripted_model(scripts, Activation::Random, StepRecovery::AbortTick).unwrap();
    let ids = m.agents().ids();

    m.run_for(2).unwrap();
    assert_eq!(m.agents().status(ids[0]), AgentStatus::Removed);
    assert!(m.agent(ids[0]).is_none());
    assert_eq!(steps(&m, ids[1]), Some(2));
    assert_eq!(m.scheduler().len(), 1);
}
