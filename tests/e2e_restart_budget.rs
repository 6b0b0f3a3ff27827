//! E2E: retry budget and restart policies through the full control
//! loop, with scripted child exits.

use std::sync::Arc;
use std::time::Duration;
use sv_e2e_tests::{
    run_supervisor, wait_for, wait_for_running, ExitPlan, RecordingObserver, ScriptedLauncher,
    FATAL, STARTED,
};
use sv_engine::{ObserverSet, ProgramConfig, RestartPolicy};

fn observed() -> (ObserverSet, RecordingObserver) {
    let recorder = RecordingObserver::new();
    let mut set = ObserverSet::new();
    set.push(Arc::new(recorder.clone()));
    (set, recorder)
}

#[tokio::test]
async fn test_startup_failures_burn_the_budget_then_go_fatal() {
    let launcher = ScriptedLauncher::new();
    // initial attempt plus two retries, all dying young with code 1
    launcher.plan(
        "web",
        vec![ExitPlan::exit_with(5, 1); 3],
    );
    let (observers, recorder) = observed();
    let (handle, _shutdown) = run_supervisor(launcher.clone(), observers);

    handle
        .apply_config(vec![ProgramConfig::new("web", "/bin/false")
            .autorestart(RestartPolicy::Always)
            .startretries(2)
            .starttime(Duration::from_secs(5))])
        .await
        .unwrap();
    handle.start("web").await.unwrap();

    assert!(
        wait_for(|| launcher.spawn_count() == 3, Duration::from_secs(2)).await,
        "expected initial attempt plus two retries"
    );
    assert!(
        wait_for(|| recorder.count(FATAL) == 1, Duration::from_secs(2)).await,
        "expected the instance to go fatal"
    );

    // no further attempts once the budget is spent
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(launcher.spawn_count(), 3);
    assert_eq!(recorder.count(STARTED), 3);

    let status = handle.status().await.unwrap();
    assert_eq!(status[0].running, 0);
    assert_eq!(status[0].desired, 1);
}

#[tokio::test]
async fn test_unexpected_policy_rides_through_a_young_exit() {
    let launcher = ScriptedLauncher::new();
    launcher.plan(
        "srv",
        vec![ExitPlan::exit_with(5, 0), ExitPlan::RunUntilSignaled],
    );
    let (observers, _recorder) = observed();
    let (handle, _shutdown) = run_supervisor(launcher.clone(), observers);

    handle
        .apply_config(vec![ProgramConfig::new("srv", "/usr/bin/srv")
            .autostart(true)
            .autorestart(RestartPolicy::Unexpected)
            .starttime(Duration::from_secs(5))])
        .await
        .unwrap();

    // the young clean exit is unexpected, so a replacement comes up
    assert!(wait_for(|| launcher.spawn_count() == 2, Duration::from_secs(2)).await);
    assert!(wait_for_running(&handle, "srv", 1, Duration::from_secs(2)).await);
}

#[tokio::test]
async fn test_always_policy_leaves_allowed_exits_down() {
    let launcher = ScriptedLauncher::new();
    launcher.plan("job", vec![ExitPlan::exit_with(5, 0)]);
    let (observers, _recorder) = observed();
    let (handle, _shutdown) = run_supervisor(launcher.clone(), observers);

    handle
        .apply_config(vec![ProgramConfig::new("job", "/usr/bin/job")
            .autostart(true)
            .autorestart(RestartPolicy::Always)
            .starttime(Duration::ZERO)])
        .await
        .unwrap();

    assert!(wait_for_running(&handle, "job", 0, Duration::from_secs(2)).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(launcher.spawn_count(), 1, "allowed exit must not respawn");
}

#[tokio::test]
async fn test_steady_state_crash_restarts_under_always() {
    let launcher = ScriptedLauncher::new();
    launcher.plan(
        "api",
        vec![ExitPlan::exit_with(5, 3), ExitPlan::RunUntilSignaled],
    );
    let (observers, _recorder) = observed();
    let (handle, _shutdown) = run_supervisor(launcher.clone(), observers);

    handle
        .apply_config(vec![ProgramConfig::new("api", "/usr/bin/api")
            .autostart(true)
            .autorestart(RestartPolicy::Always)
            .starttime(Duration::ZERO)])
        .await
        .unwrap();

    assert!(wait_for(|| launcher.spawn_count() == 2, Duration::from_secs(2)).await);
    assert!(wait_for_running(&handle, "api", 1, Duration::from_secs(2)).await);
}

#[tokio::test]
async fn test_spawn_failure_counts_as_a_retry() {
    let launcher = ScriptedLauncher::new();
    launcher.plan(
        "flaky",
        vec![
            ExitPlan::exit_with(5, 1),
            ExitPlan::FailSpawn,
            ExitPlan::RunUntilSignaled,
        ],
    );
    let (observers, _recorder) = observed();
    let (handle, _shutdown) = run_supervisor(launcher.clone(), observers);

    handle
        .apply_config(vec![ProgramConfig::new("flaky", "/usr/bin/flaky")
            .autostart(true)
            .autorestart(RestartPolicy::Always)
            .startretries(3)
            .starttime(Duration::from_secs(5))])
        .await
        .unwrap();

    // attempt 1 dies young, attempt 2 fails to even spawn, attempt 3
    // finally sticks
    assert!(wait_for_running(&handle, "flaky", 1, Duration::from_secs(2)).await);
    assert_eq!(launcher.spawn_count(), 2, "failed spawn allocates no pid");
}
