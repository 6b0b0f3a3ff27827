//! E2E: explicit stops must never be misread as crashes, whatever the
//! restart policy and however late the exit notification lands.

use std::sync::Arc;
use std::time::Duration;
use sv_e2e_tests::{
    run_supervisor, wait_for, wait_for_running, RecordingObserver, ScriptedLauncher, STARTED,
    STOPPED,
};
use sv_engine::{ObserverSet, ProgramConfig, RestartPolicy};

fn observed() -> (ObserverSet, RecordingObserver) {
    let recorder = RecordingObserver::new();
    let mut set = ObserverSet::new();
    set.push(Arc::new(recorder.clone()));
    (set, recorder)
}

#[tokio::test]
async fn test_stop_is_not_a_crash() {
    let launcher = ScriptedLauncher::new();
    let (observers, recorder) = observed();
    let (handle, _shutdown) = run_supervisor(launcher.clone(), observers);

    handle
        .apply_config(vec![ProgramConfig::new("srv", "sleep 100")
            .autostart(true)
            .autorestart(RestartPolicy::Never)])
        .await
        .unwrap();
    assert!(wait_for_running(&handle, "srv", 1, Duration::from_secs(2)).await);
    let pid = launcher.pids_of("srv")[0];

    handle.stop("srv").await.unwrap();

    // the instance is down immediately, before the exit notification
    assert!(wait_for_running(&handle, "srv", 0, Duration::from_secs(1)).await);
    assert_eq!(launcher.signals(), vec![(pid, libc::SIGTERM)]);

    // the delayed exit notification is absorbed without a respawn
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(launcher.spawn_count(), 1);
    assert_eq!(recorder.count(STOPPED), 1);
}

#[tokio::test]
async fn test_stop_beats_restart_policy_always() {
    let launcher = ScriptedLauncher::new();
    let (observers, recorder) = observed();
    let (handle, _shutdown) = run_supervisor(launcher.clone(), observers);

    handle
        .apply_config(vec![ProgramConfig::new("web", "/usr/bin/web")
            .numprocs(2)
            .autostart(true)
            .autorestart(RestartPolicy::Always)])
        .await
        .unwrap();
    assert!(wait_for_running(&handle, "web", 2, Duration::from_secs(2)).await);

    handle.stop("web").await.unwrap();
    assert!(wait_for_running(&handle, "web", 0, Duration::from_secs(1)).await);

    // exits from the signaled children drain through the queue; none
    // may trigger the always-restart path
    assert!(
        wait_for(|| recorder.count(STOPPED) == 2, Duration::from_secs(1)).await
    );
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(launcher.spawn_count(), 2);
    assert_eq!(recorder.count(STARTED), 2);
}

#[tokio::test]
async fn test_restart_brings_fresh_pids() {
    let launcher = ScriptedLauncher::new();
    let (observers, _recorder) = observed();
    let (handle, _shutdown) = run_supervisor(launcher.clone(), observers);

    handle
        .apply_config(vec![ProgramConfig::new("srv", "sleep 100").autostart(true)])
        .await
        .unwrap();
    assert!(wait_for_running(&handle, "srv", 1, Duration::from_secs(2)).await);
    let first_pid = launcher.pids_of("srv")[0];

    handle.restart("srv").await.unwrap();

    assert!(wait_for_running(&handle, "srv", 1, Duration::from_secs(2)).await);
    let pids = launcher.pids_of("srv");
    assert_eq!(pids.len(), 2);
    assert_ne!(pids[1], first_pid);

    // the old child's exit must not spawn a third instance
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(launcher.spawn_count(), 2);
}
