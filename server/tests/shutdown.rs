#![cfg(unix)]

use std::process::Command;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sigterm_triggers_shutdown() {
    let waiter = tokio::spawn(server::shutdown_signal());
    // let the task install its handlers before the signal is sent
    tokio::time::sleep(Duration::from_millis(300)).await;

    let status = Command::new("kill")
        .arg("-TERM")
        .arg(std::process::id().to_string())
        .status()
        .unwrap();
    assert!(status.success());

    tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("shutdown future should resolve on SIGTERM")
        .unwrap();
}
