use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tasklane::engine::with_deadline;
use tasklane::error::Error;

#[tokio::test(start_paused = true)]
async fn success_within_deadline_is_returned_verbatim() {
    let result = with_deadline(
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, Error>(42)
        },
        Duration::from_millis(5000),
    )
    .await;

    assert_eq!(result.unwrap(), 42);
}

#[tokio::test(start_paused = true)]
async fn failure_within_deadline_is_returned_verbatim() {
    let result: tasklane::error::Result<()> = with_deadline(
        async { Err(Error::ExternalCall("status 500".to_string())) },
        Duration::from_millis(5000),
    )
    .await;

    assert!(matches!(result, Err(Error::ExternalCall(ref msg)) if msg == "status 500"));
}

#[tokio::test(start_paused = true)]
async fn exceeding_the_deadline_is_a_timeout() {
    let result = with_deadline(
        async {
            tokio::time::sleep(Duration::from_millis(6000)).await;
            Ok::<_, Error>("late")
        },
        Duration::from_millis(5000),
    )
    .await;

    match result {
        Err(Error::Timeout(d)) => assert_eq!(d, Duration::from_millis(5000)),
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn timed_out_operation_never_runs_its_remaining_steps() {
    let side_effect = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&side_effect);
    let result = with_deadline(
        async move {
            tokio::time::sleep(Duration::from_millis(6000)).await;
            flag.store(true, Ordering::SeqCst);
            Ok::<_, Error>(())
        },
        Duration::from_millis(5000),
    )
    .await;

    assert!(matches!(result, Err(Error::Timeout(_))));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!side_effect.load(Ordering::SeqCst));
}

#[test]
fn timeout_error_names_the_deadline() {
    let err = Error::Timeout(Duration::from_millis(5000));
    assert_eq!(err.to_string(), "task timed out after 5000ms");
}
