use std::sync::Arc;
use taskruntime::AdmissionControl;
use tokio::sync::Barrier;

#[test]
fn test_sequential_reservations_succeed_until_capacity() {
    let admission = AdmissionControl::new(3);
    assert!(admission.try_reserve());
    assert!(admission.try_reserve());
    assert!(admission.try_reserve());
    assert!(!admission.try_reserve());
    assert_eq!(admission.active(), 3);

    admission.release();
    assert!(admission.try_reserve());
    assert_eq!(admission.active(), 3);
}

#[test]
fn test_release_never_underflows() {
    let admission = AdmissionControl::new(1);
    admission.release();
    assert_eq!(admission.active(), 0);
    assert!(admission.try_reserve());
    assert!(!admission.try_reserve());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_one_over_capacity_is_rejected_under_contention() {
    const MAX: usize = 16;
    let admission = Arc::new(AdmissionControl::new(MAX));
    let barrier = Arc::new(Barrier::new(MAX + 1));

    let mut handles = Vec::new();
    for _ in 0..=MAX {
        let admission = admission.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            admission.try_reserve()
        }));
    }

    let mut admitted = 0;
    let mut rejected = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        } else {
            rejected += 1;
        }
    }
    assert_eq!(admitted, MAX);
    assert_eq!(rejected, 1);
    assert_eq!(admission.active(), MAX);

    for _ in 0..admitted {
        admission.release();
    }
    assert_eq!(admission.active(), 0);
}
