use std::sync::Arc;
use std::time::Duration;

use u_dispatch::assignment::AssignmentService;
use u_dispatch::models::{AssignmentRequest, Job, JobStatus, Technician};
use u_dispatch::store::InMemoryStore;
use u_dispatch::DispatchError;

fn store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::new().with_lock_timeout(Duration::from_secs(10)))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_assigns_same_job_exactly_one_wins() {
    let store = store();
    store.insert_job(Job::new("J1", "C1").with_location(0.0, 0.0));
    for i in 0..16 {
        store.insert_technician(Technician::new(format!("T{i:02}"), "C1").with_jobs(0, 5));
    }
    let service = AssignmentService::new(Arc::clone(&store));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .assign("J1", &format!("T{i:02}"), "worker", false, None)
                    .await
            })
        })
        .collect();

    let mut wins = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(e) => {
                assert!(matches!(e, DispatchError::JobAlreadyAssigned(_)), "unexpected: {e}");
                assert!(e.is_conflict());
                conflicts += 1;
            }
        }
    }

    assert_eq!(wins, 1);
    assert_eq!(conflicts, 15);
    assert_eq!(store.assignments().len(), 1);

    let winner = store.job("J1").unwrap().assigned_technician_id.unwrap();
    let total: u32 = (0..16)
        .map(|i| store.technician(&format!("T{i:02}")).unwrap().current_job_count)
        .sum();
    assert_eq!(total, 1);
    assert_eq!(store.technician(&winner).unwrap().current_job_count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_assigns_never_exceed_capacity() {
    let store = store();
    for i in 0..10 {
        store.insert_job(Job::new(format!("J{i}"), "C1").with_location(0.0, 0.0));
    }
    store.insert_technician(Technician::new("T1", "C1").with_jobs(0, 3));
    let service = AssignmentService::new(Arc::clone(&store));

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move { service.assign(&format!("J{i}"), "T1", "worker", false, None).await })
        })
        .collect();

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(e) => assert!(matches!(e, DispatchError::TechnicianAtCapacity { .. }), "unexpected: {e}"),
        }
    }

    assert_eq!(wins, 3);
    assert_eq!(store.technician("T1").unwrap().current_job_count, 3);
    let assigned = (0..10)
        .filter(|i| store.job(&format!("J{i}")).unwrap().status == JobStatus::Assigned)
        .count();
    assert_eq!(assigned, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_batches_do_not_deadlock() {
    let store = store();
    for i in 0..20 {
        store.insert_job(Job::new(format!("J{i:02}"), "C1").with_location(0.0, 0.0));
    }
    for t in ["A", "B", "C"] {
        store.insert_technician(Technician::new(t, "C1").with_jobs(0, 4));
    }
    let service = AssignmentService::new(Arc::clone(&store));

    // Each batch names the shared technicians in a different order.
    let orders = [["A", "B", "C"], ["C", "B", "A"], ["B", "C", "A"], ["A", "C", "B"]];
    let handles: Vec<_> = orders
        .iter()
        .enumerate()
        .map(|(n, order)| {
            let service = service.clone();
            let requests: Vec<AssignmentRequest> = (0..5)
                .map(|k| {
                    let job = n * 5 + k;
                    AssignmentRequest::new(format!("J{job:02}"), order[k % 3])
                })
                .collect();
            tokio::spawn(async move { service.assign_many(&requests, "batch").await })
        })
        .collect();

    let mut committed = 0;
    for handle in handles {
        let batch = tokio::time::timeout(Duration::from_secs(30), handle)
            .await
            .expect("batch deadlocked")
            .unwrap()
            .unwrap();
        committed += batch.len();
    }

    // 3 technicians × 4 slots.
    assert_eq!(committed, 12);
    for t in ["A", "B", "C"] {
        assert_eq!(store.technician(t).unwrap().current_job_count, 4);
    }
    assert_eq!(store.assignments().len(), 12);
}
