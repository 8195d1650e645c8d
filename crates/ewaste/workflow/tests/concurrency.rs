mod common;

use common::{vendor, Fixture};
use ewaste_storage::{QueryWindow, RequestFilter};
use ewaste_types::{ItemStatus, RequestStatus};
use ewaste_workflow::{ApprovalInput, WorkflowError};
use futures::future::join_all;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_leave_one_pending_per_vendor() {
    let fx = Fixture::new().await;
    let item = fx.reported_item().await;
    let vendor = vendor();

    let handles = (0..16)
        .map(|_| {
            let coordinator = fx.coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .create_pickup_request(&vendor, item.id, None)
                    .await
            })
        })
        .collect::<Vec<_>>();
    let results = join_all(handles).await;

    let mut ok = 0;
    for result in results {
        match result.unwrap() {
            Ok(_) => ok += 1,
            Err(WorkflowError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(ok, 1);

    let pending = fx
        .coordinator
        .storage()
        .list_requests(
            &RequestFilter::for_item(item.id)
                .with_vendor(vendor.id())
                .with_statuses([RequestStatus::Pending]),
            QueryWindow::all(),
        )
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_yield_one_active_claim() {
    let fx = Fixture::new().await;
    let item = fx.reported_item().await;

    let mut requests = Vec::new();
    for _ in 0..8 {
        requests.push(
            fx.coordinator
                .create_pickup_request(&vendor(), item.id, None)
                .await
                .unwrap(),
        );
    }

    let handles = requests
        .iter()
        .map(|request| {
            let coordinator = fx.coordinator.clone();
            let owner = fx.owner;
            let request_id = request.id;
            tokio::spawn(async move {
                coordinator
                    .approve_request(&owner, request_id, ApprovalInput::default())
                    .await
            })
        })
        .collect::<Vec<_>>();
    let results = join_all(handles).await;

    let mut approved = 0;
    let mut lost = 0;
    for result in results {
        match result.unwrap() {
            Ok(_) => approved += 1,
            Err(WorkflowError::InvalidState(_)) => lost += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(approved, 1);
    assert_eq!(lost, requests.len() - 1);

    let storage = fx.coordinator.storage();
    let active = storage
        .list_requests(
            &RequestFilter::for_item(item.id)
                .with_statuses([RequestStatus::Approved, RequestStatus::Completed]),
            QueryWindow::all(),
        )
        .await
        .unwrap();
    assert_eq!(active.len(), 1);

    let item = storage.get_item(&item.id).await.unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Collected);
    let log = storage
        .list_status_log(&item.id, QueryWindow::all())
        .await
        .unwrap();
    assert_eq!(log.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_advances_append_one_entry_each() {
    let fx = Fixture::new().await;
    let item = fx.reported_item().await;
    let holder = vendor();
    let request = fx
        .coordinator
        .create_pickup_request(&holder, item.id, None)
        .await
        .unwrap();
    fx.coordinator
        .approve_request(&fx.owner, request.id, ApprovalInput::default())
        .await
        .unwrap();

    let handles = (0..10)
        .map(|i| {
            let coordinator = fx.coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .advance_item_status(&holder, item.id, ItemStatus::InStorage, &format!("scan {i}"))
                    .await
            })
        })
        .collect::<Vec<_>>();
    let successes = join_all(handles)
        .await
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();
    assert_eq!(successes, 10);

    let log = fx
        .coordinator
        .status_history(&holder, item.id)
        .await
        .unwrap();
    // One approval entry plus one per successful advance.
    assert_eq!(log.len(), successes + 1);
    assert!(log
        .iter()
        .all(|e| e.from_status.is_some_and(|from| from.rank() <= e.to_status.rank())));
}
