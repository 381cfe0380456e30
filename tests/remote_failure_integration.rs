mod common;

use std::sync::Arc;

use common::mocks::MockRemoteStore;
use common::offline_support::{new_consigner, record_id, setup_with_remote};
use intake_sync::application::ports::remote_store::{RemoteStoreError, Subscription};
use intake_sync::domain::entities::PushSkipReason;
use intake_sync::domain::value_objects::SyncState;

#[tokio::test]
async fn timeout_is_recorded_like_any_failure() {
    let mut remote = MockRemoteStore::new();
    remote.expect_is_configured().return_const(true);
    remote
        .expect_insert()
        .times(1)
        .returning(|_| Err(RemoteStoreError::Timeout("deadline elapsed".into())));
    remote.expect_select_all().returning(|| Ok(Vec::new()));

    let state = setup_with_remote(Arc::new(remote), true).await;
    state
        .records
        .save_record(new_consigner("f1", "Jane"))
        .await
        .unwrap();

    let report = state.sync.sync_now().await;

    assert_eq!(report.push.failed, 1);
    assert_eq!(report.push.remaining, 1);
    let status = state.records.status();
    assert_eq!(status.pending_count, 1);
    assert!(status.last_error.unwrap().contains("deadline elapsed"));

    let local = state
        .records
        .load_local(&record_id("f1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(local.sync_state, SyncState::Error);
}

#[tokio::test]
async fn duplicate_create_is_replayed_as_upsert() {
    let mut remote = MockRemoteStore::new();
    remote.expect_is_configured().return_const(true);
    remote
        .expect_insert()
        .times(1)
        .returning(|_| Err(RemoteStoreError::Conflict("duplicate key".into())));
    remote
        .expect_upsert()
        .times(1)
        .returning(|record| Ok(record.clone()));
    remote.expect_select_all().returning(|| Ok(Vec::new()));

    let state = setup_with_remote(Arc::new(remote), true).await;
    state
        .records
        .save_record(new_consigner("f1", "Jane"))
        .await
        .unwrap();

    let report = state.sync.sync_now().await;

    assert_eq!(report.push.succeeded, 1);
    assert!(report.push.is_clean());
    let local = state
        .records
        .load_local(&record_id("f1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(local.sync_state, SyncState::Synced);
}

#[tokio::test]
async fn rejected_delete_stays_queued() {
    let mut remote = MockRemoteStore::new();
    remote.expect_is_configured().return_const(true);
    remote
        .expect_insert()
        .returning(|record| Ok(record.clone()));
    remote.expect_delete().times(1).returning(|_| {
        Err(RemoteStoreError::Rejected {
            status: 500,
            body: "boom".into(),
        })
    });
    remote.expect_select_all().returning(|| Ok(Vec::new()));

    let state = setup_with_remote(Arc::new(remote), true).await;
    state
        .records
        .save_record(new_consigner("f1", "Jane"))
        .await
        .unwrap();
    state.sync.sync_now().await;
    state.records.delete_record(&record_id("f1")).await.unwrap();

    let report = state.sync.sync_now().await;

    assert_eq!(report.push.failed, 1);
    assert_eq!(state.records.status().pending_count, 1);
    assert!(
        state
            .records
            .load_record(&record_id("f1"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn unconfigured_remote_is_never_called() {
    let mut remote = MockRemoteStore::new();
    remote.expect_is_configured().return_const(false);
    remote.expect_insert().never();
    remote.expect_upsert().never();
    remote.expect_select_all().never();
    remote
        .expect_subscribe()
        .returning(|_| Ok(Subscription::inert()));

    let state = setup_with_remote(Arc::new(remote), true).await;
    state
        .records
        .save_record(new_consigner("f1", "Jane"))
        .await
        .unwrap();

    let report = state.sync.sync_now().await;

    assert_eq!(report.push.skipped, Some(PushSkipReason::RemoteUnconfigured));
    assert!(report.pull.is_none());
    assert_eq!(state.records.status().pending_count, 1);
}

#[tokio::test]
async fn failed_pull_keeps_local_data() {
    let mut remote = MockRemoteStore::new();
    remote.expect_is_configured().return_const(true);
    remote
        .expect_insert()
        .returning(|record| Ok(record.clone()));
    remote
        .expect_select_all()
        .returning(|| Err(RemoteStoreError::Unreachable("dns failure".into())));

    let state = setup_with_remote(Arc::new(remote), true).await;
    state
        .records
        .save_record(new_consigner("f1", "Jane"))
        .await
        .unwrap();

    let report = state.sync.sync_now().await;

    assert_eq!(report.push.succeeded, 1);
    assert_eq!(report.pull.unwrap().failed, 1);
    assert!(state.records.status().last_error.unwrap().contains("dns failure"));
    assert_eq!(state.records.list_records(None).await.unwrap().len(), 1);
}
