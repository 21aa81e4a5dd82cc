use chrono::{Duration, Utc};

use stowage_core::{FileRecord, ObjectId, RecordState};

use crate::error::MetadataError;
use crate::store::MetadataStore;

fn reservation(name: &str) -> FileRecord {
    FileRecord::reserve(ObjectId::allocate(), name, Utc::now())
}

/// Run the full metadata store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub async fn run_metadata_conformance_tests(
    store: &dyn MetadataStore,
) -> Result<(), MetadataError> {
    test_get_missing(store).await?;
    test_reservation_not_visible(store).await?;
    test_commit_makes_visible(store).await?;
    test_duplicate_reserve_conflicts(store).await?;
    test_commit_without_reservation(store).await?;
    test_delete_idempotent(store).await?;
    test_range_bounds_and_order(store).await?;
    test_stale_reservations(store).await?;
    Ok(())
}

async fn test_get_missing(store: &dyn MetadataStore) -> Result<(), MetadataError> {
    let id = ObjectId::allocate();
    let found = store.get(&id).await?;
    assert!(found.is_none(), "get on unknown id should return None");
    Ok(())
}

async fn test_reservation_not_visible(store: &dyn MetadataStore) -> Result<(), MetadataError> {
    let record = reservation("pending.bin");
    store.reserve(&record).await?;

    let found = store.get(&record.id).await?;
    assert!(found.is_none(), "reservations must not be readable via get");

    let removed = store.remove_reservation(&record.id).await?;
    assert!(removed, "remove_reservation should report the row");
    Ok(())
}

async fn test_commit_makes_visible(store: &dyn MetadataStore) -> Result<(), MetadataError> {
    let record = reservation("visible.txt");
    store.reserve(&record).await?;

    let committed_at = Utc::now();
    let committed = store.commit(&record.id, 42, committed_at).await?;
    let committed = committed.expect("commit should find the reservation");
    assert_eq!(committed.state, RecordState::Committed);
    assert_eq!(committed.size, 42);
    assert_eq!(committed.display_name, "visible.txt");
    assert_eq!(committed.stored_name, record.stored_name);

    let found = store.get(&record.id).await?;
    let found = found.expect("committed record should be readable");
    assert_eq!(found.size, 42);
    assert!(found.created_at.is_some(), "commit must set created_at");
    Ok(())
}

async fn test_duplicate_reserve_conflicts(
    store: &dyn MetadataStore,
) -> Result<(), MetadataError> {
    let record = reservation("dup.txt");
    store.reserve(&record).await?;

    let second = store.reserve(&record).await;
    assert!(
        matches!(second, Err(MetadataError::Conflict(_))),
        "re-reserving the same id should conflict"
    );
    Ok(())
}

async fn test_commit_without_reservation(
    store: &dyn MetadataStore,
) -> Result<(), MetadataError> {
    let id = ObjectId::allocate();
    let committed = store.commit(&id, 1, Utc::now()).await?;
    assert!(
        committed.is_none(),
        "commit without a reservation should return None"
    );
    Ok(())
}

async fn test_delete_idempotent(store: &dyn MetadataStore) -> Result<(), MetadataError> {
    let record = reservation("to-delete.txt");
    store.reserve(&record).await?;
    store.commit(&record.id, 10, Utc::now()).await?;

    let removed = store.delete(&record.id).await?;
    assert!(removed, "first delete should report the record");

    let removed = store.delete(&record.id).await?;
    assert!(!removed, "second delete should report absence");

    let found = store.get(&record.id).await?;
    assert!(found.is_none(), "deleted record should be gone immediately");
    Ok(())
}

async fn test_range_bounds_and_order(store: &dyn MetadataStore) -> Result<(), MetadataError> {
    let base = Utc::now() - Duration::days(400);

    // Three committed records one day apart, committed out of order to
    // exercise the ordering contract.
    let mut ids = Vec::new();
    for offset in [2_i64, 0, 1] {
        let record = reservation(&format!("range-{offset}.txt"));
        store.reserve(&record).await?;
        store
            .commit(&record.id, 1, base + Duration::days(offset))
            .await?;
        ids.push((offset, record.id));
    }

    let results = store.range(base, base + Duration::days(2)).await?;
    let in_window: Vec<_> = results
        .iter()
        .filter(|r| ids.iter().any(|(_, id)| *id == r.id))
        .collect();
    assert_eq!(in_window.len(), 3, "inclusive bounds should cover all three");
    let times: Vec<_> = in_window.iter().map(|r| r.created_at).collect();
    let mut sorted = times.clone();
    sorted.sort();
    assert_eq!(times, sorted, "range results must be ascending by created_at");

    // Exclusive of anything outside the window.
    let results = store
        .range(base + Duration::days(1), base + Duration::days(1))
        .await?;
    let in_window: Vec<_> = results
        .iter()
        .filter(|r| ids.iter().any(|(_, id)| *id == r.id))
        .collect();
    assert_eq!(in_window.len(), 1, "single-day window should match one record");

    for (_, id) in ids {
        store.delete(&id).await?;
    }
    Ok(())
}

async fn test_stale_reservations(store: &dyn MetadataStore) -> Result<(), MetadataError> {
    let old = FileRecord {
        reserved_at: Utc::now() - Duration::hours(2),
        ..reservation("stale.bin")
    };
    let fresh = reservation("fresh.bin");
    store.reserve(&old).await?;
    store.reserve(&fresh).await?;

    let cutoff = Utc::now() - Duration::hours(1);
    let stale = store.stale_reservations(cutoff).await?;
    assert!(
        stale.iter().any(|r| r.id == old.id),
        "old reservation should be reported stale"
    );
    assert!(
        !stale.iter().any(|r| r.id == fresh.id),
        "fresh reservation must not be reported stale"
    );

    assert!(store.remove_reservation(&old.id).await?);
    assert!(
        !store.remove_reservation(&old.id).await?,
        "removing a reservation twice should report absence"
    );
    store.remove_reservation(&fresh.id).await?;
    Ok(())
}
