use super::*;
use shared::domain::{Availability, HospitalId};

fn jane_doe() -> RequestDetails {
    RequestDetails {
        patient_name: "Jane Doe".into(),
        age: Some(34),
        blood_type: BloodType::ONegative,
        urgency: Urgency::Critical,
        units_needed: Some(2),
        contact_number: "555-0100".into(),
        address: None,
        medical_notes: Some("post-partum hemorrhage".into()),
    }
}

fn hospital(id: i64, name: &str) -> Hospital {
    Hospital {
        id: HospitalId(id),
        name: name.into(),
        location: "123 Main Street, Downtown".into(),
        distance: "2.5 km".into(),
        phone: "+1 234-567-8900".into(),
        availability: Availability::Available,
        blood_bank: true,
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("requests.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn created_request_starts_pending_without_hospitals() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = OwnerId::new("owner-1");
    let created = storage
        .create_blood_request(&owner, &jane_doe(), SubmissionKey::new())
        .await
        .expect("create");

    assert!(!created.replayed);
    assert_eq!(created.request.status, RequestStatus::Pending);
    assert_eq!(created.request.details, jane_doe());
    assert_eq!(created.request.owner_id, owner);
    assert_eq!(created.request.selected_hospitals, None);

    let listed = storage
        .list_blood_requests_for_owner(&owner)
        .await
        .expect("list");
    assert_eq!(listed, vec![created.request]);
}

#[tokio::test]
async fn repeated_submission_key_returns_the_first_record() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = OwnerId::new("owner-1");
    let key = SubmissionKey::new();

    let first = storage
        .create_blood_request(&owner, &jane_doe(), key)
        .await
        .expect("first");
    let second = storage
        .create_blood_request(&owner, &jane_doe(), key)
        .await
        .expect("second");

    assert!(second.replayed);
    assert_eq!(first.request.id, second.request.id);
    let listed = storage
        .list_blood_requests_for_owner(&owner)
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn replay_with_different_details_is_flagged() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = OwnerId::new("owner-1");
    let key = SubmissionKey::new();
    let first = storage
        .create_blood_request(&owner, &jane_doe(), key)
        .await
        .expect("first");
    assert!(!first.conflicts_with(&jane_doe()));

    let mut renamed = jane_doe();
    renamed.patient_name = "John Roe".into();
    let replay = storage
        .create_blood_request(&owner, &renamed, key)
        .await
        .expect("replay");

    assert!(replay.replayed);
    assert!(replay.conflicts_with(&renamed));
    assert!(!replay.conflicts_with(&jane_doe()));
    assert_eq!(replay.request.details.patient_name, "Jane Doe");
}

#[tokio::test]
async fn submission_keys_are_scoped_per_owner() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let key = SubmissionKey::new();
    let alice = storage
        .create_blood_request(&OwnerId::new("alice"), &jane_doe(), key)
        .await
        .expect("alice");
    let bob = storage
        .create_blood_request(&OwnerId::new("bob"), &jane_doe(), key)
        .await
        .expect("bob");
    assert!(!bob.replayed);
    assert_ne!(alice.request.id, bob.request.id);
}

#[tokio::test]
async fn lists_newest_first_and_only_for_owner() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = OwnerId::new("owner-1");
    let mut created = Vec::new();
    for name in ["first", "second", "third"] {
        let mut details = jane_doe();
        details.patient_name = name.into();
        created.push(
            storage
                .create_blood_request(&owner, &details, SubmissionKey::new())
                .await
                .expect("create")
                .request
                .id,
        );
    }
    storage
        .create_blood_request(&OwnerId::new("someone-else"), &jane_doe(), SubmissionKey::new())
        .await
        .expect("other owner");

    let listed: Vec<RequestId> = storage
        .list_blood_requests_for_owner(&owner)
        .await
        .expect("list")
        .into_iter()
        .map(|request| request.id)
        .collect();
    created.reverse();
    assert_eq!(listed, created);
}

#[tokio::test]
async fn owner_without_requests_gets_empty_list() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let listed = storage
        .list_blood_requests_for_owner(&OwnerId::new("nobody"))
        .await
        .expect("list");
    assert!(listed.is_empty());
}

#[tokio::test]
async fn attach_hospitals_replaces_list_and_keeps_other_fields() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = OwnerId::new("owner-1");
    let created = storage
        .create_blood_request(&owner, &jane_doe(), SubmissionKey::new())
        .await
        .expect("create")
        .request;

    let first_pick = vec![hospital(1, "City General Hospital")];
    assert!(storage
        .attach_hospitals(created.id, &first_pick)
        .await
        .expect("attach"));
    let final_pick = vec![
        hospital(1, "City General Hospital"),
        hospital(3, "Regional Healthcare Complex"),
    ];
    assert!(storage
        .attach_hospitals(created.id, &final_pick)
        .await
        .expect("attach again"));
    assert!(storage
        .attach_hospitals(created.id, &final_pick)
        .await
        .expect("attach idempotent"));

    let stored = storage
        .get_blood_request(created.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(stored.selected_hospitals, Some(final_pick));
    assert_eq!(stored.status, created.status);
    assert_eq!(stored.created_at, created.created_at);
    assert_eq!(stored.details, created.details);
}

#[tokio::test]
async fn attach_hospitals_reports_unknown_record() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let attached = storage
        .attach_hospitals(RequestId::new(), &[hospital(1, "City General Hospital")])
        .await
        .expect("attach");
    assert!(!attached);
}

#[tokio::test]
async fn malformed_selected_hospitals_column_reads_as_absent() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = OwnerId::new("owner-1");
    let created = storage
        .create_blood_request(&owner, &jane_doe(), SubmissionKey::new())
        .await
        .expect("create")
        .request;

    for raw in ["{\"1\": true}", "not json at all", "[1, 2, 3]"] {
        sqlx::query("UPDATE blood_requests SET selected_hospitals = ? WHERE id = ?")
            .bind(raw)
            .bind(created.id.to_string())
            .execute(storage.pool())
            .await
            .expect("raw update");
        let listed = storage
            .list_blood_requests_for_owner(&owner)
            .await
            .expect("list survives malformed data");
        assert_eq!(listed[0].selected_hospitals, None, "raw value {raw}");
        assert_eq!(listed[0].hospital_count(), 0);
    }
}

#[tokio::test]
async fn unreadable_rows_are_skipped_in_owner_listing() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = OwnerId::new("owner-1");
    let mut ids = Vec::new();
    for _ in 0..3 {
        let created = storage
            .create_blood_request(&owner, &jane_doe(), SubmissionKey::new())
            .await
            .expect("create");
        ids.push(created.request.id);
    }

    sqlx::query("UPDATE blood_requests SET blood_type = 'Z+' WHERE id = ?")
        .bind(ids[0].to_string())
        .execute(storage.pool())
        .await
        .expect("corrupt blood type");
    sqlx::query("UPDATE blood_requests SET created_at = 'yesterday' WHERE id = ?")
        .bind(ids[1].to_string())
        .execute(storage.pool())
        .await
        .expect("corrupt created_at");

    let listed = storage
        .list_blood_requests_for_owner(&owner)
        .await
        .expect("list survives unreadable rows");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, ids[2]);
    assert!(storage.get_blood_request(ids[0]).await.is_err());
}

#[tokio::test]
async fn review_moves_pending_requests_only_once() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let created = storage
        .create_blood_request(&OwnerId::new("owner-1"), &jane_doe(), SubmissionKey::new())
        .await
        .expect("create")
        .request;

    let outcome = storage
        .review_blood_request(created.id, ReviewDecision::Approve)
        .await
        .expect("approve");
    assert!(
        matches!(outcome, ReviewOutcome::Reviewed(ref request) if request.status == RequestStatus::Approved)
    );

    let again = storage
        .review_blood_request(created.id, ReviewDecision::Reject)
        .await
        .expect("reject");
    assert!(matches!(
        again,
        ReviewOutcome::AlreadyReviewed(RequestStatus::Approved)
    ));

    let missing = storage
        .review_blood_request(RequestId::new(), ReviewDecision::Reject)
        .await
        .expect("missing");
    assert!(matches!(missing, ReviewOutcome::NotFound));
}
