use super::*;
use shared::domain::{Availability, BloodType, RequestDraft, RequestStatus, SubmissionKey, Urgency};

async fn setup() -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    ApiContext { storage }
}

fn create_body(owner: &str) -> CreateBloodRequest {
    CreateBloodRequest {
        owner_id: OwnerId::new(owner),
        submission_key: SubmissionKey::new(),
        draft: RequestDraft {
            patient_name: "Jane Doe".into(),
            blood_type: Some(BloodType::ONegative),
            urgency: Some(Urgency::Critical),
            contact_number: "555-0100".into(),
            ..RequestDraft::default()
        },
    }
}

fn hospital(id: i64) -> Hospital {
    Hospital {
        id: HospitalId(id),
        name: format!("Hospital {id}"),
        location: "Somewhere".into(),
        distance: "1.0 km".into(),
        phone: "+1 234-567-8900".into(),
        availability: Availability::Available,
        blood_bank: true,
    }
}

#[tokio::test]
async fn create_rejects_missing_mandatory_fields() {
    let ctx = setup().await;
    let mut body = create_body("alice");
    body.draft.contact_number = " ".into();
    let err = create_request(&ctx, body).await.expect_err("should fail");
    assert_eq!(err.code, ErrorCode::Validation);
    assert!(err.message.contains("contact number"));
}

#[tokio::test]
async fn create_rejects_blank_owner() {
    let ctx = setup().await;
    let err = create_request(&ctx, create_body("  "))
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn create_then_list_returns_pending_record() {
    let ctx = setup().await;
    let created = create_request(&ctx, create_body("alice"))
        .await
        .expect("create");
    assert_eq!(created.status, RequestStatus::Pending);

    let listed = list_requests(&ctx, &OwnerId::new("alice"))
        .await
        .expect("list");
    assert_eq!(listed, vec![created]);
}

#[tokio::test]
async fn reused_submission_key_with_other_details_is_rejected() {
    let ctx = setup().await;
    let body = create_body("alice");
    let created = create_request(&ctx, body.clone()).await.expect("create");
    let replayed = create_request(&ctx, body.clone()).await.expect("replay");
    assert_eq!(replayed.id, created.id);

    let mut edited = body;
    edited.draft.patient_name = "John Roe".into();
    let err = create_request(&ctx, edited)
        .await
        .expect_err("key reuse should fail");
    assert_eq!(err.code, ErrorCode::Validation);

    let listed = list_requests(&ctx, &OwnerId::new("alice"))
        .await
        .expect("list");
    assert_eq!(listed, vec![created]);
}

#[tokio::test]
async fn attach_requires_non_empty_unique_selection() {
    let ctx = setup().await;
    let created = create_request(&ctx, create_body("alice"))
        .await
        .expect("create");

    let empty = attach_hospitals(&ctx, created.id, Vec::new())
        .await
        .expect_err("empty selection");
    assert_eq!(empty.code, ErrorCode::Validation);

    let duplicated = attach_hospitals(&ctx, created.id, vec![hospital(1), hospital(1)])
        .await
        .expect_err("duplicate selection");
    assert_eq!(duplicated.code, ErrorCode::Validation);

    attach_hospitals(&ctx, created.id, vec![hospital(1), hospital(3)])
        .await
        .expect("attach");
    let stored = get_request(&ctx, created.id).await.expect("get");
    assert_eq!(stored.hospital_count(), 2);
}

#[tokio::test]
async fn attach_to_unknown_request_is_not_found() {
    let ctx = setup().await;
    let err = attach_hospitals(&ctx, RequestId::new(), vec![hospital(1)])
        .await
        .expect_err("unknown id");
    assert_eq!(err.code, ErrorCode::NotFound);
}
