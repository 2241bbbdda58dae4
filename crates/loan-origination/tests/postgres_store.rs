//! Runs against a live database: `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`.

use std::sync::Arc;

use chrono::Utc;
use loan_origination::config::AssistantConfig;
use loan_origination::workflows::origination::{
    AgentType, ApplicationWrite, AuditLog, Changeset, ChatCompletionsAssistant, ChatMessage,
    ChatRole, LoanApplication, LoanChatService, LoanStatus, LoanStore, PgLoanStore,
    PipelineConfig, SessionId, SimulatedBureau, StoreError,
};
use serde_json::json;

async fn store() -> PgLoanStore {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL set");
    let store = PgLoanStore::connect(&url, 2).await.expect("connect");
    store.migrate().await.expect("migrations apply");
    store.health_check().await.expect("database answers");
    store
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn guarded_update_rejects_stale_status() {
    let store = store().await;
    let now = Utc::now();
    let mut application = LoanApplication::new(250_000, Some(90_000), now);
    application
        .advance_to(LoanStatus::KycPending, now)
        .expect("legal step");

    store
        .commit(Changeset {
            application: Some(ApplicationWrite::Create(application.clone())),
            audit: vec![AuditLog::record(
                Some(application.id),
                "Application created",
                AgentType::Master,
                Default::default(),
                now,
            )],
            ..Changeset::default()
        })
        .await
        .expect("create");

    let mut stale = application.clone();
    stale.applicant_name = Some("Stale Writer".to_string());
    let err = store
        .commit(Changeset {
            application: Some(ApplicationWrite::Update {
                expected: LoanStatus::Underwriting,
                observed_at: application.updated_at,
                record: stale,
            }),
            audit: vec![AuditLog::record(
                Some(application.id),
                "Should not land",
                AgentType::Underwriting,
                Default::default(),
                now,
            )],
            ..Changeset::default()
        })
        .await
        .expect_err("stale status");
    assert!(matches!(
        err,
        StoreError::StatusConflict {
            expected: LoanStatus::Underwriting,
            found: LoanStatus::KycPending,
        }
    ));

    let stored = store
        .application(&application.id)
        .await
        .expect("read")
        .expect("row exists");
    assert!(stored.applicant_name.is_none());
    let trail = store.audit_trail(&application.id).await.expect("trail");
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action, "Application created");
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn transcript_round_trips_in_order() {
    let store = store().await;
    let session = SessionId(format!("pg-{}", uuid::Uuid::new_v4()));
    let now = Utc::now();
    let messages = vec![
        ChatMessage::new(session.clone(), None, ChatRole::User, "Hi", None, now),
        ChatMessage::new(
            session.clone(),
            None,
            ChatRole::Assistant,
            "How much would you like to borrow?",
            Some(AgentType::Master),
            now,
        ),
    ];
    store
        .commit(Changeset {
            messages: messages.clone(),
            ..Changeset::default()
        })
        .await
        .expect("messages");

    let stored = store.session_messages(&session).await.expect("transcript");
    let contents: Vec<_> = stored.iter().map(|message| message.content.as_str()).collect();
    assert_eq!(contents, ["Hi", "How much would you like to borrow?"]);
    assert_eq!(stored[1].agent_type, Some(AgentType::Master));
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn dispatcher_walks_to_a_decision_on_postgres() {
    let store = Arc::new(store().await);
    let service = LoanChatService::new(
        store.clone(),
        Arc::new(ChatCompletionsAssistant::from_config(&AssistantConfig::default()).expect("client")),
        Arc::new(SimulatedBureau::seeded(11)),
        PipelineConfig::default(),
    );
    let session = format!("pg-flow-{}", uuid::Uuid::new_v4());

    let selected = service
        .dispatch(json!({
            "action": "select_amount",
            "sessionId": session,
            "amount": 200_000,
            "monthlyIncome": 150_000,
        }))
        .await
        .expect("select_amount");
    let id = selected.application().expect("application").id;

    for document_type in ["pan", "aadhaar"] {
        service
            .dispatch(json!({
                "action": "upload_kyc",
                "sessionId": session,
                "applicationId": id,
                "documentType": document_type,
                "fileUrl": "blob://doc",
            }))
            .await
            .expect("upload");
    }

    let view = service.application_view(&id).await.expect("view");
    assert!(view.application.status.is_decided());
    assert_eq!(view.documents.len(), 2);
    assert!(view
        .audit_logs
        .windows(2)
        .all(|pair| pair[0].created_at >= pair[1].created_at));
}
