//! Pipeline tests below the HTTP layer
//!
//! Concurrency tests use a file-backed database so the two deliveries really
//! hold separate connections.

use std::sync::Arc;

use async_trait::async_trait;
use lexline_common::db::{init_database, init_memory_database};
use lexline_common::Error;
use lexline_hooks::db::{calls, contacts, leads, tenants};
use lexline_hooks::models::{InboundCallPayload, PostCallPayload, PracticeArea};
use lexline_hooks::services::llm_client::{CompletionClient, LlmError};
use lexline_hooks::services::rule_extractor;
use lexline_hooks::services::{CallEndOutcome, InboundOutcome, IntakeExtractor, WebhookPipeline};
use serde_json::json;
use sqlx::SqlitePool;
use tempfile::TempDir;

const CALLER: &str = "+15551234567";

const TRANSCRIPT: &str = "agent: Thanks for calling, how can we help?\n\
                          user: I slipped and fell at the grocery store and went to the hospital.";

async fn seed_tenant(db: &SqlitePool) {
    let mut conn = db.acquire().await.unwrap();
    tenants::insert_organization(&mut conn, "org-1", "Doe & Roe LLP").await.unwrap();
    tenants::insert_phone_number(
        &mut conn,
        &tenants::PhoneNumberRecord {
            id: "pn-1".to_string(),
            org_id: "org-1".to_string(),
            e164: "+15559990000".to_string(),
            inbound_enabled: true,
        },
    )
    .await
    .unwrap();
}

fn inbound(conversation_id: &str) -> (lexline_hooks::models::InboundCall, String) {
    let raw = json!({
        "caller_id": CALLER,
        "called_number": "+15559990000",
        "conversation_id": conversation_id
    })
    .to_string();
    let payload: InboundCallPayload = serde_json::from_str(&raw).unwrap();
    (payload.validate().unwrap(), raw)
}

fn post_call(conversation_id: &str) -> (lexline_hooks::models::CallEndEvent, String) {
    let raw = json!({
        "conversation_id": conversation_id,
        "transcript": TRANSCRIPT,
        "outcome": "connected"
    })
    .to_string();
    let payload: PostCallPayload = serde_json::from_str(&raw).unwrap();
    (payload.validate().unwrap(), raw)
}

/// Completion client returning fixed content
struct CannedClient(&'static str);

#[async_trait]
impl CompletionClient for CannedClient {
    async fn complete(&self, _transcript: &str, _caller: Option<&str>) -> Result<String, LlmError> {
        Ok(self.0.to_string())
    }
}

// =============================================================================
// Concurrent duplicates
// =============================================================================

#[tokio::test]
async fn test_concurrent_duplicate_inbound_creates_one_call() {
    let dir = TempDir::new().unwrap();
    let db = init_database(&dir.path().join("lexline.db")).await.unwrap();
    seed_tenant(&db).await;
    let pipeline = WebhookPipeline::new(db.clone(), IntakeExtractor::rule_based());

    let (call, raw) = inbound("conv_race");
    let (first, second) = tokio::join!(
        pipeline.handle_inbound(&call, &raw),
        pipeline.handle_inbound(&call, &raw)
    );

    let outcomes = [first.unwrap(), second.unwrap()];
    let created: Vec<_> = outcomes
        .iter()
        .filter_map(|o| match o {
            InboundOutcome::Created(refs) => Some(*refs),
            _ => None,
        })
        .collect();
    assert_eq!(created.len(), 1);
    assert!(outcomes
        .iter()
        .any(|o| *o == InboundOutcome::Duplicate(Some(created[0]))));

    let calls: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM calls")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(calls, 1);
}

#[tokio::test]
async fn test_concurrent_duplicate_post_call_applies_once() {
    let dir = TempDir::new().unwrap();
    let db = init_database(&dir.path().join("lexline.db")).await.unwrap();
    seed_tenant(&db).await;
    let pipeline = WebhookPipeline::new(db.clone(), IntakeExtractor::rule_based());

    let (call, raw) = inbound("conv_race_end");
    pipeline.handle_inbound(&call, &raw).await.unwrap();

    let (event, raw) = post_call("conv_race_end");
    let (first, second) = tokio::join!(
        pipeline.handle_call_end(&event, &raw),
        pipeline.handle_call_end(&event, &raw)
    );

    let outcomes = [first.unwrap(), second.unwrap()];
    let linked = outcomes
        .iter()
        .filter(|o| matches!(o, CallEndOutcome::Linked { .. }))
        .count();
    let duplicates = outcomes
        .iter()
        .filter(|o| matches!(o, CallEndOutcome::Duplicate(Some(_))))
        .count();
    assert_eq!(linked, 1);
    assert_eq!(duplicates, 1);

    let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM webhook_event_links")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(links, 2);
}

// =============================================================================
// Intake extraction
// =============================================================================

#[tokio::test]
async fn test_llm_invalid_json_persists_rule_based_intake() {
    let db = init_memory_database().await.unwrap();
    seed_tenant(&db).await;
    let extractor = IntakeExtractor::with_llm(Arc::new(CannedClient("Sure! Here is the JSON you asked for")));
    let pipeline = WebhookPipeline::new(db.clone(), extractor);

    let (call, raw) = inbound("conv_llm_bad");
    let InboundOutcome::Created(refs) = pipeline.handle_inbound(&call, &raw).await.unwrap() else {
        panic!("expected a new call");
    };
    let (event, raw) = post_call("conv_llm_bad");
    pipeline.handle_call_end(&event, &raw).await.unwrap();

    let mut conn = db.acquire().await.unwrap();
    let lead = leads::find_by_id(&mut conn, refs.lead_id).await.unwrap().unwrap();
    let intake = lead.intake.expect("intake should be stored");

    assert_eq!(intake, rule_extractor::extract(TRANSCRIPT, Some(CALLER)));
    assert_eq!(intake.practice_area, PracticeArea::PersonalInjury);
    // area + medical treatment
    assert_eq!(lead.qualification_score, Some(50));
    assert_eq!(lead.qualification_label.as_deref(), Some("medium"));
    assert_eq!(lead.qualification_reasons.len(), 2);
}

#[tokio::test]
async fn test_llm_output_names_placeholder_contact() {
    let content = r#"{
        "caller": {"firstName": "Jane", "lastName": "Doe", "email": "jane@example.com", "phone": null},
        "practiceArea": "Personal Injury",
        "incidentDate": "last Tuesday",
        "location": "grocery store",
        "summary": "Slip and fall at a grocery store, treated at a hospital.",
        "keyFacts": ["Hospital visit"],
        "urgency": "medium",
        "opposingParty": "grocery store"
    }"#;
    let db = init_memory_database().await.unwrap();
    seed_tenant(&db).await;
    let pipeline = WebhookPipeline::new(db.clone(), IntakeExtractor::with_llm(Arc::new(CannedClient(content))));

    let (call, raw) = inbound("conv_llm_ok");
    let InboundOutcome::Created(refs) = pipeline.handle_inbound(&call, &raw).await.unwrap() else {
        panic!("expected a new call");
    };
    let (event, raw) = post_call("conv_llm_ok");
    pipeline.handle_call_end(&event, &raw).await.unwrap();

    let mut conn = db.acquire().await.unwrap();
    let contact = contacts::find_by_phone(&mut conn, "org-1", CALLER).await.unwrap().unwrap();
    assert_eq!(contact.display_name, "Jane Doe");

    let lead = leads::find_by_id(&mut conn, refs.lead_id).await.unwrap().unwrap();
    let intake = lead.intake.unwrap();
    assert_eq!(intake.caller.phone.as_deref(), Some(CALLER));
    assert_eq!(intake.opposing_party.as_deref(), Some("grocery store"));
    // area, medical, full name, email, date
    assert_eq!(lead.qualification_score, Some(65));
}

#[tokio::test]
async fn test_provider_name_is_not_overwritten_by_extraction() {
    let db = init_memory_database().await.unwrap();
    seed_tenant(&db).await;
    let pipeline = WebhookPipeline::new(db.clone(), IntakeExtractor::rule_based());

    let (call, raw) = inbound("conv_named");
    pipeline.handle_inbound(&call, &raw).await.unwrap();

    let raw = json!({
        "conversation_id": "conv_named",
        "transcript": "user: My name is Janet Smith and I was in a car accident.",
        "extracted_data": {"caller_name": "Jane Doe"}
    })
    .to_string();
    let event = serde_json::from_str::<PostCallPayload>(&raw).unwrap().validate().unwrap();
    pipeline.handle_call_end(&event, &raw).await.unwrap();

    let mut conn = db.acquire().await.unwrap();
    let contact = contacts::find_by_phone(&mut conn, "org-1", CALLER).await.unwrap().unwrap();
    assert_eq!(contact.display_name, "Jane Doe");
}

#[tokio::test]
async fn test_thin_follow_up_call_keeps_earlier_qualification() {
    let db = init_memory_database().await.unwrap();
    seed_tenant(&db).await;
    let pipeline = WebhookPipeline::new(db.clone(), IntakeExtractor::rule_based());

    let mut lead_id = None;
    for (conversation_id, transcript) in [
        (
            "conv_first",
            "user: My name is Jane Doe. I was in a car accident, the other driver ran a red light \
             and hit me. I went to the hospital and I need help right away.",
        ),
        ("conv_second", "user: Hi, just calling to check on the status of my case."),
    ] {
        let (call, raw) = inbound(conversation_id);
        if let InboundOutcome::Created(refs) = pipeline.handle_inbound(&call, &raw).await.unwrap() {
            lead_id = Some(refs.lead_id);
        }
        let raw = json!({"conversation_id": conversation_id, "transcript": transcript}).to_string();
        let event = serde_json::from_str::<PostCallPayload>(&raw).unwrap().validate().unwrap();
        pipeline.handle_call_end(&event, &raw).await.unwrap();
    }

    let lead_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(lead_count, 1);

    let mut conn = db.acquire().await.unwrap();
    let lead = leads::find_by_id(&mut conn, lead_id.unwrap()).await.unwrap().unwrap();

    // area + medical + liability + urgency + full name
    assert_eq!(lead.qualification_score, Some(90));
    assert_eq!(lead.qualification_label.as_deref(), Some("high"));
    assert_eq!(
        lead.qualification_reasons,
        vec![
            "Practice area identified: Personal Injury",
            "Medical treatment mentioned",
            "Liability or witness evidence mentioned",
            "Urgency or deadline mentioned",
            "Caller full name captured",
        ]
    );
    assert!(lead.qualification_signals.medical_treatment);
}

#[tokio::test]
async fn test_run_intake_for_missing_lead_is_not_found() {
    let db = init_memory_database().await.unwrap();
    let pipeline = WebhookPipeline::new(db, IntakeExtractor::rule_based());

    let result = pipeline
        .run_intake(uuid::Uuid::new_v4(), TRANSCRIPT, CALLER)
        .await;

    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_unlinked_event_leaves_calls_untouched() {
    let db = init_memory_database().await.unwrap();
    seed_tenant(&db).await;
    let pipeline = WebhookPipeline::new(db.clone(), IntakeExtractor::rule_based());

    let (call, raw) = inbound("conv_known");
    let InboundOutcome::Created(refs) = pipeline.handle_inbound(&call, &raw).await.unwrap() else {
        panic!("expected a new call");
    };

    let (event, raw) = post_call("conv_unknown");
    assert_eq!(pipeline.handle_call_end(&event, &raw).await.unwrap(), CallEndOutcome::Unlinked);

    let mut conn = db.acquire().await.unwrap();
    let stored = calls::find_by_id(&mut conn, refs.call_id).await.unwrap().unwrap();
    assert_eq!(stored.transcript_text, None);
    assert_eq!(stored.call_outcome, None);
    let lead = leads::find_by_id(&mut conn, refs.lead_id).await.unwrap().unwrap();
    assert!(lead.intake.is_none());
}
