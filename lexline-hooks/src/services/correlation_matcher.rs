//! Correlation of call-end events to existing Calls
//!
//! The cascade is an ordered list of strategies. Each one reads a single key
//! from the event and performs a single lookup; the first hit wins. Adding a
//! strategy means adding a variant and placing it in [`CORRELATION_CASCADE`].

use lexline_common::Result;
use sqlx::SqliteConnection;

use crate::db::calls::{self, CallRecord};
use crate::models::CorrelationKeys;

/// `correlation_method` recorded for the event that created the Call
pub const METHOD_CREATED: &str = "created";

/// One correlation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationMethod {
    /// Interaction id attached by the system that placed the call
    InteractionId,
    /// Call id attached by the system that placed the call
    ClientCallId,
    /// Voice-AI provider conversation id
    ConversationId,
    /// Telephony provider call id
    CallSid,
}

/// Strategies in priority order
pub const CORRELATION_CASCADE: [CorrelationMethod; 4] = [
    CorrelationMethod::InteractionId,
    CorrelationMethod::ClientCallId,
    CorrelationMethod::ConversationId,
    CorrelationMethod::CallSid,
];

impl CorrelationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrelationMethod::InteractionId => "interaction_id",
            CorrelationMethod::ClientCallId => "client_call_id",
            CorrelationMethod::ConversationId => "conversation_id",
            CorrelationMethod::CallSid => "call_sid",
        }
    }

    /// The event key this strategy consumes
    pub fn key<'a>(&self, keys: &'a CorrelationKeys) -> Option<&'a str> {
        match self {
            CorrelationMethod::InteractionId => keys.interaction_id.as_deref(),
            CorrelationMethod::ClientCallId => keys.client_call_id.as_deref(),
            CorrelationMethod::ConversationId => keys.conversation_id.as_deref(),
            CorrelationMethod::CallSid => keys.call_sid.as_deref(),
        }
    }

    async fn lookup(&self, conn: &mut SqliteConnection, key: &str) -> Result<Option<CallRecord>> {
        match self {
            CorrelationMethod::InteractionId => calls::find_by_interaction_id(conn, key).await,
            CorrelationMethod::ClientCallId => calls::find_by_client_call_id(conn, key).await,
            CorrelationMethod::ConversationId => calls::find_by_elevenlabs_id(conn, key).await,
            CorrelationMethod::CallSid => calls::find_by_twilio_call_sid(conn, key).await,
        }
    }
}

impl std::fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running the cascade
#[derive(Debug, Clone)]
pub enum CorrelationOutcome {
    Matched {
        call: CallRecord,
        method: CorrelationMethod,
    },
    /// No strategy matched; `attempted` lists each strategy that had a key
    Unlinked {
        attempted: Vec<(CorrelationMethod, String)>,
    },
}

/// Run the cascade against the store, stopping at the first hit
pub async fn match_call(
    conn: &mut SqliteConnection,
    keys: &CorrelationKeys,
) -> Result<CorrelationOutcome> {
    let mut attempted = Vec::new();

    for method in CORRELATION_CASCADE {
        let Some(key) = method.key(keys) else {
            continue;
        };

        if let Some(call) = method.lookup(conn, key).await? {
            tracing::debug!(call_id = %call.id, method = %method, "Correlated call-end event");
            return Ok(CorrelationOutcome::Matched { call, method });
        }

        attempted.push((method, key.to_string()));
    }

    Ok(CorrelationOutcome::Unlinked { attempted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::calls::NewCall;
    use crate::db::tenants::insert_organization;
    use crate::services::identity_upsert::upsert_identity;
    use chrono::Utc;
    use lexline_common::db::init_memory_database;
    use uuid::Uuid;

    async fn seed_call(
        conn: &mut SqliteConnection,
        elevenlabs_id: Option<&str>,
        call_sid: Option<&str>,
    ) -> CallRecord {
        let identity = upsert_identity(conn, "org-1", "+15551234567").await.unwrap();
        let id = Uuid::new_v4();
        let interaction_id = Uuid::new_v4();
        crate::db::interactions::insert(conn, interaction_id, identity.lead.id, Utc::now())
            .await
            .unwrap();
        calls::insert(
            conn,
            &NewCall {
                id,
                org_id: "org-1",
                lead_id: identity.lead.id,
                interaction_id,
                phone_number_id: None,
                elevenlabs_id,
                twilio_call_sid: call_sid,
                caller_number: "+15551234567",
                called_number: "+15559990000",
                started_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        calls::find_by_id(conn, id).await.unwrap().unwrap()
    }

    fn keys(
        interaction_id: Option<&str>,
        client_call_id: Option<&str>,
        conversation_id: Option<&str>,
        call_sid: Option<&str>,
    ) -> CorrelationKeys {
        CorrelationKeys {
            interaction_id: interaction_id.map(str::to_string),
            client_call_id: client_call_id.map(str::to_string),
            conversation_id: conversation_id.map(str::to_string),
            call_sid: call_sid.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_interaction_id_beats_conflicting_conversation_id() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        insert_organization(&mut conn, "org-1", "Firm").await.unwrap();

        let addressed = seed_call(&mut conn, Some("conv_a"), None).await;
        let _other = seed_call(&mut conn, Some("conv_b"), None).await;

        let interaction = addressed.interaction_id.to_string();
        let outcome = match_call(&mut conn, &keys(Some(&interaction), None, Some("conv_b"), None))
            .await
            .unwrap();

        match outcome {
            CorrelationOutcome::Matched { call, method } => {
                assert_eq!(call.id, addressed.id);
                assert_eq!(method, CorrelationMethod::InteractionId);
            }
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_client_call_id_matches_own_id_or_call_sid() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        insert_organization(&mut conn, "org-1", "Firm").await.unwrap();

        let call = seed_call(&mut conn, None, Some("CA100")).await;

        for client_id in [call.id.to_string(), "CA100".to_string()] {
            let outcome = match_call(&mut conn, &keys(None, Some(&client_id), None, None))
                .await
                .unwrap();
            assert!(matches!(
                outcome,
                CorrelationOutcome::Matched { method: CorrelationMethod::ClientCallId, .. }
            ));
        }
    }

    #[tokio::test]
    async fn test_falls_through_to_call_sid() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        insert_organization(&mut conn, "org-1", "Firm").await.unwrap();

        let call = seed_call(&mut conn, None, Some("CA200")).await;

        let outcome = match_call(&mut conn, &keys(None, None, Some("conv_unknown"), Some("CA200")))
            .await
            .unwrap();

        match outcome {
            CorrelationOutcome::Matched { call: matched, method } => {
                assert_eq!(matched.id, call.id);
                assert_eq!(method, CorrelationMethod::CallSid);
            }
            other => panic!("expected match, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unlinked_reports_every_attempted_key() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let outcome = match_call(
            &mut conn,
            &keys(Some("int-x"), None, Some("conv_x"), Some("CAx")),
        )
        .await
        .unwrap();

        match outcome {
            CorrelationOutcome::Unlinked { attempted } => {
                assert_eq!(
                    attempted,
                    vec![
                        (CorrelationMethod::InteractionId, "int-x".to_string()),
                        (CorrelationMethod::ConversationId, "conv_x".to_string()),
                        (CorrelationMethod::CallSid, "CAx".to_string()),
                    ]
                );
            }
            other => panic!("expected unlinked, got {:?}", other),
        }
    }
}
