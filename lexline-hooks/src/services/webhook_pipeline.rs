//! Webhook event pipeline
//!
//! One transaction per event. The ledger insert is its first statement, so a
//! concurrent duplicate blocks on the SQLite write lock and then observes the
//! conflict. Everything the event changes is written in the same transaction,
//! or not at all.
//!
//! **Stages (call-end events):**
//! 1. Record in the idempotency ledger (duplicate: stop)
//! 2. Run the correlation cascade (no match: commit ledger row, unlinked)
//! 3. Guarded merge into the Call, close the Interaction
//! 4. Merge provider data into the Lead and Contact
//! 5. Link the ledger entry to the Call and commit
//! 6. After commit: intake extraction and qualification (failures logged)

use chrono::Utc;
use lexline_common::phone::{mask_optional, mask_phone};
use lexline_common::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db::calls::{self, NewCall};
use crate::db::ledger::{self, NewWebhookEvent};
use crate::db::{contacts, interactions, leads};
use crate::models::{CallEndEvent, InboundCall, Provider, EVENT_INBOUND};
use crate::services::correlation_matcher::{
    match_call, CorrelationMethod, CorrelationOutcome, METHOD_CREATED,
};
use crate::services::enrichment_merger::{merge_extracted_data, plan_call_update, provider_caller_name};
use crate::services::identity_upsert::upsert_identity;
use crate::services::intake_extractor::IntakeExtractor;
use crate::services::qualification_scorer::{self, Qualification, TranscriptSignals};
use crate::services::tenant_resolver::resolve_tenant;

/// Identifiers of a Call and its parents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallRefs {
    pub call_id: Uuid,
    pub lead_id: Uuid,
    pub interaction_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    Created(CallRefs),
    /// Already processed; refs of the Call the first delivery created
    Duplicate(Option<CallRefs>),
    /// Dialed number belongs to no tenant; nothing was written
    TenantNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEndOutcome {
    Linked {
        refs: CallRefs,
        method: CorrelationMethod,
    },
    /// Recorded but matched no Call (terminal, never retried)
    Unlinked,
    /// Already processed; refs of the Call it was linked to, if any
    Duplicate(Option<CallRefs>),
}

/// Qualification written to a lead after extraction
#[derive(Debug, Clone)]
pub struct IntakeOutcome {
    pub lead_id: Uuid,
    pub qualification: Qualification,
}

#[derive(Debug, Clone)]
pub struct WebhookPipeline {
    db: SqlitePool,
    extractor: IntakeExtractor,
}

impl WebhookPipeline {
    pub fn new(db: SqlitePool, extractor: IntakeExtractor) -> Self {
        Self { db, extractor }
    }

    /// Process a call-start event: tenant, identity, Interaction and Call
    pub async fn handle_inbound(&self, call: &InboundCall, raw_payload: &str) -> Result<InboundOutcome> {
        let mut tx = self.db.begin().await?;

        let recorded = ledger::record_event(
            &mut tx,
            &NewWebhookEvent {
                provider: Provider::ElevenLabs.as_str(),
                external_id: call.external_id(),
                event_type: EVENT_INBOUND,
                payload: raw_payload,
            },
        )
        .await?;

        let Some(event_id) = recorded.event_id.filter(|_| recorded.is_new) else {
            tx.rollback().await?;
            tracing::info!(
                provider = Provider::ElevenLabs.as_str(),
                external_id = %call.external_id(),
                event_type = EVENT_INBOUND,
                "Duplicate webhook event ignored"
            );
            let refs = self
                .linked_refs(Provider::ElevenLabs, call.external_id(), EVENT_INBOUND)
                .await?;
            return Ok(InboundOutcome::Duplicate(refs));
        };

        let Some(tenant) = resolve_tenant(&mut tx, &call.called_e164).await? else {
            // Nothing is kept, so a retry after the number is configured succeeds
            tx.rollback().await?;
            return Ok(InboundOutcome::TenantNotFound);
        };

        let identity = upsert_identity(&mut tx, &tenant.org_id, &call.caller_e164).await?;

        let now = Utc::now();
        let refs = CallRefs {
            call_id: Uuid::new_v4(),
            lead_id: identity.lead.id,
            interaction_id: Uuid::new_v4(),
        };

        interactions::insert(&mut tx, refs.interaction_id, refs.lead_id, now).await?;
        calls::insert(
            &mut tx,
            &NewCall {
                id: refs.call_id,
                org_id: &tenant.org_id,
                lead_id: refs.lead_id,
                interaction_id: refs.interaction_id,
                phone_number_id: Some(&tenant.phone_number_id),
                elevenlabs_id: call.conversation_id.as_deref(),
                twilio_call_sid: call.call_sid.as_deref(),
                caller_number: &call.caller_e164,
                called_number: &call.called_e164,
                started_at: now,
            },
        )
        .await?;
        ledger::link_event(&mut tx, event_id, refs.call_id, METHOD_CREATED).await?;

        tx.commit().await?;

        tracing::info!(
            call_id = %refs.call_id,
            lead_id = %refs.lead_id,
            interaction_id = %refs.interaction_id,
            org_id = %tenant.org_id,
            caller = %mask_phone(&call.caller_e164),
            "Inbound call recorded"
        );

        Ok(InboundOutcome::Created(refs))
    }

    /// Process a call-end event (post-call summary or telephony status)
    pub async fn handle_call_end(&self, event: &CallEndEvent, raw_payload: &str) -> Result<CallEndOutcome> {
        let mut tx = self.db.begin().await?;

        let recorded = ledger::record_event(
            &mut tx,
            &NewWebhookEvent {
                provider: event.provider.as_str(),
                external_id: &event.external_id,
                event_type: &event.event_type,
                payload: raw_payload,
            },
        )
        .await?;

        let Some(event_id) = recorded.event_id.filter(|_| recorded.is_new) else {
            tx.rollback().await?;
            tracing::info!(
                provider = event.provider.as_str(),
                external_id = %event.external_id,
                event_type = %event.event_type,
                "Duplicate webhook event ignored"
            );
            let refs = self
                .linked_refs(event.provider, &event.external_id, &event.event_type)
                .await?;
            return Ok(CallEndOutcome::Duplicate(refs));
        };

        let (call, method) = match match_call(&mut tx, &event.keys).await? {
            CorrelationOutcome::Matched { call, method } => (call, method),
            CorrelationOutcome::Unlinked { attempted } => {
                tx.commit().await?;
                let attempted_keys = attempted
                    .iter()
                    .map(|(method, key)| format!("{}={}", method, key))
                    .collect::<Vec<_>>()
                    .join(", ");
                tracing::warn!(
                    provider = event.provider.as_str(),
                    external_id = %event.external_id,
                    event_type = %event.event_type,
                    ledger_id = event_id,
                    caller = %mask_optional(event.caller_e164.as_deref()),
                    called = %mask_optional(event.called_e164.as_deref()),
                    attempted = %attempted_keys,
                    "Unlinked call-end event: no Call matched any correlation key"
                );
                return Ok(CallEndOutcome::Unlinked);
            }
        };

        let patch = plan_call_update(&call, &event.enrichment);
        calls::apply_patch(&mut tx, call.id, &patch).await?;

        if event.terminal {
            let ended_at = event.enrichment.ended_at.unwrap_or_else(Utc::now);
            interactions::complete(&mut tx, call.interaction_id, ended_at).await?;
        }

        if let Some(extracted) = &event.extracted_data {
            merge_provider_data(&mut tx, call.lead_id, extracted).await?;
        }

        ledger::link_event(&mut tx, event_id, call.id, method.as_str()).await?;
        tx.commit().await?;

        let refs = CallRefs {
            call_id: call.id,
            lead_id: call.lead_id,
            interaction_id: call.interaction_id,
        };

        tracing::info!(
            call_id = %refs.call_id,
            lead_id = %refs.lead_id,
            provider = event.provider.as_str(),
            event_type = %event.event_type,
            correlation_method = %method,
            fields_updated = patch.len(),
            "Call-end event linked"
        );

        // The event is committed; intake problems must not fail the delivery
        if let Some(transcript) = &event.enrichment.transcript_text {
            if let Err(e) = self.run_intake(refs.lead_id, transcript, &call.caller_number).await {
                tracing::error!(
                    lead_id = %refs.lead_id,
                    call_id = %refs.call_id,
                    error = %e,
                    "Intake extraction failed after event commit"
                );
            }
        }

        Ok(CallEndOutcome::Linked { refs, method })
    }

    /// Extract intake from a transcript, merge it into the lead and rescore
    ///
    /// No transaction is held across extraction (it may call the LLM). The
    /// score uses the lead's accumulated transcript signals, not just this call.
    pub async fn run_intake(
        &self,
        lead_id: Uuid,
        transcript: &str,
        caller_number: &str,
    ) -> Result<IntakeOutcome> {
        let (extraction, source) = self
            .extractor
            .extract_with_source(transcript, Some(caller_number))
            .await;

        let mut tx = self.db.begin().await?;

        let lead = leads::find_by_id(&mut tx, lead_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Lead {}", lead_id)))?;

        let intake = match lead.intake {
            Some(mut existing) => {
                existing.merge_from(extraction);
                existing
            }
            None => extraction,
        };
        let signals = lead
            .qualification_signals
            .accumulate(TranscriptSignals::detect(transcript));
        let qualification = qualification_scorer::score_signals(&intake, signals);

        leads::update_intake(&mut tx, lead_id, &intake, &qualification).await?;

        if let Some(name) = intake.caller.display_name() {
            if let Some(contact) = contacts::find_by_id(&mut tx, lead.contact_id).await? {
                if contact.has_placeholder_name() {
                    contacts::update_display_name(&mut tx, contact.id, &name).await?;
                }
            }
        }

        tx.commit().await?;

        tracing::info!(
            lead_id = %lead_id,
            source = source.as_str(),
            practice_area = %intake.practice_area,
            score = qualification.value,
            label = qualification.label.as_str(),
            "Lead qualified"
        );

        Ok(IntakeOutcome {
            lead_id,
            qualification,
        })
    }

    async fn linked_refs(
        &self,
        provider: Provider,
        external_id: &str,
        event_type: &str,
    ) -> Result<Option<CallRefs>> {
        let mut conn = self.db.acquire().await?;

        let Some(entry) = ledger::find_event(&mut conn, provider.as_str(), external_id, event_type).await?
        else {
            return Ok(None);
        };
        let Some(call_id) = entry.call_id else {
            return Ok(None);
        };

        Ok(calls::find_by_id(&mut conn, call_id).await?.map(|call| CallRefs {
            call_id: call.id,
            lead_id: call.lead_id,
            interaction_id: call.interaction_id,
        }))
    }
}

/// Shallow-merge provider data into the lead; a provider caller name
/// replaces the contact's display name
async fn merge_provider_data(
    conn: &mut SqliteConnection,
    lead_id: Uuid,
    extracted: &serde_json::Map<String, serde_json::Value>,
) -> Result<()> {
    let mut lead = leads::find_by_id(conn, lead_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Lead {}", lead_id)))?;

    if merge_extracted_data(&mut lead.extracted_data, extracted) {
        leads::update_extracted_data(conn, lead_id, &lead.extracted_data).await?;
    }

    if let Some(name) = provider_caller_name(extracted) {
        contacts::update_display_name(conn, lead.contact_id, &name).await?;
    }

    Ok(())
}
