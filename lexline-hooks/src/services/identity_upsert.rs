//! Contact and lead find-or-create
//!
//! One open case thread per caller: a repeat call from the same number
//! attaches to the caller's most recent open lead. A new lead is created only
//! when none is open (new, contacted, in_progress).

use lexline_common::phone::mask_phone;
use lexline_common::{Error, Result};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::db::contacts::{self, ContactRecord};
use crate::db::leads::{self, LeadRecord};

/// Resolved caller identity within a tenant
#[derive(Debug, Clone)]
pub struct Identity {
    pub contact: ContactRecord,
    pub lead: LeadRecord,
    pub contact_created: bool,
    pub lead_created: bool,
}

/// Find or create the contact for `(org_id, caller_e164)` and its open lead
pub async fn upsert_identity(
    conn: &mut SqliteConnection,
    org_id: &str,
    caller_e164: &str,
) -> Result<Identity> {
    // Insert-if-absent then read back: a concurrent creator loses the
    // insert and reads the winner's row
    let contact_created =
        contacts::insert_if_absent(conn, Uuid::new_v4(), org_id, caller_e164).await?;
    let contact = contacts::find_by_phone(conn, org_id, caller_e164)
        .await?
        .ok_or_else(|| Error::Internal("Contact missing after insert".to_string()))?;

    let (lead, lead_created) = match leads::find_open_for_contact(conn, contact.id).await? {
        Some(lead) => (lead, false),
        None => {
            let lead = leads::insert_phone_lead(conn, Uuid::new_v4(), org_id, contact.id).await?;
            (lead, true)
        }
    };

    tracing::info!(
        org_id = %org_id,
        caller = %mask_phone(caller_e164),
        contact_id = %contact.id,
        lead_id = %lead.id,
        contact_created,
        lead_created,
        "Caller identity resolved"
    );

    Ok(Identity {
        contact,
        lead,
        contact_created,
        lead_created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tenants::insert_organization;
    use lexline_common::db::init_memory_database;

    #[tokio::test]
    async fn test_first_call_creates_contact_and_lead() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        insert_organization(&mut conn, "org-1", "Firm").await.unwrap();

        let identity = upsert_identity(&mut conn, "org-1", "+15551234567").await.unwrap();

        assert!(identity.contact_created);
        assert!(identity.lead_created);
        assert!(identity.contact.has_placeholder_name());
        assert_eq!(identity.lead.status, "new");
        assert_eq!(identity.lead.source, "phone");
        assert_eq!(identity.lead.priority, "medium");
    }

    #[tokio::test]
    async fn test_repeat_call_reuses_open_lead() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        insert_organization(&mut conn, "org-1", "Firm").await.unwrap();

        let first = upsert_identity(&mut conn, "org-1", "+15551234567").await.unwrap();
        leads::update_status(&mut conn, first.lead.id, "in_progress").await.unwrap();
        let second = upsert_identity(&mut conn, "org-1", "+15551234567").await.unwrap();

        assert!(!second.contact_created);
        assert!(!second.lead_created);
        assert_eq!(second.contact.id, first.contact.id);
        assert_eq!(second.lead.id, first.lead.id);
    }

    #[tokio::test]
    async fn test_closed_lead_starts_new_thread() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        insert_organization(&mut conn, "org-1", "Firm").await.unwrap();

        let first = upsert_identity(&mut conn, "org-1", "+15551234567").await.unwrap();
        leads::update_status(&mut conn, first.lead.id, "closed").await.unwrap();
        let second = upsert_identity(&mut conn, "org-1", "+15551234567").await.unwrap();

        assert!(second.lead_created);
        assert_ne!(second.lead.id, first.lead.id);
        assert_eq!(second.contact.id, first.contact.id);
        assert_eq!(leads::count_for_contact(&mut conn, first.contact.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_same_number_in_other_tenant_is_separate() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        insert_organization(&mut conn, "org-1", "Firm").await.unwrap();
        insert_organization(&mut conn, "org-2", "Other Firm").await.unwrap();

        let a = upsert_identity(&mut conn, "org-1", "+15551234567").await.unwrap();
        let b = upsert_identity(&mut conn, "org-2", "+15551234567").await.unwrap();

        assert!(b.contact_created);
        assert_ne!(a.contact.id, b.contact.id);
        assert_ne!(a.lead.id, b.lead.id);
    }
}
