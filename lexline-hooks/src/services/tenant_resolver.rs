//! Tenant resolution
//!
//! Maps a dialed number to the organization that owns it. A miss is a
//! security-relevant rejection: the caller must not guess a tenant.

use lexline_common::phone::{mask_phone, normalize_phone};
use lexline_common::Result;
use sqlx::SqliteConnection;

use crate::db::tenants;

/// Owning organization and phone number record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantMatch {
    pub org_id: String,
    pub phone_number_id: String,
}

/// Resolve a dialed number to its tenant
///
/// Only inbound-enabled numbers match. Unparseable input resolves to `None`.
pub async fn resolve_tenant(
    conn: &mut SqliteConnection,
    dialed_number: &str,
) -> Result<Option<TenantMatch>> {
    let Some(e164) = normalize_phone(dialed_number) else {
        tracing::warn!(
            dialed = %mask_phone(dialed_number),
            "Tenant resolution skipped: dialed number is not a phone number"
        );
        return Ok(None);
    };

    match tenants::find_inbound_number(conn, &e164).await? {
        Some(record) => {
            tracing::debug!(
                org_id = %record.org_id,
                phone_number_id = %record.id,
                dialed = %mask_phone(&e164),
                "Resolved tenant"
            );
            Ok(Some(TenantMatch {
                org_id: record.org_id,
                phone_number_id: record.id,
            }))
        }
        None => {
            tracing::warn!(
                dialed = %mask_phone(&e164),
                "No inbound-enabled phone number matches dialed number"
            );
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tenants::{insert_organization, insert_phone_number, PhoneNumberRecord};
    use lexline_common::db::init_memory_database;

    async fn seed(conn: &mut SqliteConnection) {
        insert_organization(conn, "org-1", "Doe & Roe LLP").await.unwrap();
        insert_phone_number(
            conn,
            &PhoneNumberRecord {
                id: "pn-1".to_string(),
                org_id: "org-1".to_string(),
                e164: "+15559990000".to_string(),
                inbound_enabled: true,
            },
        )
        .await
        .unwrap();
        insert_phone_number(
            conn,
            &PhoneNumberRecord {
                id: "pn-2".to_string(),
                org_id: "org-1".to_string(),
                e164: "+15559990001".to_string(),
                inbound_enabled: false,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_resolves_any_formatting_of_the_number() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        seed(&mut conn).await;

        let found = resolve_tenant(&mut conn, "(555) 999-0000").await.unwrap();
        assert_eq!(
            found,
            Some(TenantMatch {
                org_id: "org-1".to_string(),
                phone_number_id: "pn-1".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_disabled_number_does_not_resolve() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        seed(&mut conn).await;

        assert_eq!(resolve_tenant(&mut conn, "+15559990001").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_and_garbage_numbers_miss() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        seed(&mut conn).await;

        assert_eq!(resolve_tenant(&mut conn, "+15550000000").await.unwrap(), None);
        assert_eq!(resolve_tenant(&mut conn, "restricted").await.unwrap(), None);
    }
}
