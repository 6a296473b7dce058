//! Append-only lead audit trail with a per-lead integrity chain.

use academy_core::audit::{canonical_entry, clamp_history_limit, compute_integrity_hash};
use academy_core::error::CoreError;
use academy_core::types::{DbId, Timestamp};
use academy_db::models::audit::{AuditEntry, NewAuditEntry};
use academy_db::Repository;
use serde::Serialize;

use crate::context::Context;

/// Result of re-walking a lead's hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    pub lead_id: DbId,
    pub entries: usize,
    /// First entry whose stored hash does not match, if any.
    pub first_broken_entry: Option<DbId>,
}

impl ChainVerification {
    pub fn is_intact(&self) -> bool {
        self.first_broken_entry.is_none()
    }
}

#[derive(Clone)]
pub struct AuditLog {
    ctx: Context,
}

impl AuditLog {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Append an entry inside an open transaction and touch the lead.
    ///
    /// Fails with `NotFound` only if the lead does not exist.
    pub async fn record(
        repo: &mut dyn Repository,
        entry: NewAuditEntry,
        now: Timestamp,
    ) -> Result<AuditEntry, CoreError> {
        if !repo.touch_lead(entry.lead_id, now).await? {
            return Err(CoreError::NotFound {
                entity: "Lead",
                id: entry.lead_id,
            });
        }

        let prev = repo.last_audit_hash(entry.lead_id).await?;
        let canonical = canonical_entry(
            entry.lead_id,
            entry.actor_id,
            entry.action_type,
            &entry.description,
            entry.old_value.as_deref(),
            entry.new_value.as_deref(),
            now,
        );
        let hash = compute_integrity_hash(prev.as_deref(), &canonical);
        Ok(repo.insert_audit(&entry, &hash, now).await?)
    }

    /// Record several entries in order.
    pub async fn record_all(
        repo: &mut dyn Repository,
        entries: Vec<NewAuditEntry>,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        for entry in entries {
            Self::record(repo, entry, now).await?;
        }
        Ok(())
    }

    /// Entries for a lead, newest first. `limit` defaults to 50, max 500.
    pub async fn list_for_lead(
        &self,
        lead_id: DbId,
        limit: Option<i64>,
    ) -> Result<Vec<AuditEntry>, CoreError> {
        let mut repo = self.ctx.begin().await?;
        if repo.find_lead(lead_id).await?.is_none() {
            return Err(CoreError::NotFound {
                entity: "Lead",
                id: lead_id,
            });
        }
        Ok(repo
            .list_audit_for_lead(lead_id, clamp_history_limit(limit))
            .await?)
    }

    /// Recompute the hash chain of a lead from its first entry.
    pub async fn verify_chain(&self, lead_id: DbId) -> Result<ChainVerification, CoreError> {
        let mut repo = self.ctx.begin().await?;
        if repo.find_lead(lead_id).await?.is_none() {
            return Err(CoreError::NotFound {
                entity: "Lead",
                id: lead_id,
            });
        }
        let chain = repo.list_audit_chain(lead_id).await?;
        Ok(verify_entries(lead_id, &chain))
    }
}

fn verify_entries(lead_id: DbId, chain: &[AuditEntry]) -> ChainVerification {
    let mut prev: Option<&str> = None;
    let mut first_broken_entry = None;

    for entry in chain {
        let canonical = canonical_entry(
            entry.lead_id,
            entry.actor_id,
            &entry.action_type,
            &entry.description,
            entry.old_value.as_deref(),
            entry.new_value.as_deref(),
            entry.created_at,
        );
        if compute_integrity_hash(prev, &canonical) != entry.integrity_hash {
            first_broken_entry = Some(entry.id);
            break;
        }
        prev = Some(&entry.integrity_hash);
    }

    ChainVerification {
        lead_id,
        entries: chain.len(),
        first_broken_entry,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn entry(id: DbId, prev: Option<&str>, description: &str) -> AuditEntry {
        let created_at = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, id as u32).unwrap();
        let canonical = canonical_entry(1, Some(9), "comment", description, None, None, created_at);
        AuditEntry {
            id,
            lead_id: 1,
            actor_id: Some(9),
            action_type: "comment".to_string(),
            description: description.to_string(),
            old_value: None,
            new_value: None,
            integrity_hash: compute_integrity_hash(prev, &canonical),
            created_at,
        }
    }

    #[test]
    fn intact_chain_verifies() {
        let first = entry(1, None, "called parent");
        let second = entry(2, Some(&first.integrity_hash), "booked trial");
        let result = verify_entries(1, &[first, second]);
        assert!(result.is_intact());
        assert_eq!(result.entries, 2);
    }

    #[test]
    fn tampered_description_breaks_chain() {
        let first = entry(1, None, "called parent");
        let mut second = entry(2, Some(&first.integrity_hash), "booked trial");
        second.description = "edited".to_string();
        let result = verify_entries(1, &[first, second]);
        assert_eq!(result.first_broken_entry, Some(2));
    }
}
