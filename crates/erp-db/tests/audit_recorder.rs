//! Audit recorder integration tests.
//!
//! - Actor attribution through the task-scoped context
//! - Snapshot rendering of dates and references
//! - Unserializable fields do not block a record
//! - Concurrent units of work never see each other's actor

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use erp_config::ErpConfig;
use erp_core::actor::{self, ActorContext, ActorId};
use erp_core::enums::AuditAction;
use erp_core::reference::{EntityKind, EntityRef};
use erp_core::snapshot::{Auditable, Snapshot};
use erp_db::repos::audit::{AuditFilter, AuditRecord, Change};
use erp_db::service::ErpService;
use pretty_assertions::assert_eq;

async fn test_service() -> ErpService {
    let mut config = ErpConfig::default();
    config.database.path = ":memory:".to_string();
    ErpService::new_local(&config).await.unwrap()
}

struct FeePayment {
    id: i64,
    student: EntityRef,
    paid_on: NaiveDate,
    amount_paise: i64,
}

impl Auditable for FeePayment {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(EntityKind::FEE_PAYMENT, self.id)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::builder()
            .field("id", &self.id)
            .reference("student", Some(&self.student))
            .field("paid_on", &self.paid_on)
            .field("amount_paise", &self.amount_paise)
            .build()
    }
}

fn payment(id: i64) -> FeePayment {
    FeePayment {
        id,
        student: EntityRef::new(EntityKind::STUDENT, 42),
        paid_on: NaiveDate::from_ymd_opt(2025, 7, 14).unwrap(),
        amount_paise: 1_250_000,
    }
}

struct Opaque;

impl Serialize for Opaque {
    fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        Err(serde::ser::Error::custom("opaque value"))
    }
}

// ---------------------------------------------------------------------------
// Attribution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn actor_then_cleared_context() {
    let svc = test_service().await;
    let target = EntityRef::new(EntityKind::STUDENT, 1);

    actor::scope(ActorContext::for_actor("user:alice"), async {
        svc.record(AuditRecord::new(AuditAction::Update, target.clone()))
            .await
            .unwrap();
        actor::clear();
        svc.record(AuditRecord::new(AuditAction::Update, target.clone()))
            .await
            .unwrap();
    })
    .await;

    let history = svc.audit_history(&target).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].actor, Some(ActorId::new("user:alice")));
    assert_eq!(history[0].actor, None);
}

#[tokio::test]
async fn scope_ends_with_the_unit_of_work() {
    let svc = test_service().await;
    let target = EntityRef::new(EntityKind::STUDENT, 2);

    let failed: Result<(), &str> = actor::scope(ActorContext::for_actor("user:bob"), async {
        svc.record(AuditRecord::new(AuditAction::Delete, target.clone()))
            .await
            .unwrap();
        Err("business rule violated")
    })
    .await;
    assert!(failed.is_err());

    svc.record(AuditRecord::new(AuditAction::View, target.clone()))
        .await
        .unwrap();

    let history = svc.audit_history(&target).await.unwrap();
    assert_eq!(history[0].action, AuditAction::View);
    assert_eq!(history[0].actor, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_scopes_keep_their_own_actor() {
    let svc = Arc::new(test_service().await);
    let handles: Vec<_> = (1..=12_i64)
        .map(|n| {
            let svc = Arc::clone(&svc);
            tokio::spawn(actor::scope(
                ActorContext::for_actor(format!("user:{n}")),
                async move {
                    for _ in 0..5 {
                        tokio::task::yield_now().await;
                        svc.record(AuditRecord::new(
                            AuditAction::View,
                            EntityRef::new(EntityKind::DOCUMENT, n),
                        ))
                        .await
                        .unwrap();
                    }
                },
            ))
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let entries = svc
        .query_audit(&AuditFilter {
            limit: Some(1000),
            ..AuditFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(entries.len(), 60);
    for entry in entries {
        let expected = ActorId::new(format!("user:{}", entry.target.id));
        assert_eq!(entry.actor, Some(expected));
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[tokio::test]
async fn after_state_renders_dates_and_references_flat() {
    let svc = test_service().await;
    let fee = payment(9);

    let entry = svc
        .record_change(&fee, Change::Created)
        .await
        .unwrap()
        .unwrap();

    let after = entry.after_state.unwrap();
    assert_eq!(after.get("paid_on"), Some(&serde_json::json!("2025-07-14")));
    assert_eq!(after.get("student"), Some(&serde_json::json!(42)));
    assert_eq!(after.get("amount_paise"), Some(&serde_json::json!(1_250_000)));
    assert_eq!(entry.before_state, None);
}

#[tokio::test]
async fn unserializable_field_is_skipped_not_fatal() {
    let svc = test_service().await;
    let fee = payment(10);

    let before = Snapshot::builder()
        .field("amount_paise", &1_000_000_i64)
        .field("receipt_blob", &Opaque)
        .field("paid_on", &fee.paid_on)
        .build();

    let entry = svc
        .record_change(&fee, Change::Updated { before: Some(before) })
        .await
        .unwrap()
        .unwrap();

    let stored = entry.before_state.unwrap();
    assert!(!stored.contains("receipt_blob"));
    assert_eq!(stored.get("amount_paise"), Some(&serde_json::json!(1_000_000)));
    assert!(stored.contains("paid_on"));

    let reread = svc.audit_history(&fee.entity_ref()).await.unwrap();
    assert_eq!(reread[0].before_state.as_ref(), Some(&stored));
}

// ---------------------------------------------------------------------------
// Operator queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn filter_by_actor_and_entity() {
    let svc = test_service().await;
    actor::scope(ActorContext::for_actor("user:clerk"), async {
        svc.record_change(&payment(1), Change::Created).await.unwrap();
        svc.record_change(&payment(2), Change::Viewed).await.unwrap();
    })
    .await;
    actor::scope(ActorContext::for_actor("user:dean"), async {
        svc.record_change(&payment(1), Change::Viewed).await.unwrap();
    })
    .await;

    let clerk = svc
        .query_audit(&AuditFilter {
            actor: Some("user:clerk".to_string()),
            ..AuditFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(clerk.len(), 2);

    let first_payment = svc
        .query_audit(&AuditFilter {
            entity_kind: Some(EntityKind::FEE_PAYMENT),
            entity_id: Some(1),
            action: Some(AuditAction::View),
            ..AuditFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(first_payment.len(), 1);
    assert_eq!(first_payment[0].actor, Some(ActorId::new("user:dean")));
}
