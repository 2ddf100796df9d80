//! Shared test utilities for erp-db unit tests.

use erp_config::{AuditConfig, SequenceConfig};
use erp_core::enums::AuditFailurePolicy;

use crate::ErpDb;
use crate::service::ErpService;

/// In-memory service with default (strict) policies.
pub async fn test_service() -> ErpService {
    test_service_with_policy(AuditFailurePolicy::Strict).await
}

/// In-memory service with the given audit failure policy.
pub async fn test_service_with_policy(policy: AuditFailurePolicy) -> ErpService {
    let db = ErpDb::open_local(":memory:").await.unwrap();
    ErpService::from_db(db, AuditConfig::with_policy(policy), &SequenceConfig::default()).unwrap()
}
