//! Audit port — append-only sink for [`AuditRecord`]s.

use std::future::Future;

use netalloc_domain::audit::AuditRecord;
use netalloc_domain::error::AllocationError;

/// Receives one record per audited mutation.
pub trait AuditSink {
    fn record(&self, record: AuditRecord)
    -> impl Future<Output = Result<(), AllocationError>> + Send;
}

impl<T: AuditSink + Send + Sync> AuditSink for std::sync::Arc<T> {
    fn record(
        &self,
        record: AuditRecord,
    ) -> impl Future<Output = Result<(), AllocationError>> + Send {
        (**self).record(record)
    }
}
