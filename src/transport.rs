use crate::events::LogBatch;
use crate::Result;

/// The logging transport collaborator: delivers one batch, reporting success
/// or failure for the batch as a whole.
///
/// Implementations should bound their own I/O time; `EventLogger::shutdown`
/// relies on individual sends completing within the transport's timeout.
pub trait LogTransport {
    fn send_events(&self, batch: &LogBatch) -> Result<()>;
}

/// Discards batches. Used when no transport is configured.
pub(crate) struct NoopLogTransport;
impl LogTransport for NoopLogTransport {
    fn send_events(&self, _batch: &LogBatch) -> Result<()> {
        Ok(())
    }
}

impl<T: Fn(&LogBatch) -> Result<()>> LogTransport for T {
    fn send_events(&self, batch: &LogBatch) -> Result<()> {
        self(batch)
    }
}
