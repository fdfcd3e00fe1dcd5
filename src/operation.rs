use super::error::Result;

/// A long-running device operation that reports its progress.
///
/// Operations are iterators yielding the cumulative number of bytes
/// processed after each protocol step, so callers can drive them for
/// progress feedback. Callers not interested in progress use
/// [`execute`](Operation::execute) to drain the operation and keep only
/// the outcome.
pub trait Operation: Iterator<Item = Result<usize>> {
    /// Total number of bytes this operation will process.
    fn total(&self) -> usize;

    /// Runs the operation to completion or to its first error.
    fn execute(&mut self) -> Result<()> {
        if let Some(Err(error)) = self.last() {
            Err(error)
        } else {
            Ok(())
        }
    }
}
