pub mod memory_storage;
pub use self::memory_storage::MemoryStorage;

use crate::dispatch_result::DispatchResult;

pub trait ResultStorageError: ::std::error::Error {}

/// A trait for implementing storage of the campaign result log.
///
/// The dispatcher is the only writer. Readers may see an entry in any of its
/// valid states, so every write must replace a whole `DispatchResult`.
pub trait ResultStorage: Send + Sync {
    type Error: ResultStorageError;

    /// Replace the log with a fresh set of results (a new campaign).
    fn store_all(&mut self, results: Vec<DispatchResult>) -> Result<(), Self::Error>;

    /// Overwrite the entry with the same sequence number.
    fn update(&mut self, result: DispatchResult) -> Result<(), Self::Error>;

    /// Retrieve the entry with the given sequence number.
    fn retrieve(&self, sequence_number: usize) -> Result<DispatchResult, Self::Error>;

    /// Retrieve every entry, in sequence order.
    fn retrieve_all(&self) -> Result<Vec<DispatchResult>, Self::Error>;

    /// Discard the whole log.
    fn clear(&mut self) -> Result<(), Self::Error>;
}
