use crate::dispatch_result::DispatchResult;
use crate::storage::{ResultStorage, ResultStorageError};
use std::error::Error;
use std::fmt;

#[derive(Debug, PartialEq)]
pub enum MemoryStorageError {
    NotFound(usize),
}

impl Error for MemoryStorageError {}

impl ResultStorageError for MemoryStorageError {}

impl fmt::Display for MemoryStorageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MemoryStorageError::NotFound(n) => {
                write!(f, "Memory Storage Error: result #{} not found", n)
            }
        }
    }
}

/// Keeps the result log in a vector indexed by sequence number
#[derive(Default)]
pub struct MemoryStorage(Vec<DispatchResult>);

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage(Vec::new())
    }

    fn slot(&self, sequence_number: usize) -> Option<usize> {
        let index = sequence_number.checked_sub(1)?;
        if index < self.0.len() && self.0[index].sequence_number == sequence_number {
            Some(index)
        } else {
            None
        }
    }
}

impl ResultStorage for MemoryStorage {
    type Error = MemoryStorageError;

    fn store_all(&mut self, mut results: Vec<DispatchResult>) -> Result<(), MemoryStorageError> {
        results.sort_by_key(|r| r.sequence_number);
        self.0 = results;
        Ok(())
    }

    fn update(&mut self, result: DispatchResult) -> Result<(), MemoryStorageError> {
        let index = match self.slot(result.sequence_number) {
            None => return Err(MemoryStorageError::NotFound(result.sequence_number)),
            Some(index) => index,
        };

        self.0[index] = result;
        Ok(())
    }

    fn retrieve(&self, sequence_number: usize) -> Result<DispatchResult, MemoryStorageError> {
        match self.slot(sequence_number) {
            None => Err(MemoryStorageError::NotFound(sequence_number)),
            Some(index) => Ok(self.0[index].clone()),
        }
    }

    fn retrieve_all(&self) -> Result<Vec<DispatchResult>, MemoryStorageError> {
        Ok(self.0.clone())
    }

    fn clear(&mut self) -> Result<(), MemoryStorageError> {
        self.0.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch_result::DispatchStatus;

    #[test]
    fn test_update_and_clear() {
        let mut storage = MemoryStorage::new();
        storage
            .store_all(vec![
                DispatchResult::pending(2, "b@x.com"),
                DispatchResult::pending(1, "a@x.com"),
            ])
            .unwrap();

        let all = storage.retrieve_all().unwrap();
        assert_eq!(all[0].recipient, "a@x.com");
        assert_eq!(all[1].recipient, "b@x.com");

        let mut second = storage.retrieve(2).unwrap();
        assert!(second.mark_sending());
        storage.update(second).unwrap();
        assert_eq!(storage.retrieve(2).unwrap().status, DispatchStatus::Sending);

        assert_eq!(storage.retrieve(0), Err(MemoryStorageError::NotFound(0)));
        assert_eq!(storage.retrieve(3), Err(MemoryStorageError::NotFound(3)));

        storage.clear().unwrap();
        assert_eq!(
            storage.update(DispatchResult::pending(1, "a@x.com")),
            Err(MemoryStorageError::NotFound(1))
        );
    }
}
