use std::fmt;

/// Lifecycle state of a cached object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// No payload materialized (a source location may exist).
    Empty,
    /// Payload resident, unlocked, and eligible for eviction.
    Evictable,
    /// Payload not resident but recoverable from the soft cache or storage.
    Evicted,
    /// One or more shared readers hold the payload.
    Read,
    /// A single exclusive writer holds the payload.
    Modify,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "EMPTY",
            Self::Evictable => "EVICTABLE",
            Self::Evicted => "EVICTED",
            Self::Read => "READ",
            Self::Modify => "MODIFY",
        };
        f.write_str(s)
    }
}

/// Fail-fast lock tracking [Status] and the number of active readers.
///
/// Every transition either succeeds immediately or returns the current status, which the caller
/// turns into an error. Nothing ever waits.
#[derive(Debug)]
pub(crate) struct Lock {
    status: Status,
    readers: usize,
}

impl Default for Lock {
    fn default() -> Self {
        Self {
            status: Status::Empty,
            readers: 0,
        }
    }
}

impl Lock {
    pub fn status(&self) -> Status {
        self.status
    }

    #[cfg(test)]
    pub fn readers(&self) -> usize {
        self.readers
    }

    pub fn can_read(&self) -> bool {
        self.status != Status::Modify
    }

    pub fn can_modify(&self) -> bool {
        matches!(
            self.status,
            Status::Empty | Status::Evictable | Status::Evicted
        )
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.status, Status::Read | Status::Modify)
    }

    pub fn acquire_read(&mut self) -> Result<(), Status> {
        if !self.can_read() {
            return Err(self.status);
        }
        self.status = Status::Read;
        self.readers += 1;
        Ok(())
    }

    pub fn acquire_modify(&mut self) -> Result<(), Status> {
        if !self.can_modify() {
            return Err(self.status);
        }
        self.status = Status::Modify;
        Ok(())
    }

    /// Release one hold. Returns true if the lock is now fully released, in which case the
    /// status becomes [Status::Evictable] until the caller decides otherwise.
    pub fn release(&mut self) -> Result<bool, Status> {
        match self.status {
            Status::Read => {
                self.readers -= 1;
                if self.readers > 0 {
                    return Ok(false);
                }
            }
            Status::Modify => {}
            other => return Err(other),
        }
        self.status = Status::Evictable;
        Ok(true)
    }

    pub fn set_evicted(&mut self) {
        debug_assert!(!self.is_locked());
        self.status = Status::Evicted;
    }

    pub fn set_empty(&mut self) {
        debug_assert!(!self.is_locked());
        self.status = Status::Empty;
    }
}
