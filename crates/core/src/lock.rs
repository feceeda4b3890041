use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableLockMode {
    ReadLocal,
    Read,
    LowPriorityWrite,
    Write,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockTarget {
    pub database: String,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    pub target: LockTarget,
    pub mode: TableLockMode,
}

/// Tables waiting for a `LOCK TABLE` on one connection.
///
/// Repeated requests for the same table collapse into one entry holding the
/// strongest mode requested.
#[derive(Debug, Default)]
pub struct LockRegistry {
    pending: HashMap<LockTarget, TableLockMode>,
    order: VecDeque<LockTarget>,
}

impl LockRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        database: impl Into<String>,
        table: impl Into<String>,
        mode: TableLockMode,
    ) {
        let target = LockTarget {
            database: database.into(),
            table: table.into(),
        };
        match self.pending.get_mut(&target) {
            Some(existing) => *existing = (*existing).max(mode),
            None => {
                self.pending.insert(target.clone(), mode);
                self.order.push_back(target);
            }
        }
    }

    /// The first still-pending request, left in place until [`Self::complete`].
    #[must_use]
    pub fn first_pending(&self) -> Option<LockRequest> {
        self.order.iter().find_map(|target| {
            self.pending.get(target).map(|&mode| LockRequest {
                target: target.clone(),
                mode,
            })
        })
    }

    /// Drops `request` once its `LOCK TABLE` went through. A stronger mode
    /// requested meanwhile stays pending.
    pub fn complete(&mut self, request: &LockRequest) {
        if self
            .pending
            .get(&request.target)
            .is_some_and(|&mode| mode <= request.mode)
        {
            self.pending.remove(&request.target);
            self.order.retain(|target| target != &request.target);
        }
    }

    /// Removes and returns the first still-pending request.
    pub fn take_first_pending(&mut self) -> Option<LockRequest> {
        let request = self.first_pending()?;
        self.complete(&request);
        Some(request)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.order.clear();
    }
}
