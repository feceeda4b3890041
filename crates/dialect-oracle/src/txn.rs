use std::{fmt, sync::Arc};

use tablelink_core::{CatalogAccessor, CatalogRecord, CatalogTable, Error, Result, Shared, Xid};
use tracing::{debug, warn};

use crate::session::Connection;

/// A one-phase transaction that rolls back unless committed.
pub struct Transaction<'c> {
    connection: &'c mut Connection,
    finished: bool,
}

impl<'c> Transaction<'c> {
    pub(crate) fn new(connection: &'c mut Connection) -> Self {
        Self {
            connection,
            finished: false,
        }
    }

    pub fn connection(&mut self) -> &mut Connection {
        self.connection
    }

    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        self.connection.commit()
    }

    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.connection.rollback()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished
            && let Err(error) = self.connection.rollback()
        {
            warn!(link = self.connection.link(), %error, "rollback of abandoned transaction failed");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchPhase {
    Active,
    Ended,
    Prepared,
    Committed,
    RolledBack,
}

/// One distributed transaction spanning several shard connections.
pub struct TransactionBranch {
    xid: Xid,
    participants: Vec<Shared<Connection>>,
    phase: BranchPhase,
    catalog: Arc<dyn CatalogAccessor>,
}

impl TransactionBranch {
    /// Starts the branch on every participant; a failure rolls back the ones already started.
    pub fn start(
        xid: Xid,
        participants: Vec<Shared<Connection>>,
        catalog: Arc<dyn CatalogAccessor>,
    ) -> Result<Self> {
        if !xid.is_valid() {
            return Err(Error::invalid_state(format!("malformed xid {xid}")));
        }
        for (started, participant) in participants.iter().enumerate() {
            if let Err(error) = participant.lock().xa_start(&xid) {
                for (link, earlier) in participants[..started].iter().enumerate() {
                    if let Err(rollback) = earlier.lock().xa_rollback(&xid) {
                        warn!(
                            %xid,
                            participant = link,
                            error = %rollback,
                            "rollback of a started participant failed"
                        );
                    }
                }
                return Err(error);
            }
        }
        debug!(%xid, participants = participants.len(), "xa branch started");
        Ok(Self {
            xid,
            participants,
            phase: BranchPhase::Active,
            catalog,
        })
    }

    #[must_use]
    pub fn xid(&self) -> &Xid {
        &self.xid
    }

    #[must_use]
    pub fn phase(&self) -> BranchPhase {
        self.phase
    }

    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn end(&mut self) -> Result<()> {
        self.expect_phase(&[BranchPhase::Active], "end")?;
        for participant in &self.participants {
            participant.lock().xa_end(&self.xid)?;
        }
        self.phase = BranchPhase::Ended;
        Ok(())
    }

    pub fn prepare(&mut self) -> Result<()> {
        self.expect_phase(&[BranchPhase::Ended], "prepare")?;
        for participant in &self.participants {
            participant.lock().xa_prepare(&self.xid)?;
        }
        self.phase = BranchPhase::Prepared;
        Ok(())
    }

    /// Commits every participant; `one_phase` skips the prepare requirement.
    ///
    /// Every participant is attempted. The first failure is returned after
    /// all failures were written to the XA failure log.
    pub fn commit(&mut self, one_phase: bool) -> Result<()> {
        let allowed: &[BranchPhase] = if one_phase {
            &[BranchPhase::Active, BranchPhase::Ended]
        } else {
            &[BranchPhase::Prepared]
        };
        self.expect_phase(allowed, "commit")?;
        let result = self.finish("commit", |connection, xid| {
            connection.xa_commit(xid, one_phase)
        });
        self.phase = BranchPhase::Committed;
        result
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.expect_phase(
            &[BranchPhase::Active, BranchPhase::Ended, BranchPhase::Prepared],
            "rollback",
        )?;
        let result = self.finish("rollback", Connection::xa_rollback);
        self.phase = BranchPhase::RolledBack;
        result
    }

    fn finish(
        &self,
        action: &'static str,
        step: impl Fn(&mut Connection, &Xid) -> Result<()>,
    ) -> Result<()> {
        let mut first_error = None;
        for participant in &self.participants {
            let mut connection = participant.lock();
            if let Err(error) = step(&mut *connection, &self.xid) {
                let link = connection.link();
                warn!(xid = %self.xid, link, action, %error, "xa branch step failed");
                self.log_failure(link, action, &error)?;
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn log_failure(&self, link: usize, action: &str, error: &Error) -> Result<()> {
        let mut record = CatalogRecord::new();
        record.insert("format_id".to_string(), self.xid.format_id.to_string());
        record.insert("xid".to_string(), self.xid.to_string());
        record.insert("link".to_string(), link.to_string());
        record.insert("action".to_string(), action.to_string());
        record.insert("status".to_string(), error.host_code().to_string());
        record.insert("message".to_string(), error.to_string());
        let key = format!("{}:{link}", self.xid.key());
        self.catalog.put(CatalogTable::XaFailures, &key, record)
    }

    fn expect_phase(&self, allowed: &[BranchPhase], step: &str) -> Result<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(Error::invalid_state(format!(
                "cannot {step} xa branch in phase {:?}",
                self.phase
            )))
        }
    }
}

impl fmt::Debug for TransactionBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionBranch")
            .field("xid", &self.xid)
            .field("participants", &self.participants.len())
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
