//! Transaction isolation levels and the commit/rollback decision

/// Transaction isolation level.
///
/// Defines the degree to which one transaction must be isolated from
/// resource or data modifications made by other transactions.
///
/// Plain [`Client::transaction`](crate::Client::transaction) leaves the
/// session's level alone; pass a level to
/// [`Client::transaction_with`](crate::Client::transaction_with) to set one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IsolationLevel {
    /// Allows dirty reads, non-repeatable reads, and phantom reads.
    ReadUncommitted,

    /// Prevents dirty reads but allows non-repeatable reads and phantom reads.
    ReadCommitted,

    /// Prevents dirty reads and non-repeatable reads but allows phantom reads.
    RepeatableRead,

    /// Provides full isolation. Transactions are completely isolated from one another.
    #[default]
    Serializable,
}

impl IsolationLevel {
    /// The level as written in `SET TRANSACTION ISOLATION LEVEL ...`.
    pub fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Where a transaction stands after its body has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxState {
    /// No explicit decision was made.
    #[default]
    Pending,
    /// The body called `commit`.
    Committed,
    /// The body called `rollback`.
    RolledBack,
}

/// What the transaction runner does once the body has returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Finish {
    Commit,
    Rollback,
    Nothing,
}

impl TxState {
    /// Automatic action for a body that succeeded (`body_ok`) or failed.
    ///
    /// An explicit decision is final: nothing is done on top of it.
    pub(crate) fn finish(self, body_ok: bool) -> Finish {
        match (self, body_ok) {
            (TxState::Pending, true) => Finish::Commit,
            (TxState::Pending, false) => Finish::Rollback,
            (TxState::Committed | TxState::RolledBack, _) => Finish::Nothing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_transaction_follows_the_body() {
        assert_eq!(TxState::Pending.finish(true), Finish::Commit);
        assert_eq!(TxState::Pending.finish(false), Finish::Rollback);
    }

    #[test]
    fn test_explicit_decision_is_final() {
        assert_eq!(TxState::Committed.finish(false), Finish::Nothing);
        assert_eq!(TxState::RolledBack.finish(false), Finish::Nothing);
        assert_eq!(TxState::RolledBack.finish(true), Finish::Nothing);
    }

    #[test]
    fn test_isolation_sql() {
        assert_eq!(IsolationLevel::default().as_sql(), "SERIALIZABLE");
        assert_eq!(IsolationLevel::ReadCommitted.as_sql(), "READ COMMITTED");
    }
}
