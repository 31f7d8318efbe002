/// Audit status definitions and the legal transition graph
use std::fmt;

/// Represents the current phase of an audit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuditStatus {
    // ===== Waiting =====
    /// Audit created, first batch not yet running
    Pending,

    // ===== In Progress =====
    /// A batch is fetching pages
    Crawling,

    /// A batch is running checks against the pages it fetched
    Checking,

    /// A batch finished but pages remain; waiting for `continue`
    BatchComplete,

    // ===== Terminal =====
    /// Queue exhausted (or page budget spent), checks done, scores final
    Completed,

    /// Unrecoverable error or staleness in crawling/checking
    Failed,

    /// User-requested cancellation, finalized with partial results
    Stopped,
}

impl AuditStatus {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }

    /// Returns true if a batch is executing in this status
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Crawling | Self::Checking)
    }

    /// Returns true if `stop` is accepted in this status
    pub fn is_cancelable(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Crawling | Self::Checking | Self::BatchComplete
        )
    }

    /// Returns true if a new batch may be claimed from this status
    pub fn can_start_batch(&self) -> bool {
        matches!(self, Self::Pending | Self::BatchComplete)
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    ///
    /// # Transition Graph
    ///
    /// | From | To |
    /// |------|----|
    /// | pending | crawling, stopped, failed |
    /// | crawling | checking, completed, stopped, failed |
    /// | checking | batch_complete, completed, stopped, failed |
    /// | batch_complete | crawling, completed, stopped, failed |
    /// | completed / failed / stopped | (none) |
    pub fn can_transition_to(&self, next: AuditStatus) -> bool {
        use AuditStatus::*;
        match (self, next) {
            (Pending, Crawling) => true,
            (Crawling, Checking) => true,
            (Checking, BatchComplete) => true,
            (BatchComplete, Crawling) => true,
            (Crawling | Checking | BatchComplete, Completed) => true,
            (from, Stopped) => from.is_cancelable(),
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Crawling => "crawling",
            Self::Checking => "checking",
            Self::BatchComplete => "batch_complete",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "crawling" => Some(Self::Crawling),
            "checking" => Some(Self::Checking),
            "batch_complete" => Some(Self::BatchComplete),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }

    /// Returns all statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Crawling,
            Self::Checking,
            Self::BatchComplete,
            Self::Completed,
            Self::Failed,
            Self::Stopped,
        ]
    }

    /// Returns the in-progress statuses that `stop` can cancel
    pub fn cancelable_statuses() -> Vec<Self> {
        Self::all_statuses()
            .into_iter()
            .filter(|s| s.is_cancelable())
            .collect()
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
