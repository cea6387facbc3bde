use chrono::{DateTime, Utc};

use crate::record::{TransactionKind, WithdrawalStatus};

/// Filter describing which transaction records to load for an account.
///
/// Defaults to newest-first with no filters, which is what the dashboard
/// history view wants.
#[derive(Clone, Debug, Default)]
pub struct TransactionQuery {
    pub kind: Option<TransactionKind>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub oldest_first: bool,
}

impl TransactionQuery {
    pub fn with_kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_time_range(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn oldest_first(mut self) -> Self {
        self.oldest_first = true;
        self
    }
}

/// Filter for the admin withdrawal board.
#[derive(Clone, Debug, Default)]
pub struct WithdrawalQuery {
    pub status: Option<WithdrawalStatus>,
    pub limit: Option<usize>,
}

impl WithdrawalQuery {
    pub fn pending() -> Self {
        Self {
            status: Some(WithdrawalStatus::Pending),
            limit: None,
        }
    }

    pub fn with_status(mut self, status: WithdrawalStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
