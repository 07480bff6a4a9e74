/// Outcome of a conditional update that filtered by id **and** expected
/// current status. Two near-simultaneous requests for the same transition
/// resolve to one `Applied` and one `NoMatch`; the statement itself is the
/// only synchronization point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Applied,
    NoMatch,
}

impl CasOutcome {
    pub fn from_rows_affected(rows: u64) -> CasOutcome {
        if rows > 0 {
            CasOutcome::Applied
        } else {
            CasOutcome::NoMatch
        }
    }

    pub fn applied(self) -> bool {
        matches!(self, CasOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rows_is_a_conflict() {
        assert_eq!(CasOutcome::from_rows_affected(0), CasOutcome::NoMatch);
        assert!(!CasOutcome::from_rows_affected(0).applied());
    }

    #[test]
    fn any_matched_row_applies() {
        assert!(CasOutcome::from_rows_affected(1).applied());
        assert!(CasOutcome::from_rows_affected(3).applied());
    }
}
