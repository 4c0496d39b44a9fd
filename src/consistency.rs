//! Internal Consistency Errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::money::AmountError;

/// The engine's own arithmetic broke an invariant.
///
/// Never caused by user input that passed normalization; it points at a pricing-table or logic
/// defect and is never clamped away.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConsistencyError {
    /// Decimal arithmetic overflowed.
    #[error("arithmetic overflow while computing {0}")]
    Overflow(&'static str),

    /// A length came out negative.
    #[error("{what} is negative: {value}")]
    NegativeLength {
        /// Quantity being computed
        what: &'static str,
        /// Offending value
        value: Decimal,
    },

    /// A cost came out negative.
    #[error("{what} is negative: {value}")]
    NegativeCost {
        /// Component being computed
        what: &'static str,
        /// Offending value
        value: Decimal,
    },

    /// A length plan broke one of its invariants.
    #[error("length plan invariant violated: {0}")]
    Invariant(String),

    /// The pricing table has no entry the calculation needs.
    #[error("pricing table has no {0}")]
    MissingRate(String),

    /// Wrapped monetary arithmetic error.
    #[error(transparent)]
    Amount(#[from] AmountError),
}
