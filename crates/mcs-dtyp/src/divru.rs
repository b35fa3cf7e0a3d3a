//! Division rounding up.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DivruError {
    #[error("divru({numerator}, {denominator}): division by zero")]
    DivisionByZero { numerator: u64, denominator: u64 },
    #[error("divru({numerator}, {denominator}): overflow in intermediate value")]
    OverflowInIntermediateValue { numerator: u64, denominator: u64 },
}

/// Returns the smallest `q` with `q * denominator >= numerator`.
pub fn divru(numerator: u64, denominator: u64) -> Result<u64, DivruError> {
    if denominator == 0 {
        return Err(DivruError::DivisionByZero {
            numerator,
            denominator,
        });
    }
    let intermediate =
        numerator
            .checked_add(denominator - 1)
            .ok_or(DivruError::OverflowInIntermediateValue {
                numerator,
                denominator,
            })?;
    Ok(intermediate / denominator)
}
