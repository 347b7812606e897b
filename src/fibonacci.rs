//! # Bounded Fibonacci Computation
//!
//! The pure computation behind `POST /compute`, plus the serde types for the
//! wire contract. The computation runs in O(n) time with two accumulators
//! and rejects inputs above 90, the largest index whose value fits in `i64`
//! with headroom for the recurrence.

use serde::{Deserialize, Serialize};

use crate::core::error::{AppError, AppResult};

/// Largest supported input; anything above it is rejected rather than
/// allowed to overflow.
pub const MAX_SUPPORTED_N: i64 = 90;

/// Request body for `POST /compute`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeRequest {
    pub n: i64,
}

/// Success response body for `POST /compute`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeResponse {
    pub f: i64,
}

/// Returns the n-th Fibonacci number.
///
/// Inputs of 1 or less are returned unchanged. This deliberately includes
/// negative inputs: the boundary policy mirrors the service's long-standing
/// behavior and is not an input-validation bug to fix here.
pub fn fibonacci(n: i64) -> AppResult<i64> {
    if n <= 1 {
        return Ok(n);
    }

    if n > MAX_SUPPORTED_N {
        return Err(AppError::UnsupportedInput { n });
    }

    let (mut n2, mut n1): (i64, i64) = (0, 1);
    for _ in 2..n {
        let next = n1 + n2;
        n2 = n1;
        n1 = next;
    }

    Ok(n1 + n2)
}
