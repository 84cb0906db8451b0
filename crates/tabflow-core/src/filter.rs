use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attr::AttributeValue;

/// Comparison operators a planner can push down to a segment scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Between,
    BeginsWith,
}

impl CompareOp {
    /// Operand count the store expects for this operator.
    pub fn arity(&self) -> usize {
        match self {
            CompareOp::Between => 2,
            _ => 1,
        }
    }
}

/// A pushed-down range/equality condition on one attribute.
///
/// Carried opaquely by splits and scan requests; this system never
/// evaluates it, the store does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    pub attribute: String,
    pub op: CompareOp,
    pub operands: Vec<AttributeValue>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("filter attribute must be non-empty")]
    EmptyAttribute,
    #[error("operator {op:?} expects {expected} operand(s), got {actual}")]
    BadArity {
        op: CompareOp,
        expected: usize,
        actual: usize,
    },
}

impl FilterDescriptor {
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.attribute.trim().is_empty() {
            return Err(FilterError::EmptyAttribute);
        }
        let expected = self.op.arity();
        if self.operands.len() != expected {
            return Err(FilterError::BadArity {
                op: self.op,
                expected,
                actual: self.operands.len(),
            });
        }
        Ok(())
    }
}
