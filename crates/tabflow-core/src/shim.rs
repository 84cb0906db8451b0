use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attr::AttributeValue;
use crate::filter::{CompareOp, FilterDescriptor, FilterError};

/// A predicate as produced by a query engine: an attribute, an
/// engine-flavored operator spelling, and operand values already converted
/// to store-native form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnginePredicate {
    pub attribute: String,
    pub operator: String,
    pub operands: Vec<AttributeValue>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShimError {
    #[error("engine adapter {adapter} does not recognize operator {operator:?}")]
    UnknownOperator {
        adapter: &'static str,
        operator: String,
    },
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Translation seam between a query engine and this system.
///
/// One implementation is selected from configuration at process startup and
/// used for the whole job; there is no runtime probing.
pub trait EngineAdapter: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Translate an engine predicate into the native condition shape
    /// attached to scan requests.
    fn translate_predicate(&self, predicate: &EnginePredicate)
        -> Result<FilterDescriptor, ShimError>;
}

/// Which operator dialect the engine side speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineKind {
    /// Symbolic spellings: `=`, `<>`, `<`, `<=`, `>`, `>=`, ...
    #[default]
    Generic,
    /// Word spellings used by older engine frontends: `EQ`, `NE`, `LT`, ...
    Legacy,
}

/// Select the adapter for a configured engine kind. Call once at startup
/// and share the result.
pub fn select_adapter(kind: EngineKind) -> Arc<dyn EngineAdapter> {
    match kind {
        EngineKind::Generic => Arc::new(DialectAdapter {
            name: "generic",
            operators: GENERIC_OPERATORS,
        }),
        EngineKind::Legacy => Arc::new(DialectAdapter {
            name: "legacy",
            operators: LEGACY_OPERATORS,
        }),
    }
}

const GENERIC_OPERATORS: &[(&str, CompareOp)] = &[
    ("=", CompareOp::Eq),
    ("<>", CompareOp::Ne),
    ("<", CompareOp::Lt),
    ("<=", CompareOp::Le),
    (">", CompareOp::Gt),
    (">=", CompareOp::Ge),
    ("BETWEEN", CompareOp::Between),
    ("BEGINS_WITH", CompareOp::BeginsWith),
];

const LEGACY_OPERATORS: &[(&str, CompareOp)] = &[
    ("EQ", CompareOp::Eq),
    ("NE", CompareOp::Ne),
    ("LT", CompareOp::Lt),
    ("LE", CompareOp::Le),
    ("GT", CompareOp::Gt),
    ("GE", CompareOp::Ge),
    ("BETWEEN", CompareOp::Between),
    ("BEGINS_WITH", CompareOp::BeginsWith),
];

struct DialectAdapter {
    name: &'static str,
    operators: &'static [(&'static str, CompareOp)],
}

impl EngineAdapter for DialectAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn translate_predicate(
        &self,
        predicate: &EnginePredicate,
    ) -> Result<FilterDescriptor, ShimError> {
        let op = self
            .operators
            .iter()
            .find(|(spelling, _)| *spelling == predicate.operator)
            .map(|(_, op)| *op)
            .ok_or_else(|| ShimError::UnknownOperator {
                adapter: self.name,
                operator: predicate.operator.clone(),
            })?;
        let filter = FilterDescriptor {
            attribute: predicate.attribute.clone(),
            op,
            operands: predicate.operands.clone(),
        };
        filter.validate()?;
        Ok(filter)
    }
}
