//! # Selective-Disclosure Query Builder
//!
//! Turns a predicate over a credential attribute into the fixed-shape
//! inputs of the query circuits: operator code, claim path key, and a
//! 64-entry value array with its used length.
//!
//! ## Operator table
//!
//! | Operator     | Code | Symbol        | Values   |
//! |--------------|------|---------------|----------|
//! | NOOP         | 0    | `$noop`       | 0        |
//! | EQ           | 1    | `$eq`         | 1        |
//! | LT           | 2    | `$lt`         | 1        |
//! | GT           | 3    | `$gt`         | 1        |
//! | IN           | 4    | `$in`         | 1..=64   |
//! | NIN          | 5    | `$nin`        | 1..=64   |
//! | NE           | 6    | `$ne`         | 1        |
//! | LTE          | 7    | `$lte`        | 1        |
//! | GTE          | 8    | `$gte`        | 1        |
//! | BETWEEN      | 9    | `$between`    | 2        |
//! | NONBETWEEN   | 10   | `$nonbetween` | 2        |
//! | EXISTS       | 11   | `$exists`     | 0        |
//! | SD           | 16   | `$sd`         | 0        |
//! | NULLIFY      | 17   | `$nullify`    | 0        |
//!
//! Codes are part of the circuit interface and never change.
//!
//! Arity is checked before any value is encoded and before a prover is
//! involved; violations are [`ValidationError::QueryArity`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use zkid_claim::path_key;
use zkid_core::{Hash, ValidationError};

pub use zkid_claim::DecimalScale;

use crate::error::QueryError;

/// Size of the circuit value array.
pub const MAX_VALUE_ARITY: usize = 64;

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Query operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// No predicate; proves possession only.
    Noop,
    /// Equal.
    Eq,
    /// Less than.
    Lt,
    /// Greater than.
    Gt,
    /// Member of a set.
    In,
    /// Not a member of a set.
    Nin,
    /// Not equal.
    Ne,
    /// Less than or equal.
    Lte,
    /// Greater than or equal.
    Gte,
    /// Within an inclusive range.
    Between,
    /// Outside an inclusive range.
    NonBetween,
    /// Attribute is present.
    Exists,
    /// Selective disclosure of the attribute value.
    Sd,
    /// Nullifier derivation.
    Nullify,
}

/// Number of values an operator takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// No values.
    None,
    /// Exactly `n` values.
    Exactly(usize),
    /// Between `min` and `max` values inclusive.
    Range(usize, usize),
}

impl Arity {
    /// Whether `n` values are acceptable.
    pub fn accepts(&self, n: usize) -> bool {
        match *self {
            Arity::None => n == 0,
            Arity::Exactly(k) => n == k,
            Arity::Range(min, max) => (min..=max).contains(&n),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::None => f.write_str("no"),
            Arity::Exactly(k) => write!(f, "exactly {k}"),
            Arity::Range(min, max) => write!(f, "{min} to {max}"),
        }
    }
}

impl Operator {
    /// Every operator, in code order.
    pub const ALL: [Operator; 14] = [
        Operator::Noop,
        Operator::Eq,
        Operator::Lt,
        Operator::Gt,
        Operator::In,
        Operator::Nin,
        Operator::Ne,
        Operator::Lte,
        Operator::Gte,
        Operator::Between,
        Operator::NonBetween,
        Operator::Exists,
        Operator::Sd,
        Operator::Nullify,
    ];

    /// Circuit code.
    pub fn code(&self) -> u8 {
        match self {
            Operator::Noop => 0,
            Operator::Eq => 1,
            Operator::Lt => 2,
            Operator::Gt => 3,
            Operator::In => 4,
            Operator::Nin => 5,
            Operator::Ne => 6,
            Operator::Lte => 7,
            Operator::Gte => 8,
            Operator::Between => 9,
            Operator::NonBetween => 10,
            Operator::Exists => 11,
            Operator::Sd => 16,
            Operator::Nullify => 17,
        }
    }

    /// Symbolic name.
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Noop => "$noop",
            Operator::Eq => "$eq",
            Operator::Lt => "$lt",
            Operator::Gt => "$gt",
            Operator::In => "$in",
            Operator::Nin => "$nin",
            Operator::Ne => "$ne",
            Operator::Lte => "$lte",
            Operator::Gte => "$gte",
            Operator::Between => "$between",
            Operator::NonBetween => "$nonbetween",
            Operator::Exists => "$exists",
            Operator::Sd => "$sd",
            Operator::Nullify => "$nullify",
        }
    }

    /// Operator with circuit code `code`.
    pub fn from_code(code: u8) -> Result<Self, QueryError> {
        Operator::ALL
            .into_iter()
            .find(|op| op.code() == code)
            .ok_or_else(|| QueryError::UnknownOperator(code.to_string()))
    }

    /// Values the operator takes.
    pub fn arity(&self) -> Arity {
        match self {
            Operator::Noop | Operator::Exists | Operator::Sd | Operator::Nullify => Arity::None,
            Operator::Eq | Operator::Lt | Operator::Gt | Operator::Ne | Operator::Lte | Operator::Gte => {
                Arity::Exactly(1)
            }
            Operator::In | Operator::Nin => Arity::Range(1, MAX_VALUE_ARITY),
            Operator::Between | Operator::NonBetween => Arity::Exactly(2),
        }
    }

    /// Check that `n` values fit this operator.
    pub fn check_arity(&self, n: usize) -> Result<(), ValidationError> {
        let arity = self.arity();
        if arity.accepts(n) {
            Ok(())
        } else {
            Err(ValidationError::QueryArity {
                operator: self.symbol().to_string(),
                expected: arity.to_string(),
                actual: n,
            })
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.symbol() == s)
            .ok_or_else(|| QueryError::UnknownOperator(s.to_string()))
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// A predicate over one credential attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Dotted attribute path; empty for `$noop`.
    #[serde(default)]
    pub field: String,
    /// Operator.
    pub operator: Operator,
    /// Operands.
    #[serde(default)]
    pub values: Vec<Value>,
}

impl Query {
    /// A query with explicit operands.
    pub fn new(field: impl Into<String>, operator: Operator, values: Vec<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            values,
        }
    }

    /// Parse the `query` object of an authorization request scope:
    ///
    /// ```json
    /// {"credentialSubject": {"birthday": {"$lt": 20000101}}}
    /// ```
    ///
    /// A missing `credentialSubject` is `$noop`; an empty operator object
    /// (`{"birthday": {}}`) is `$sd`. Array operands become the value list;
    /// `true` is accepted as the operand of value-less operators
    /// (`{"$exists": true}`).
    pub fn from_request(query: &Value) -> Result<Self, QueryError> {
        let subject = match query.get("credentialSubject") {
            None | Some(Value::Null) => return Ok(Self::new("", Operator::Noop, Vec::new())),
            Some(Value::Object(subject)) => subject,
            Some(other) => return Err(QueryError::Malformed(format!("credentialSubject must be an object, got {other}"))),
        };
        let (field, predicate) = single_entry(subject, "credentialSubject")?;
        let Value::Object(predicate) = predicate else {
            return Err(QueryError::Malformed(format!("predicate on {field} must be an object")));
        };
        if predicate.is_empty() {
            return Ok(Self::new(field, Operator::Sd, Vec::new()));
        }
        let (symbol, operand) = single_entry(predicate, field)?;
        let operator: Operator = symbol.parse()?;
        let values = match operand {
            Value::Array(items) => items.clone(),
            Value::Bool(true) if operator.arity() == Arity::None => Vec::new(),
            other => vec![other.clone()],
        };
        Ok(Self::new(field, operator, values))
    }
}

fn single_entry<'a>(map: &'a Map<String, Value>, context: &str) -> Result<(&'a str, &'a Value), QueryError> {
    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some((k, v)), None) => Ok((k.as_str(), v)),
        _ => Err(QueryError::Malformed(format!(
            "{context} must contain exactly one entry, found {}",
            map.len()
        ))),
    }
}

/// Fixed-shape circuit inputs for a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitQuery {
    /// Operator.
    pub operator: Operator,
    /// [`path_key`] of the attribute; zero for `$noop`.
    pub claim_path_key: Hash,
    /// Encoded operands padded with zeros to [`MAX_VALUE_ARITY`].
    pub values: Vec<Hash>,
    /// Number of operands before padding.
    pub value_arity: usize,
}

impl CircuitQuery {
    /// Circuit signals: `operator`, `claimPathKey`, `value`, `valueArraySize`.
    pub fn signals(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("operator".to_string(), json!(self.operator.code().to_string()));
        map.insert("claimPathKey".to_string(), json!(self.claim_path_key.to_hex()));
        map.insert(
            "value".to_string(),
            Value::Array(self.values.iter().map(|v| json!(v.to_hex())).collect()),
        );
        map.insert("valueArraySize".to_string(), json!(self.value_arity.to_string()));
        map
    }
}

/// Builds [`CircuitQuery`]s with a fixed decimal scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryBuilder {
    scale: DecimalScale,
}

impl QueryBuilder {
    /// A builder scaling decimals by `scale`.
    pub fn new(scale: DecimalScale) -> Self {
        Self { scale }
    }

    /// Decimal scale in use.
    pub fn scale(&self) -> DecimalScale {
        self.scale
    }

    /// Validate `query` and encode it.
    pub fn build(&self, query: &Query) -> Result<CircuitQuery, QueryError> {
        query.operator.check_arity(query.values.len())?;

        let claim_path_key = if query.operator == Operator::Noop {
            Hash::ZERO
        } else if query.field.is_empty() {
            return Err(QueryError::Malformed(format!("{} needs an attribute path", query.operator)));
        } else {
            path_key(&query.field)?
        };

        let mut values = query
            .values
            .iter()
            .map(|v| zkid_claim::encode_value(&query.field, v, self.scale))
            .collect::<Result<Vec<_>, _>>()?;

        if matches!(query.operator, Operator::Between | Operator::NonBetween) {
            if let (Some(low), Some(high)) = (values[0].to_u64(), values[1].to_u64()) {
                if low > high {
                    return Err(ValidationError::InvalidField {
                        field: query.field.clone(),
                        reason: format!("{} range is empty: {low} > {high}", query.operator),
                    }
                    .into());
                }
            }
        }

        let value_arity = values.len();
        values.resize(MAX_VALUE_ARITY, Hash::ZERO);
        Ok(CircuitQuery {
            operator: query.operator,
            claim_path_key,
            values,
            value_arity,
        })
    }

    /// Parse a request query object and build it.
    pub fn build_request(&self, query: &Value) -> Result<CircuitQuery, QueryError> {
        self.build(&Query::from_request(query)?)
    }
}
