//! Portable query AST.
//!
//! A [`Query`] is an opaque, serializable predicate tree plus shaping
//! operators (sort, skip, limit, field selection). The sync core only
//! needs three things from it: detecting the absence of a filtering
//! predicate (delete-safety checks), deriving a stable signature string
//! (query-cache keying), and evaluating it locally against cached
//! entities. Translation to the backend wire format is owned by the
//! network collaborator.

use crate::entity::Entity;
use crate::error::StoreResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// A filtering predicate over entity fields.
///
/// Field paths may be dotted (`"address.city"`) to reach nested values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// Field equals value.
    Eq(String, Value),
    /// Field does not equal value.
    Ne(String, Value),
    /// Field is strictly greater than value.
    Gt(String, Value),
    /// Field is greater than or equal to value.
    Gte(String, Value),
    /// Field is strictly less than value.
    Lt(String, Value),
    /// Field is less than or equal to value.
    Lte(String, Value),
    /// Field value is one of the listed values.
    In(String, Vec<Value>),
    /// Field is present and non-null.
    Exists(String),
    /// String field contains the given substring.
    ///
    /// Evaluable locally but not expressible in the backend query
    /// language; see [`Query::unsupported_reason`].
    Contains(String, String),
    /// Matches every entity.
    ///
    /// A tautology carries no selectivity the backend can use; like
    /// [`Filter::Contains`] it is rejected on network paths.
    AlwaysTrue,
    /// All sub-predicates match.
    And(Vec<Filter>),
    /// At least one sub-predicate matches.
    Or(Vec<Filter>),
    /// The sub-predicate does not match.
    Not(Box<Filter>),
}

impl Filter {
    /// Evaluates the predicate against a JSON representation of an entity.
    pub fn matches(&self, entity: &Value) -> bool {
        match self {
            Filter::Eq(field, expected) => field_value(entity, field) == Some(expected),
            Filter::Ne(field, expected) => field_value(entity, field) != Some(expected),
            Filter::Gt(field, bound) => cmp_field(entity, field, bound) == Some(Ordering::Greater),
            Filter::Gte(field, bound) => matches!(
                cmp_field(entity, field, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::Lt(field, bound) => cmp_field(entity, field, bound) == Some(Ordering::Less),
            Filter::Lte(field, bound) => matches!(
                cmp_field(entity, field, bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Filter::In(field, values) => {
                field_value(entity, field).is_some_and(|v| values.contains(v))
            }
            Filter::Exists(field) => field_value(entity, field).is_some_and(|v| !v.is_null()),
            Filter::Contains(field, needle) => field_value(entity, field)
                .and_then(Value::as_str)
                .is_some_and(|s| s.contains(needle.as_str())),
            Filter::AlwaysTrue => true,
            Filter::And(filters) => filters.iter().all(|f| f.matches(entity)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(entity)),
            Filter::Not(filter) => !filter.matches(entity),
        }
    }

    /// Returns the first reason this predicate cannot be translated to
    /// the backend query language, walking nested combinators.
    fn untranslatable(&self) -> Option<&'static str> {
        match self {
            Filter::Contains(..) => Some("substring match has no backend query form"),
            Filter::AlwaysTrue => Some("tautological predicate has no backend query form"),
            Filter::And(filters) | Filter::Or(filters) => {
                filters.iter().find_map(Filter::untranslatable)
            }
            Filter::Not(filter) => filter.untranslatable(),
            _ => None,
        }
    }
}

/// Sort directive for a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortField {
    /// Field to sort by.
    pub field: String,
    /// Sort descending instead of ascending.
    pub descending: bool,
}

/// A query: optional filter predicate plus shaping operators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Filtering predicate. `None` means the query selects everything
    /// and carries no where clause.
    pub filter: Option<Filter>,
    /// Sort directives, applied in order.
    pub sort: Vec<SortField>,
    /// Number of leading results to skip.
    pub skip: Option<u64>,
    /// Maximum number of results to return.
    pub limit: Option<u64>,
    /// Fields to project in the result (wire-level concern; local typed
    /// evaluation returns whole entities).
    pub fields: Vec<String>,
}

impl Query {
    /// Creates an empty query (matches everything, no shaping).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter predicate.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Adds an equality predicate, AND-ed with any existing filter.
    #[must_use]
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Filter::Eq(field.into(), value.into()))
    }

    /// Adds a greater-than predicate, AND-ed with any existing filter.
    #[must_use]
    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Filter::Gt(field.into(), value.into()))
    }

    /// Adds a less-than predicate, AND-ed with any existing filter.
    #[must_use]
    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Filter::Lt(field.into(), value.into()))
    }

    /// Adds a substring predicate, AND-ed with any existing filter.
    #[must_use]
    pub fn contains(self, field: impl Into<String>, needle: impl Into<String>) -> Self {
        self.and(Filter::Contains(field.into(), needle.into()))
    }

    fn and(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            None => filter,
            Some(Filter::And(mut filters)) => {
                filters.push(filter);
                Filter::And(filters)
            }
            Some(existing) => Filter::And(vec![existing, filter]),
        });
        self
    }

    /// Limits the number of results.
    #[must_use]
    pub fn take(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips leading results.
    #[must_use]
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Sorts ascending by the given field.
    #[must_use]
    pub fn sort_asc(mut self, field: impl Into<String>) -> Self {
        self.sort.push(SortField {
            field: field.into(),
            descending: false,
        });
        self
    }

    /// Sorts descending by the given field.
    #[must_use]
    pub fn sort_desc(mut self, field: impl Into<String>) -> Self {
        self.sort.push(SortField {
            field: field.into(),
            descending: true,
        });
        self
    }

    /// Projects only the given fields at the wire level.
    #[must_use]
    pub fn select(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    /// Returns true if the query carries a filtering predicate.
    ///
    /// Shaping-only queries (take/skip/sort/select) have no where clause
    /// and are rejected for deletes.
    #[must_use]
    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Returns why the filter cannot be translated to the backend query
    /// language, or `None` if it is fully expressible.
    #[must_use]
    pub fn unsupported_reason(&self) -> Option<&'static str> {
        self.filter.as_ref().and_then(Filter::untranslatable)
    }

    /// Derives a stable fingerprint for query-cache keying.
    ///
    /// Two queries with the same filter and shaping always produce the
    /// same signature.
    #[must_use]
    pub fn signature(&self) -> String {
        // serde_json maps are ordered, so the encoding is canonical.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Evaluates the query against a set of typed entities: filter, then
    /// sort, then skip/limit. Field projection is a wire-level concern
    /// and is not applied to typed results.
    pub fn apply<T: Entity>(&self, items: Vec<T>) -> StoreResult<Vec<T>> {
        let mut keyed = Vec::with_capacity(items.len());
        for item in items {
            let value = serde_json::to_value(&item)?;
            if self.filter.as_ref().is_none_or(|f| f.matches(&value)) {
                keyed.push((value, item));
            }
        }

        for sort in self.sort.iter().rev() {
            keyed.sort_by(|(a, _), (b, _)| {
                let ord = cmp_values(
                    field_value(a, &sort.field).unwrap_or(&Value::Null),
                    field_value(b, &sort.field).unwrap_or(&Value::Null),
                );
                if sort.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        let skip = self.skip.unwrap_or(0) as usize;
        let limit = self.limit.map(|l| l as usize).unwrap_or(usize::MAX);

        Ok(keyed
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|(_, item)| item)
            .collect())
    }

    /// Evaluates only the filter against a single typed entity.
    pub fn matches_entity<T: Entity>(&self, entity: &T) -> StoreResult<bool> {
        match &self.filter {
            None => Ok(true),
            Some(filter) => {
                let value = serde_json::to_value(entity)?;
                Ok(filter.matches(&value))
            }
        }
    }
}

/// Resolves a dotted field path within a JSON value.
fn field_value<'a>(entity: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(entity, |value, key| value.get(key))
}

/// Total order over JSON values: null < bool < number < string, other
/// types compare equal.
fn cmp_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn cmp_field(entity: &Value, field: &str, bound: &Value) -> Option<Ordering> {
    field_value(entity, field).map(|v| cmp_values(v, bound))
}
