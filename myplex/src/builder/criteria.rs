//! Filter criteria for the query builder

use serde_json::Value as Json;

use crate::error::{Error, Result};
use crate::value::Value;

/// A comparison applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    /// `=`, or `is null` for a null value
    Eq(Value),
    /// `!=`, or `is not null` for a null value
    Ne(Value),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    /// `between low and high`
    Between(Value, Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Like(Value),
}

impl Comparison {
    /// Build a comparison from its operator name (`$eq`, `$in`, ...).
    pub fn from_operator(op: &str, value: Value) -> Result<Self> {
        let comparison = match op {
            "$eq" => Comparison::Eq(value),
            "$ne" => Comparison::Ne(value),
            "$lt" => Comparison::Lt(value),
            "$lte" => Comparison::Lte(value),
            "$gt" => Comparison::Gt(value),
            "$gte" => Comparison::Gte(value),
            "$like" => Comparison::Like(value),
            "$in" => Comparison::In(into_list(value)),
            "$nin" => Comparison::NotIn(into_list(value)),
            "$between" => {
                let [low, high]: [Value; 2] =
                    into_list(value).try_into().map_err(|bounds: Vec<Value>| {
                        Error::Builder(format!(
                            "$between needs exactly two bounds, got {}",
                            bounds.len()
                        ))
                    })?;
                Comparison::Between(low, high)
            }
            other => return Err(Error::Builder(format!("unknown operator '{}'", other))),
        };
        Ok(comparison)
    }
}

fn into_list(value: Value) -> Vec<Value> {
    match value {
        Value::List(items) => items,
        scalar => vec![scalar],
    }
}

/// One node of a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        field: String,
        comparison: Comparison,
    },
    /// Every condition holds (`$and`)
    All(Vec<Condition>),
    /// At least one condition holds (`$or`)
    Any(Vec<Condition>),
}

impl Condition {
    pub fn compare(field: impl Into<String>, comparison: Comparison) -> Self {
        Condition::Compare {
            field: field.into(),
            comparison,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Eq(value.into()))
    }

    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::All(conditions.into_iter().collect())
    }

    pub fn any(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::Any(conditions.into_iter().collect())
    }
}

/// A filter: conditions that must all hold.
///
/// Built either fluently or from the JSON document form:
///
/// ```ignore
/// use myplex::builder::Criteria;
///
/// let fluent = Criteria::new().gt("id", 2).lt("id", 4);
/// let parsed = Criteria::from_json(&serde_json::json!([
///     {"id": {"$gt": 2}},
///     {"id": {"$lt": 4}},
/// ]))?;
/// assert_eq!(fluent, parsed);
/// ```
///
/// In the JSON form an object maps fields to values. A scalar compares
/// with `=`, an array with `in`, and an object with operator keys
/// (`$eq $ne $lt $lte $gt $gte $between $in $nin $like`). The keys `$and`
/// and `$or` open a nested group. An array of such objects is read as
/// their conjunction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    conditions: Vec<Condition>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Add a condition.
    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn compare(self, field: impl Into<String>, comparison: Comparison) -> Self {
        self.with(Condition::compare(field, comparison))
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, Comparison::Eq(value.into()))
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, Comparison::Ne(value.into()))
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, Comparison::Lt(value.into()))
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, Comparison::Lte(value.into()))
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, Comparison::Gt(value.into()))
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(field, Comparison::Gte(value.into()))
    }

    pub fn between(
        self,
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.compare(field, Comparison::Between(low.into(), high.into()))
    }

    pub fn is_in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.compare(field, Comparison::In(values))
    }

    pub fn not_in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.compare(field, Comparison::NotIn(values))
    }

    pub fn like(self, field: impl Into<String>, pattern: impl Into<Value>) -> Self {
        self.compare(field, Comparison::Like(pattern.into()))
    }

    /// Parse the JSON document form.
    pub fn from_json(json: &Json) -> Result<Self> {
        Ok(Self {
            conditions: parse_conditions(json)?,
        })
    }
}

impl From<Condition> for Criteria {
    fn from(condition: Condition) -> Self {
        Criteria::new().with(condition)
    }
}

fn parse_conditions(json: &Json) -> Result<Vec<Condition>> {
    match json {
        Json::Object(map) => {
            let mut conditions = Vec::with_capacity(map.len());
            for (key, value) in map {
                let group = match key.as_str() {
                    "$and" if value.is_object() || value.is_array() => {
                        Some(Condition::All(parse_conditions(value)?))
                    }
                    "$or" if value.is_object() || value.is_array() => {
                        Some(Condition::Any(parse_conditions(value)?))
                    }
                    _ => None,
                };
                match group {
                    Some(group) => conditions.push(group),
                    None => conditions.push(parse_comparison(key, value)?),
                }
            }
            Ok(conditions)
        }
        Json::Array(items) => {
            let mut conditions = Vec::new();
            for item in items {
                conditions.extend(parse_conditions(item)?);
            }
            Ok(conditions)
        }
        Json::Null => Ok(Vec::new()),
        other => Err(Error::Builder(format!(
            "criteria must be an object or an array, got {}",
            other
        ))),
    }
}

fn parse_comparison(field: &str, json: &Json) -> Result<Condition> {
    match json {
        Json::Object(ops) => {
            let mut comparisons = ops
                .iter()
                .map(|(op, value)| {
                    Comparison::from_operator(op, Value::from_json(value))
                        .map(|comparison| Condition::compare(field, comparison))
                })
                .collect::<Result<Vec<_>>>()?;
            match comparisons.len() {
                0 => Err(Error::Builder(format!("no operator given for '{}'", field))),
                1 => Ok(comparisons.remove(0)),
                _ => Ok(Condition::All(comparisons)),
            }
        }
        Json::Array(_) => match Value::from_json(json) {
            Value::List(values) => Ok(Condition::compare(field, Comparison::In(values))),
            other => Ok(Condition::eq(field, other)),
        },
        scalar => Ok(Condition::eq(field, Value::from_json(scalar))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_and_list_values() {
        let criteria = Criteria::from_json(&json!({"foo": "foo value", "ids": [1, 2]})).unwrap();
        assert_eq!(
            criteria,
            Criteria::new().eq("foo", "foo value").is_in("ids", [1, 2])
        );
    }

    #[test]
    fn test_operators() {
        let criteria = Criteria::from_json(&json!({
            "ct": {"$between": [1, 5]},
            "content": {"$like": "%ux%"},
            "id": {"$nin": [3]},
        }))
        .unwrap();
        assert_eq!(
            criteria,
            Criteria::new()
                .between("ct", 1, 5)
                .like("content", "%ux%")
                .not_in("id", [3])
        );
    }

    #[test]
    fn test_several_operators_on_one_field() {
        let criteria = Criteria::from_json(&json!({"id": {"$gt": 2, "$lt": 4}})).unwrap();
        assert_eq!(
            criteria.conditions(),
            &[Condition::all([
                Condition::compare("id", Comparison::Gt(2.into())),
                Condition::compare("id", Comparison::Lt(4.into())),
            ])]
        );
    }

    #[test]
    fn test_list_form_and_groups() {
        let listed = Criteria::from_json(&json!([{"id": {"$gt": 2}}, {"id": {"$lt": 4}}])).unwrap();
        assert_eq!(listed, Criteria::new().gt("id", 2).lt("id", 4));

        let grouped = Criteria::from_json(&json!({
            "$or": {"foo": "foo value", "bar": 123},
        }))
        .unwrap();
        assert_eq!(
            grouped,
            Criteria::from(Condition::any([
                Condition::eq("foo", "foo value"),
                Condition::eq("bar", 123),
            ]))
        );
    }

    #[test]
    fn test_invalid_criteria() {
        assert!(matches!(
            Criteria::from_json(&json!({"id": {"$near": 1}})),
            Err(Error::Builder(_))
        ));
        assert!(matches!(
            Criteria::from_json(&json!({"id": {"$between": [1]}})),
            Err(Error::Builder(_))
        ));
        assert!(Criteria::from_json(&json!("id = 1")).is_err());
        assert!(Criteria::from_json(&Json::Null).unwrap().is_empty());
    }
}
