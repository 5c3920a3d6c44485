//! Criteria-based SQL builder
//!
//! Compiles a table name plus structured filter, sort and limit
//! options into SQL text with `:0`, `:1`, ... placeholders and the
//! matching [`Params`]. Identifiers are backtick-quoted; values are never
//! inlined by the builder, only by [`substitute`](crate::substitute) at
//! execution time.
//!
//! ```ignore
//! use myplex::builder::{Criteria, OrderBy, QueryBuilder, Select};
//!
//! let statement = QueryBuilder::new().select(
//!     "foobar",
//!     &Select::new()
//!         .fields(["id", "title"])
//!         .filter(Criteria::new().gt("id", 2))
//!         .order_by(OrderBy::desc("id"))
//!         .limit(2u64),
//! );
//! assert_eq!(
//!     statement.sql(),
//!     "select `id`, `title` from `foobar` where `id` > :0 order by `id` desc limit 2"
//! );
//! ```

mod clauses;
mod criteria;

pub use clauses::{Direction, Field, Limit, OrderBy, Select};
pub use criteria::{Comparison, Condition, Criteria};

use crate::error::{Error, Result};
use crate::query::Params;
use crate::value::{quote_identifier, Value};

/// SQL text plus the values for its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Params,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Params) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn into_parts(self) -> (String, Params) {
        (self.sql, self.params)
    }
}

/// Column → value pairs for insert and update, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, Value)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing an earlier value for the same column.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.0.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.0.push((column, value)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(c, v)| (c.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Fields::new(), |fields, (k, v)| fields.set(k, v))
    }
}

/// Builds one statement.
///
/// The builder owns its placeholder counter and parameters, so every
/// statement numbers its placeholders from `:0`. Build methods consume the
/// builder.
#[derive(Debug, Default)]
pub struct QueryBuilder {
    next_placeholder: usize,
    params: Params,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value and return its placeholder.
    pub fn bind(&mut self, value: impl Into<Value>) -> String {
        let name = self.next_placeholder.to_string();
        self.next_placeholder += 1;
        self.params.insert(&name, value);
        format!(":{}", name)
    }

    /// Compile criteria into a `where` expression (without the keyword).
    ///
    /// Top-level conditions are joined with `and`. Returns `None` when
    /// there is nothing to filter on.
    pub fn where_clause(&mut self, criteria: &Criteria) -> Option<String> {
        self.join(criteria.conditions(), "and")
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// `select fields from table [where ...] [order by ...] [limit ...]`
    pub fn select(mut self, table: &str, select: &Select) -> Statement {
        let mut sql = format!(
            "select {} from {}",
            select.fields_sql(),
            quote_identifier(table)
        );
        if let Some(filter) = self.where_clause(&select.criteria) {
            sql.push_str(" where ");
            sql.push_str(&filter);
        }
        sql.push_str(&select.tail_sql());
        self.finish(sql)
    }

    /// `insert into table set col = :0, ...`
    pub fn insert(mut self, table: &str, fields: &Fields) -> Result<Statement> {
        if fields.is_empty() {
            return Err(Error::Builder(format!("nothing to insert into '{}'", table)));
        }
        let set = self.set(fields);
        Ok(self.finish(format!("insert into {} set {}", quote_identifier(table), set)))
    }

    /// `insert into table (cols) values :0`, the rows bound as one nested
    /// list so each renders as a parenthesized tuple.
    pub fn insert_many<C: AsRef<str>>(
        mut self,
        table: &str,
        columns: &[C],
        rows: Vec<Vec<Value>>,
    ) -> Result<Statement> {
        if columns.is_empty() || rows.is_empty() {
            return Err(Error::Builder(format!("nothing to insert into '{}'", table)));
        }
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(Error::Builder(format!(
                "row {} has {} values, expected {}",
                i,
                row.len(),
                columns.len()
            )));
        }

        let names: Vec<String> = columns
            .iter()
            .map(|c| quote_identifier(c.as_ref()))
            .collect();
        let rows = Value::List(rows.into_iter().map(Value::List).collect());
        let placeholder = self.bind(rows);
        Ok(self.finish(format!(
            "insert into {} ({}) values {}",
            quote_identifier(table),
            names.join(", "),
            placeholder
        )))
    }

    /// `update table set col = :0, ... [where ...]`
    pub fn update(mut self, table: &str, fields: &Fields, criteria: &Criteria) -> Result<Statement> {
        if fields.is_empty() {
            return Err(Error::Builder(format!("nothing to update in '{}'", table)));
        }
        let mut sql = format!("update {} set {}", quote_identifier(table), self.set(fields));
        if let Some(filter) = self.where_clause(criteria) {
            sql.push_str(" where ");
            sql.push_str(&filter);
        }
        Ok(self.finish(sql))
    }

    /// `delete from table [where ...]`
    pub fn delete(mut self, table: &str, criteria: &Criteria) -> Statement {
        let mut sql = format!("delete from {}", quote_identifier(table));
        if let Some(filter) = self.where_clause(criteria) {
            sql.push_str(" where ");
            sql.push_str(&filter);
        }
        self.finish(sql)
    }

    fn finish(self, sql: String) -> Statement {
        Statement::new(sql, self.params)
    }

    fn set(&mut self, fields: &Fields) -> String {
        fields
            .iter()
            .map(|(column, value)| {
                format!("{} = {}", quote_identifier(column), self.bind(value.clone()))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn join(&mut self, conditions: &[Condition], op: &str) -> Option<String> {
        let parts: Vec<String> = conditions
            .iter()
            .filter_map(|condition| self.condition(condition))
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(&format!(" {} ", op)))
        }
    }

    fn condition(&mut self, condition: &Condition) -> Option<String> {
        match condition {
            Condition::Compare { field, comparison } => Some(self.comparison(field, comparison)),
            Condition::All(group) => self.join(group, "and").map(|sql| format!("({})", sql)),
            Condition::Any(group) => self.join(group, "or").map(|sql| format!("({})", sql)),
        }
    }

    fn comparison(&mut self, field: &str, comparison: &Comparison) -> String {
        let field = quote_identifier(field);
        match comparison {
            Comparison::Eq(Value::Null) => format!("{} is null", field),
            Comparison::Ne(Value::Null) => format!("{} is not null", field),
            Comparison::Eq(v) => format!("{} = {}", field, self.bind(v.clone())),
            Comparison::Ne(v) => format!("{} != {}", field, self.bind(v.clone())),
            Comparison::Lt(v) => format!("{} < {}", field, self.bind(v.clone())),
            Comparison::Lte(v) => format!("{} <= {}", field, self.bind(v.clone())),
            Comparison::Gt(v) => format!("{} > {}", field, self.bind(v.clone())),
            Comparison::Gte(v) => format!("{} >= {}", field, self.bind(v.clone())),
            Comparison::Like(v) => format!("{} like {}", field, self.bind(v.clone())),
            Comparison::Between(low, high) => {
                let low = self.bind(low.clone());
                let high = self.bind(high.clone());
                format!("{} between {} and {}", field, low, high)
            }
            // `in ()` is a syntax error; an empty set matches nothing
            Comparison::In(values) if values.is_empty() => "1 = 0".to_string(),
            Comparison::NotIn(values) if values.is_empty() => "1 = 1".to_string(),
            Comparison::In(values) => {
                format!("{} in ({})", field, self.bind(Value::List(values.clone())))
            }
            Comparison::NotIn(values) => {
                format!("{} not in ({})", field, self.bind(Value::List(values.clone())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::substitute;
    use serde_json::json;

    fn where_sql(criteria: Criteria) -> (Option<String>, Params) {
        let mut builder = QueryBuilder::new();
        let sql = builder.where_clause(&criteria);
        (sql, builder.params().clone())
    }

    #[test]
    fn test_where() {
        let (sql, params) = where_sql(Criteria::new().eq("foo", "foo value"));
        assert_eq!(sql.as_deref(), Some("`foo` = :0"));
        assert_eq!(params.get("0"), Some(&Value::from("foo value")));

        let (sql, _) = where_sql(Criteria::new().eq("foo", "foo value").eq("bar", 123));
        assert_eq!(sql.as_deref(), Some("`foo` = :0 and `bar` = :1"));

        let or = Condition::any([Condition::eq("foo", "foo value"), Condition::eq("bar", 123)]);
        let (sql, _) = where_sql(Criteria::from(or.clone()));
        assert_eq!(sql.as_deref(), Some("(`foo` = :0 or `bar` = :1)"));

        let (sql, _) = where_sql(Criteria::from(or).eq("baz", 1438168960));
        assert_eq!(sql.as_deref(), Some("(`foo` = :0 or `bar` = :1) and `baz` = :2"));

        assert_eq!(where_sql(Criteria::new()).0, None);
        assert_eq!(where_sql(Criteria::from(Condition::any([]))).0, None);
    }

    #[test]
    fn test_comparisons() {
        let criteria = Criteria::from_json(&json!({
            "a": {"$ne": 1},
            "b": {"$lte": 2},
            "c": {"$between": [3, 4]},
            "d": [5, 6],
            "e": {"$nin": [7]},
            "f": {"$like": "%ux%"},
            "g": null,
        }))
        .unwrap();
        let (sql, params) = where_sql(criteria);
        let sql = sql.unwrap();
        assert_eq!(
            sql,
            "`a` != :0 and `b` <= :1 and `c` between :2 and :3 and `d` in (:4) \
             and `e` not in (:5) and `f` like :6 and `g` is null"
        );
        assert_eq!(
            substitute(&sql, &params).unwrap(),
            "`a` != 1 and `b` <= 2 and `c` between 3 and 4 and `d` in (5, 6) \
             and `e` not in (7) and `f` like '%ux%' and `g` is null"
        );
    }

    #[test]
    fn test_empty_in_list() {
        let (sql, params) = where_sql(Criteria::new().is_in("id", Vec::<i64>::new()));
        assert_eq!(sql.as_deref(), Some("1 = 0"));
        assert!(params.is_empty());
    }

    #[test]
    fn test_select() {
        let statement = QueryBuilder::new().select(
            "FooTable",
            &Select::new()
                .fields(["*"])
                .filter(Criteria::new().eq("foo", "foo value")),
        );
        assert_eq!(statement.sql(), "select * from `FooTable` where `foo` = :0");
        assert_eq!(statement.params(), &Params::new().with("0", "foo value"));

        let statement = QueryBuilder::new().select(
            "foobar",
            &Select::new()
                .fields(["id", "title"])
                .order_by(OrderBy::desc("ct"))
                .order_by(OrderBy::asc("id"))
                .limit(2u64),
        );
        assert_eq!(
            statement.sql(),
            "select `id`, `title` from `foobar` order by `ct` desc, `id` asc limit 2"
        );
        assert!(statement.params().is_empty());
    }

    #[test]
    fn test_insert() {
        let statement = QueryBuilder::new()
            .insert("FooTable", &Fields::new().set("foo", "foo value"))
            .unwrap();
        assert_eq!(statement.sql(), "insert into `FooTable` set `foo` = :0");
        assert_eq!(statement.params(), &Params::new().with("0", "foo value"));

        assert!(QueryBuilder::new().insert("FooTable", &Fields::new()).is_err());
    }

    #[test]
    fn test_insert_many() {
        let statement = QueryBuilder::new()
            .insert_many(
                "FooTable",
                &["foo"],
                vec![vec!["value 1".into()], vec!["value 2".into()]],
            )
            .unwrap();
        assert_eq!(statement.sql(), "insert into `FooTable` (`foo`) values :0");
        assert_eq!(
            substitute(statement.sql(), statement.params()).unwrap(),
            "insert into `FooTable` (`foo`) values ('value 1'), ('value 2')"
        );

        let err = QueryBuilder::new()
            .insert_many("FooTable", &["a", "b"], vec![vec![1.into()]])
            .unwrap_err();
        assert!(matches!(err, Error::Builder(_)));
    }

    #[test]
    fn test_update() {
        let statement = QueryBuilder::new()
            .update(
                "FooTable",
                &Fields::new().set("foo", "foo value"),
                &Criteria::new().eq("id", 123),
            )
            .unwrap();
        assert_eq!(statement.sql(), "update `FooTable` set `foo` = :0 where `id` = :1");
        assert_eq!(
            statement.params(),
            &Params::new().with("0", "foo value").with("1", 123)
        );
    }

    #[test]
    fn test_delete() {
        let statement = QueryBuilder::new().delete("FooTable", &Criteria::new().eq("id", 3));
        assert_eq!(statement.sql(), "delete from `FooTable` where `id` = :0");

        let statement = QueryBuilder::new().delete("FooTable", &Criteria::new());
        assert_eq!(statement.sql(), "delete from `FooTable`");
    }

    #[test]
    fn test_fields_keep_order_and_last_value() {
        let fields: Fields = [("b", 1), ("a", 2), ("b", 3)].into_iter().collect();
        assert_eq!(
            fields.iter().collect::<Vec<_>>(),
            vec![("b", &Value::from(3)), ("a", &Value::from(2))]
        );
    }

    #[test]
    fn test_placeholders_do_not_collide_past_ten() {
        let criteria = (0..12).fold(Criteria::new(), |c, i| c.eq(format!("f{}", i), i));
        let (sql, params) = where_sql(criteria);
        let sql = substitute(&sql.unwrap(), &params).unwrap();
        assert!(sql.ends_with("`f10` = 10 and `f11` = 11"));
        assert!(sql.starts_with("`f0` = 0 and `f1` = 1 and"));
    }
}
