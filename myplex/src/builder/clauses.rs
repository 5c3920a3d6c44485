//! Select lists, ordering and limits

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::value::quote_identifier;

use super::criteria::Criteria;

/// A selected column, optionally renamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub alias: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }

    pub(crate) fn to_sql(&self) -> String {
        let name = if self.name == "*" {
            self.name.clone()
        } else {
            quote_identifier(&self.name)
        };
        match &self.alias {
            Some(alias) => format!("{} as {}", name, quote_identifier(alias)),
            None => name,
        }
    }
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Field::new(name)
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Field::new(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Positive means ascending, anything else descending.
    pub fn from_sign(sign: i64) -> Self {
        if sign > 0 {
            Direction::Asc
        } else {
            Direction::Desc
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => f.write_str("asc"),
            Direction::Desc => f.write_str("desc"),
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("asc") {
            return Ok(Direction::Asc);
        }
        if s.eq_ignore_ascii_case("desc") {
            return Ok(Direction::Desc);
        }
        s.parse::<i64>()
            .map(Direction::from_sign)
            .map_err(|_| Error::Builder(format!("invalid sort direction '{}'", s)))
    }
}

/// One `order by` term. Without a direction the server default applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Option<Direction>,
}

impl OrderBy {
    pub fn field(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: None,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Some(Direction::Asc),
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Some(Direction::Desc),
        }
    }

    fn to_sql(&self) -> String {
        match self.direction {
            Some(direction) => format!("{} {}", quote_identifier(&self.field), direction),
            None => quote_identifier(&self.field),
        }
    }
}

/// Parses `field`, `field:asc`, `field:desc`, `field:1` or `field:-1`.
impl FromStr for OrderBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (field, direction) = match s.rsplit_once(':') {
            Some((field, direction)) => (field, Some(direction.parse()?)),
            None => (s, None),
        };
        if field.is_empty() {
            return Err(Error::Builder(format!("invalid order '{}'", s)));
        }
        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }
}

/// `limit count [offset offset]`; a zero offset is left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub count: u64,
    pub offset: u64,
}

impl Limit {
    pub fn new(count: u64) -> Self {
        Self { count, offset: 0 }
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    fn to_sql(self) -> String {
        if self.offset > 0 {
            format!(" limit {} offset {}", self.count, self.offset)
        } else {
            format!(" limit {}", self.count)
        }
    }
}

impl From<u64> for Limit {
    fn from(count: u64) -> Self {
        Limit::new(count)
    }
}

/// Everything about a select except the table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    pub fields: Vec<Field>,
    pub criteria: Criteria,
    pub order: Vec<OrderBy>,
    pub limit: Option<Limit>,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns to select. Empty means `*`.
    pub fn fields<F: Into<Field>>(mut self, fields: impl IntoIterator<Item = F>) -> Self {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn field_as(mut self, name: impl Into<String>, alias: impl Into<String>) -> Self {
        self.fields.push(Field::aliased(name, alias));
        self
    }

    pub fn filter(mut self, criteria: impl Into<Criteria>) -> Self {
        self.criteria = criteria.into();
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    pub fn limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    pub(crate) fn fields_sql(&self) -> String {
        if self.fields.is_empty() {
            return "*".to_string();
        }
        self.fields
            .iter()
            .map(Field::to_sql)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn tail_sql(&self) -> String {
        let mut sql = String::new();
        if !self.order.is_empty() {
            let order: Vec<String> = self.order.iter().map(OrderBy::to_sql).collect();
            sql.push_str(" order by ");
            sql.push_str(&order.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&limit.to_sql());
        }
        sql
    }
}
