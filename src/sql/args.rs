//! Structured query arguments.
//!
//! Caller-facing argument shapes are normalized into these canonical
//! structures at the operation boundary, before any SQL is assembled. Names
//! carried as plain strings are emitted verbatim; names originating from a
//! bound record type are marked and quoted per dialect rules.

use crate::value::Value;

/// The table a query operates on: a plain name, or a binding derived from a
/// record type.
#[derive(Debug, Clone)]
pub enum Target {
    /// A table name emitted verbatim.
    Name(String),
    /// A record-type binding; the table name is auto-quoted when required.
    Bound(TableBinding),
}

/// Table metadata captured from a record type.
#[derive(Debug, Clone, Copy)]
pub struct TableBinding {
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub primary_key: Option<&'static str>,
}

impl Target {
    /// The bare table name, unquoted.
    pub fn table(&self) -> &str {
        match self {
            Target::Name(name) => name,
            Target::Bound(binding) => binding.table,
        }
    }

    /// Whether the name came from a record binding.
    pub fn is_bound(&self) -> bool {
        matches!(self, Target::Bound(_))
    }

    /// The binding, when the target is record-derived.
    pub fn binding(&self) -> Option<&TableBinding> {
        match self {
            Target::Bound(binding) => Some(binding),
            Target::Name(_) => None,
        }
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::Name(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Target::Name(name)
    }
}

impl From<TableBinding> for Target {
    fn from(binding: TableBinding) -> Self {
        Target::Bound(binding)
    }
}

/// A column reference: verbatim text, or a record-derived name subject to
/// auto-quoting and casing resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Col {
    pub name: String,
    pub bound: bool,
}

impl Col {
    /// A verbatim column reference.
    pub fn raw(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bound: false,
        }
    }

    /// A record-derived column reference.
    pub fn bound(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bound: true,
        }
    }
}

impl From<&str> for Col {
    fn from(name: &str) -> Self {
        Col::raw(name)
    }
}

impl From<String> for Col {
    fn from(name: String) -> Self {
        Col::raw(name)
    }
}

/// A column list. Empty means `*` in SELECT position and "no clause" in
/// GROUP BY position.
#[derive(Debug, Clone, Default)]
pub struct Columns(pub(crate) Vec<Col>);

impl Columns {
    /// The all-columns marker.
    pub fn star() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a column.
    pub fn add(mut self, col: impl Into<Col>) -> Self {
        self.0.push(col.into());
        self
    }
}

impl From<&str> for Columns {
    fn from(text: &str) -> Self {
        if text == "*" || text.is_empty() {
            Columns::star()
        } else {
            Columns(vec![Col::raw(text)])
        }
    }
}

impl From<Vec<&str>> for Columns {
    fn from(names: Vec<&str>) -> Self {
        Columns(names.into_iter().map(Col::raw).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Columns {
    fn from(names: [&str; N]) -> Self {
        Columns(names.into_iter().map(Col::raw).collect())
    }
}

impl From<Vec<Col>> for Columns {
    fn from(cols: Vec<Col>) -> Self {
        Columns(cols)
    }
}

impl From<()> for Columns {
    fn from(_: ()) -> Self {
        Columns::star()
    }
}

/// Ordered (column, value) pairs for INSERT and UPDATE.
#[derive(Debug, Clone, Default)]
pub struct Values(pub(crate) Vec<(Col, Value)>);

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column-value pair, preserving insertion order.
    pub fn set(mut self, col: impl Into<Col>, value: impl Into<Value>) -> Self {
        self.0.push((col.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Col, &Value)> {
        self.0.iter().map(|(c, v)| (c, v))
    }
}

impl<C: Into<Col>, V: Into<Value>> From<Vec<(C, V)>> for Values {
    fn from(pairs: Vec<(C, V)>) -> Self {
        Values(
            pairs
                .into_iter()
                .map(|(c, v)| (c.into(), v.into()))
                .collect(),
        )
    }
}

impl<C: Into<Col>, V: Into<Value>, const N: usize> From<[(C, V); N]> for Values {
    fn from(pairs: [(C, V); N]) -> Self {
        Values(
            pairs
                .into_iter()
                .map(|(c, v)| (c.into(), v.into()))
                .collect(),
        )
    }
}

/// One WHERE clause; clauses AND together.
#[derive(Debug, Clone)]
pub enum Clause {
    /// `col = ?`, or `col IS NULL` when the value is null.
    Eq(Col, Value),
    /// `col <op> ?`; the operator is validated against the dialect.
    Cmp(Col, String, Value),
    /// `col IN (?, ...)`; empty input emits the false tautology `IN (NULL)`.
    In(Col, Vec<Value>),
    /// `col NOT IN (?, ...)`; empty input emits the true tautology.
    NotIn(Col, Vec<Value>),
    /// Raw SQL with `?` placeholders, wrapped in parentheses.
    Expr(String, Vec<Value>),
}

/// A WHERE predicate: a sequence of clauses combined with AND.
#[derive(Debug, Clone, Default)]
pub struct Where(pub(crate) Vec<Clause>);

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Equality clause; null values emit `IS NULL`.
    pub fn eq(mut self, col: impl Into<Col>, value: impl Into<Value>) -> Self {
        self.0.push(Clause::Eq(col.into(), value.into()));
        self
    }

    /// Comparison clause with an explicit operator, e.g. `"<="` or `"LIKE"`.
    pub fn cmp(
        mut self,
        col: impl Into<Col>,
        op: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.0.push(Clause::Cmp(col.into(), op.into(), value.into()));
        self
    }

    /// Membership clause over the given values.
    pub fn is_in<V: Into<Value>>(
        mut self,
        col: impl Into<Col>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.0.push(Clause::In(
            col.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Negated membership clause.
    pub fn not_in<V: Into<Value>>(
        mut self,
        col: impl Into<Col>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.0.push(Clause::NotIn(
            col.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// `col IS NULL`.
    pub fn is_null(self, col: impl Into<Col>) -> Self {
        self.cmp(col, "IS", Value::Null)
    }

    /// `col IS NOT NULL`.
    pub fn not_null(self, col: impl Into<Col>) -> Self {
        self.cmp(col, "IS NOT", Value::Null)
    }

    /// Raw SQL predicate with `?` placeholders, emitted in parentheses.
    pub fn raw<V: Into<Value>>(
        mut self,
        sql: impl Into<String>,
        params: impl IntoIterator<Item = V>,
    ) -> Self {
        self.0.push(Clause::Expr(
            sql.into(),
            params.into_iter().map(Into::into).collect(),
        ));
        self
    }
}

impl From<()> for Where {
    fn from(_: ()) -> Self {
        Where::new()
    }
}

impl<C: Into<Col>, V: Into<Value>> From<Vec<(C, V)>> for Where {
    fn from(pairs: Vec<(C, V)>) -> Self {
        Where(
            pairs
                .into_iter()
                .map(|(c, v)| Clause::Eq(c.into(), v.into()))
                .collect(),
        )
    }
}

impl<C: Into<Col>, V: Into<Value>, const N: usize> From<[(C, V); N]> for Where {
    fn from(pairs: [(C, V); N]) -> Self {
        Where(
            pairs
                .into_iter()
                .map(|(c, v)| Clause::Eq(c.into(), v.into()))
                .collect(),
        )
    }
}

impl From<Clause> for Where {
    fn from(clause: Clause) -> Self {
        Where(vec![clause])
    }
}

/// Sort direction. Unresolved tokens are validated during assembly.
#[derive(Debug, Clone, PartialEq)]
pub enum Direction {
    Asc,
    Desc,
    /// A direction token supplied as text, resolved (or rejected) at
    /// assembly time.
    Token(String),
}

impl From<bool> for Direction {
    /// `true` sorts ascending.
    fn from(ascending: bool) -> Self {
        if ascending {
            Direction::Asc
        } else {
            Direction::Desc
        }
    }
}

impl From<&str> for Direction {
    fn from(token: &str) -> Self {
        Direction::Token(token.to_string())
    }
}

/// An ORDER BY specification: columns with optional directions. A column
/// without a direction sorts ascending.
#[derive(Debug, Clone, Default)]
pub struct Order(pub(crate) Vec<(Col, Option<Direction>)>);

impl Order {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a column with the default (ascending) direction.
    pub fn by(mut self, col: impl Into<Col>) -> Self {
        self.0.push((col.into(), None));
        self
    }

    /// Append an ascending column.
    pub fn asc(mut self, col: impl Into<Col>) -> Self {
        self.0.push((col.into(), Some(Direction::Asc)));
        self
    }

    /// Append a descending column.
    pub fn desc(mut self, col: impl Into<Col>) -> Self {
        self.0.push((col.into(), Some(Direction::Desc)));
        self
    }

    /// Append a column with an explicit direction.
    pub fn dir(mut self, col: impl Into<Col>, direction: impl Into<Direction>) -> Self {
        self.0.push((col.into(), Some(direction.into())));
        self
    }
}

impl From<&str> for Order {
    /// A bare name, or `"name ASC"` / `"name DESC"`.
    fn from(text: &str) -> Self {
        let mut parts = text.rsplitn(2, ' ');
        let last = parts.next().unwrap_or_default();
        if let Some(head) = parts.next() {
            if last.eq_ignore_ascii_case("asc") || last.eq_ignore_ascii_case("desc") {
                return Order(vec![(
                    Col::raw(head.trim_end()),
                    Some(Direction::Token(last.to_string())),
                )]);
            }
        }
        Order(vec![(Col::raw(text), None)])
    }
}

impl From<(&str, bool)> for Order {
    fn from((name, ascending): (&str, bool)) -> Self {
        Order(vec![(Col::raw(name), Some(ascending.into()))])
    }
}

impl From<(&str, &str)> for Order {
    fn from((name, token): (&str, &str)) -> Self {
        Order(vec![(Col::raw(name), Some(Direction::Token(token.into())))])
    }
}

impl From<Vec<(&str, bool)>> for Order {
    fn from(pairs: Vec<(&str, bool)>) -> Self {
        Order(
            pairs
                .into_iter()
                .map(|(name, ascending)| (Col::raw(name), Some(ascending.into())))
                .collect(),
        )
    }
}

impl From<Vec<&str>> for Order {
    fn from(names: Vec<&str>) -> Self {
        Order(names.into_iter().map(|n| (Col::raw(n), None)).collect())
    }
}

impl From<()> for Order {
    fn from(_: ()) -> Self {
        Order::new()
    }
}

/// LIMIT / OFFSET. Negative or absent components omit the clause.
#[derive(Debug, Clone, Copy, Default)]
pub struct Limit {
    pub count: Option<i64>,
    pub offset: Option<i64>,
}

impl Limit {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn count(n: i64) -> Self {
        Self {
            count: Some(n),
            offset: None,
        }
    }

    pub fn with_offset(n: i64, offset: i64) -> Self {
        Self {
            count: Some(n),
            offset: Some(offset),
        }
    }

    pub fn is_none(&self) -> bool {
        self.count.is_none() && self.offset.is_none()
    }

    /// The LIMIT component, when present and non-negative.
    pub(crate) fn effective_count(&self) -> Option<i64> {
        self.count.filter(|n| *n >= 0)
    }

    /// The OFFSET component, when present and non-negative.
    pub(crate) fn effective_offset(&self) -> Option<i64> {
        self.offset.filter(|n| *n >= 0)
    }
}

impl From<i64> for Limit {
    fn from(n: i64) -> Self {
        Limit::count(n)
    }
}

impl From<(i64, i64)> for Limit {
    fn from((count, offset): (i64, i64)) -> Self {
        Limit::with_offset(count, offset)
    }
}

impl From<(Option<i64>, Option<i64>)> for Limit {
    fn from((count, offset): (Option<i64>, Option<i64>)) -> Self {
        Limit { count, offset }
    }
}

impl From<()> for Limit {
    fn from(_: ()) -> Self {
        Limit::none()
    }
}

/// The optional parts of a SELECT, and the WHERE parts of UPDATE and DELETE.
#[derive(Debug, Clone, Default)]
pub struct Select {
    pub cols: Columns,
    pub where_: Where,
    pub group: Columns,
    pub order: Order,
    pub limit: Limit,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the projected columns.
    pub fn cols(mut self, cols: impl Into<Columns>) -> Self {
        self.cols = cols.into();
        self
    }

    /// Set the WHERE predicate.
    pub fn filter(mut self, where_: impl Into<Where>) -> Self {
        self.where_ = where_.into();
        self
    }

    /// Set the GROUP BY columns.
    pub fn group(mut self, group: impl Into<Columns>) -> Self {
        self.group = group.into();
        self
    }

    /// Set the ORDER BY specification.
    pub fn order(mut self, order: impl Into<Order>) -> Self {
        self.order = order.into();
        self
    }

    /// Set the LIMIT / OFFSET.
    pub fn limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = limit.into();
        self
    }
}

impl From<Where> for Select {
    fn from(where_: Where) -> Self {
        Select::new().filter(where_)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_from_str_parses_direction_suffix() {
        let order = Order::from("name DESC");
        assert_eq!(order.0.len(), 1);
        assert_eq!(order.0[0].0.name, "name");
        assert_eq!(order.0[0].1, Some(Direction::Token("DESC".into())));

        let bare = Order::from("name");
        assert_eq!(bare.0[0].1, None);
    }

    #[test]
    fn test_where_pairs_become_equality_clauses() {
        let where_ = Where::from(vec![("id", Value::Int(1)), ("val", Value::Null)]);
        assert_eq!(where_.0.len(), 2);
        assert!(matches!(&where_.0[0], Clause::Eq(col, Value::Int(1)) if col.name == "id"));
    }

    #[test]
    fn test_limit_negative_components_are_omitted() {
        let limit = Limit::from((-1, 2));
        assert_eq!(limit.effective_count(), None);
        assert_eq!(limit.effective_offset(), Some(2));
        assert!(Limit::from(()).is_none());
    }

    #[test]
    fn test_columns_star() {
        assert!(Columns::from("*").is_empty());
        assert!(!Columns::from(["a", "b"]).is_empty());
    }
}
