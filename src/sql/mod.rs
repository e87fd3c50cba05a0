//! SQL assembly.
//!
//! The assembler is a pure function layer: given an operation kind, a dialect,
//! and canonical structured arguments, it produces a parameterized statement.
//! It performs no I/O; every structural violation raises
//! [`Error::BadArgument`](crate::Error::BadArgument) before a driver is ever
//! touched.

pub mod args;
pub mod dialect;

use crate::db::schema::TableSchema;
use crate::error::{Error, Result};
use crate::registry;
use crate::value::Value;

use args::{Clause, Col, Columns, Direction, Limit, Order, Select, Target, Values};
use dialect::{Dialect, Placeholder};

/// Operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Select,
    Insert,
    Update,
    Delete,
}

/// An assembled statement: SQL text plus positional parameters.
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Assembly context: the dialect, an optional schema prefix for unqualified
/// table names, and the target table's cached metadata when known.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub dialect: &'static Dialect,
    pub schema_prefix: Option<&'a str>,
    pub table: Option<&'a TableSchema>,
}

impl<'a> Context<'a> {
    pub fn new(dialect: &'static Dialect) -> Self {
        Self {
            dialect,
            schema_prefix: None,
            table: None,
        }
    }
}

/// Assemble `op` against `target` into a parameterized statement.
///
/// `q` supplies the SELECT parts (and the WHERE predicate for UPDATE and
/// DELETE); `values` supplies the INSERT / UPDATE column-value pairs.
pub fn assemble(
    op: Op,
    ctx: &Context<'_>,
    target: &Target,
    q: &Select,
    values: &Values,
) -> Result<Statement> {
    let mut out = Emitter::new(ctx);
    let table_sql = render_table(ctx, target);

    let mut sql = match op {
        Op::Select => format!(
            "SELECT {} FROM {}",
            render_columns(ctx, &q.cols, "*")?,
            table_sql
        ),
        Op::Insert => format!("INSERT INTO {table_sql}"),
        Op::Update => format!("UPDATE {table_sql}"),
        Op::Delete => format!("DELETE FROM {table_sql}"),
    };

    if op == Op::Insert {
        let pairs = elide_null_pk(ctx, target, values);
        if pairs.is_empty() {
            return Err(Error::bad_argument("INSERT requires a non-empty value set"));
        }
        let cols: Vec<String> = pairs.iter().map(|(c, _)| render_col(ctx, c)).collect();
        let slots: Vec<String> = pairs
            .iter()
            .map(|(c, v)| out.push_cast(c, (*v).clone()))
            .collect();
        sql.push_str(&format!(
            " ({}) VALUES ({})",
            cols.join(", "),
            slots.join(", ")
        ));
        if ctx.dialect.supports_returning {
            if let Some(pk) = primary_key(ctx, target) {
                sql.push_str(&format!(" RETURNING {}", render_col(ctx, &Col::bound(pk))));
            }
        }
    }

    if op == Op::Update {
        if values.is_empty() {
            return Err(Error::bad_argument("UPDATE requires a non-empty value set"));
        }
        let sets: Vec<String> = values
            .iter()
            .map(|(c, v)| format!("{} = {}", render_col(ctx, c), out.push_cast(c, v.clone())))
            .collect();
        sql.push_str(&format!(" SET {}", sets.join(", ")));
    }

    if matches!(op, Op::Select | Op::Update | Op::Delete) && !q.where_.is_empty() {
        sql.push_str(" WHERE ");
        for (i, clause) in q.where_.0.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            sql.push_str(&render_clause(ctx, &mut out, clause)?);
        }
    }

    if op == Op::Select {
        if !q.group.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", render_columns(ctx, &q.group, "")?));
        }
        if !q.order.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", render_order(ctx, &q.order)?));
        }
        render_limit(ctx, &mut out, &mut sql, &q.limit);
    }

    Ok(Statement {
        sql,
        params: out.params,
    })
}

/// Tracks emitted parameters and renders placeholders for them.
struct Emitter<'a> {
    dialect: &'static Dialect,
    table: Option<&'a TableSchema>,
    params: Vec<Value>,
}

impl<'a> Emitter<'a> {
    fn new(ctx: &Context<'a>) -> Self {
        Self {
            dialect: ctx.dialect,
            table: ctx.table,
            params: Vec::new(),
        }
    }

    /// Append a parameter, returning its placeholder text.
    fn push(&mut self, value: Value) -> String {
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }

    /// Append a parameter with a server-side cast when the column's declared
    /// type has a registered converter (networked dialect only).
    fn push_cast(&mut self, col: &Col, value: Value) -> String {
        let slot = self.push(value);
        if self.dialect.placeholder == Placeholder::Dollar {
            if let Some(decl) = self.declared_type(&col.name) {
                if registry::has_converter(&decl) {
                    return format!("{slot}::{decl}");
                }
            }
        }
        slot
    }

    fn declared_type(&self, column: &str) -> Option<String> {
        let table = self.table?;
        table
            .columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(column))
            .map(|c| c.decl_type.clone())
    }
}

/// Render the table reference: plain names verbatim, record-derived names
/// resolved against the schema cache and auto-quoted.
fn render_table(ctx: &Context<'_>, target: &Target) -> String {
    let name = match target {
        Target::Name(name) => name.clone(),
        Target::Bound(binding) => {
            let declared = ctx
                .table
                .map(|t| t.name.clone())
                .unwrap_or_else(|| binding.table.to_string());
            auto_quote(ctx.dialect, &declared)
        }
    };
    match ctx.schema_prefix {
        Some(prefix) if !name.contains('.') => format!("{prefix}.{name}"),
        _ => name,
    }
}

/// Render one column reference. Bound names go through casing resolution and
/// auto-quoting; plain names are emitted verbatim.
fn render_col(ctx: &Context<'_>, col: &Col) -> String {
    if !col.bound {
        return col.name.clone();
    }
    auto_quote(ctx.dialect, &resolve_column(ctx, &col.name))
}

/// Quote a record-derived identifier when the dialect requires it. The
/// networked engine additionally quotes mixed-case names so the declared
/// casing survives the server's folding.
fn auto_quote(dialect: &Dialect, name: &str) -> String {
    let force = dialect.placeholder == Placeholder::Dollar
        && name.chars().any(|c| c.is_uppercase());
    dialect.quote(name, force)
}

/// Resolve a record-derived column name to the declared form: exact match
/// first, then a unique case-insensitive match, else pass through.
fn resolve_column(ctx: &Context<'_>, name: &str) -> String {
    let Some(table) = ctx.table else {
        return name.to_string();
    };
    if table.columns.iter().any(|c| c.name == name) {
        return name.to_string();
    }
    let mut matches = table
        .columns
        .iter()
        .filter(|c| c.name.eq_ignore_ascii_case(name));
    match (matches.next(), matches.next()) {
        (Some(column), None) => column.name.clone(),
        _ => name.to_string(),
    }
}

fn render_columns(ctx: &Context<'_>, cols: &Columns, default: &str) -> Result<String> {
    if cols.is_empty() {
        return Ok(default.to_string());
    }
    Ok(cols
        .0
        .iter()
        .map(|c| render_col(ctx, c))
        .collect::<Vec<_>>()
        .join(", "))
}

fn render_clause(ctx: &Context<'_>, out: &mut Emitter<'_>, clause: &Clause) -> Result<String> {
    match clause {
        Clause::Eq(col, value) => {
            let name = render_col(ctx, col);
            if value.is_null() {
                Ok(format!("{name} IS NULL"))
            } else {
                let slot = out.push_cast(col, value.clone());
                Ok(format!("{name} = {slot}"))
            }
        }
        Clause::Cmp(col, op, value) => {
            let upper = op.trim().to_uppercase();
            if !ctx.dialect.is_operator(&upper) {
                return Err(Error::bad_argument(format!("unknown operator: {op}")));
            }
            let name = render_col(ctx, col);
            if value.is_null() {
                let null_op = match upper.as_str() {
                    "=" | "==" => "IS".to_string(),
                    "!=" | "<>" => "IS NOT".to_string(),
                    other => other.to_string(),
                };
                Ok(format!("{name} {null_op} NULL"))
            } else {
                let slot = out.push_cast(col, value.clone());
                Ok(format!("{name} {upper} {slot}"))
            }
        }
        Clause::In(col, values) | Clause::NotIn(col, values) => {
            let op = if matches!(clause, Clause::In(..)) {
                "IN"
            } else {
                "NOT IN"
            };
            let name = render_col(ctx, col);
            if values.is_empty() {
                // Tautology preserving the strict semantics of empty
                // membership: false for IN, true for NOT IN.
                return Ok(format!("{name} {op} (NULL)"));
            }
            let slots: Vec<String> = values
                .iter()
                .map(|v| out.push_cast(col, v.clone()))
                .collect();
            Ok(format!("{name} {op} ({})", slots.join(", ")))
        }
        Clause::Expr(sql, params) => {
            let holes = sql.matches('?').count();
            if holes != params.len() {
                return Err(Error::bad_argument(format!(
                    "expression has {holes} placeholders but {} parameters",
                    params.len()
                )));
            }
            let mut rendered = String::with_capacity(sql.len());
            let mut remaining = params.iter();
            for ch in sql.chars() {
                if ch == '?' {
                    let value = remaining
                        .next()
                        .ok_or_else(|| Error::bad_argument("expression parameter underflow"))?;
                    rendered.push_str(&out.push(value.clone()));
                } else {
                    rendered.push(ch);
                }
            }
            Ok(format!("({rendered})"))
        }
    }
}

fn render_order(ctx: &Context<'_>, order: &Order) -> Result<String> {
    let mut parts = Vec::with_capacity(order.0.len());
    for (col, direction) in &order.0 {
        let keyword = match direction {
            None | Some(Direction::Asc) => "ASC",
            Some(Direction::Desc) => "DESC",
            Some(Direction::Token(token)) => {
                let upper = token.trim().to_uppercase();
                match upper.as_str() {
                    "ASC" => "ASC",
                    "DESC" => "DESC",
                    _ => {
                        return Err(Error::bad_argument(format!(
                            "unknown sort direction: {token}"
                        )))
                    }
                }
            }
        };
        parts.push(format!("{} {keyword}", render_col(ctx, col)));
    }
    Ok(parts.join(", "))
}

fn render_limit(ctx: &Context<'_>, out: &mut Emitter<'_>, sql: &mut String, limit: &Limit) {
    let count = limit.effective_count();
    let offset = limit.effective_offset();
    match (count, offset) {
        (Some(n), None) => {
            let slot = out.push(Value::Int(n));
            sql.push_str(&format!(" LIMIT {slot}"));
        }
        (Some(n), Some(o)) => {
            let slot = out.push(Value::Int(n));
            sql.push_str(&format!(" LIMIT {slot}"));
            let slot = out.push(Value::Int(o));
            sql.push_str(&format!(" OFFSET {slot}"));
        }
        (None, Some(o)) => {
            // OFFSET without LIMIT: the embedded engine requires a LIMIT
            // clause, satisfied by the unbounded marker -1.
            if !ctx.dialect.bare_offset {
                let slot = out.push(Value::Int(-1));
                sql.push_str(&format!(" LIMIT {slot}"));
            }
            let slot = out.push(Value::Int(o));
            sql.push_str(&format!(" OFFSET {slot}"));
        }
        (None, None) => {}
    }
}

/// INSERT built from a record binding drops a null primary key column so the
/// backend can assign the key.
fn elide_null_pk<'v>(
    ctx: &Context<'_>,
    target: &Target,
    values: &'v Values,
) -> Vec<(&'v Col, &'v Value)> {
    let pk = if target.is_bound() {
        primary_key(ctx, target)
    } else {
        None
    };
    values
        .iter()
        .filter(|(col, value)| match &pk {
            Some(key) => !(col.name.eq_ignore_ascii_case(key) && value.is_null()),
            None => true,
        })
        .collect()
}

fn primary_key(ctx: &Context<'_>, target: &Target) -> Option<String> {
    if let Some(table) = ctx.table {
        if let Some(pk) = &table.primary_key {
            return Some(pk.clone());
        }
    }
    target
        .binding()
        .and_then(|b| b.primary_key)
        .map(|pk| pk.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{ColumnSchema, TableSchema};
    use args::{TableBinding, Where};
    use dialect::{POSTGRES, SQLITE};

    fn sqlite() -> Context<'static> {
        Context::new(&SQLITE)
    }

    fn postgres() -> Context<'static> {
        Context::new(&POSTGRES)
    }

    fn count_placeholders(sql: &str, dialect: &Dialect) -> usize {
        match dialect.placeholder {
            Placeholder::Question => sql.matches('?').count(),
            Placeholder::Dollar => (1..)
                .take_while(|n| sql.contains(&format!("${n}")))
                .count(),
        }
    }

    #[test]
    fn test_select_minimal() {
        let stmt = assemble(
            Op::Select,
            &sqlite(),
            &Target::from("t"),
            &Select::new(),
            &Values::new(),
        )
        .unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM t");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_placeholder_count_matches_params() {
        for ctx in [sqlite(), postgres()] {
            let stmt = assemble(
                Op::Select,
                &ctx,
                &Target::from("t"),
                &Select::new()
                    .filter(
                        Where::new()
                            .eq("a", 1i64)
                            .is_in("b", [1i64, 2, 3])
                            .raw("c < ? OR c > ?", [0i64, 9]),
                    )
                    .limit((5i64, 2i64)),
                &Values::new(),
            )
            .unwrap();
            assert_eq!(
                count_placeholders(&stmt.sql, ctx.dialect),
                stmt.params.len()
            );
        }
    }

    #[test]
    fn test_where_shapes() {
        let stmt = assemble(
            Op::Select,
            &sqlite(),
            &Target::from("t"),
            &Select::new().filter(
                Where::new()
                    .raw("id < ? OR id > ?", [Value::Int(1), Value::Int(2)])
                    .eq("val", "a"),
            ),
            &Values::new(),
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM t WHERE (id < ? OR id > ?) AND val = ?"
        );
        assert_eq!(
            stmt.params,
            vec![Value::Int(1), Value::Int(2), Value::Text("a".into())]
        );
    }

    #[test]
    fn test_null_equality_becomes_is_null() {
        let stmt = assemble(
            Op::Select,
            &sqlite(),
            &Target::from("t"),
            &Select::new().filter(Where::new().eq("val", Value::Null).cmp("x", "!=", Value::Null)),
            &Values::new(),
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM t WHERE val IS NULL AND x IS NOT NULL"
        );
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_in_expansion_and_empty_tautology() {
        let stmt = assemble(
            Op::Select,
            &sqlite(),
            &Target::from("t"),
            &Select::new().filter(Where::new().is_in("c", [1i64, 2, 3])),
            &Values::new(),
        )
        .unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM t WHERE c IN (?, ?, ?)");
        assert_eq!(stmt.params.len(), 3);

        let empty = assemble(
            Op::Select,
            &sqlite(),
            &Target::from("t"),
            &Select::new().filter(Where::new().is_in("c", Vec::<Value>::new())),
            &Values::new(),
        )
        .unwrap();
        assert_eq!(empty.sql, "SELECT * FROM t WHERE c IN (NULL)");
        let negated = assemble(
            Op::Select,
            &sqlite(),
            &Target::from("t"),
            &Select::new().filter(Where::new().not_in("c", Vec::<Value>::new())),
            &Values::new(),
        )
        .unwrap();
        assert_eq!(negated.sql, "SELECT * FROM t WHERE c NOT IN (NULL)");
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let result = assemble(
            Op::Select,
            &sqlite(),
            &Target::from("t"),
            &Select::new().filter(Where::new().cmp("c", "FROB", 1i64)),
            &Values::new(),
        );
        assert!(matches!(result, Err(Error::BadArgument(_))));
    }

    #[test]
    fn test_order_directions_equivalent() {
        let variants: Vec<Order> = vec![
            Order::from("c"),
            Order::from("c ASC"),
            Order::from(("c", true)),
            Order::new().by("c"),
            Order::new().dir("c", true),
        ];
        let mut rendered = Vec::new();
        for order in variants {
            let stmt = assemble(
                Op::Select,
                &sqlite(),
                &Target::from("t"),
                &Select::new().order(order),
                &Values::new(),
            )
            .unwrap();
            rendered.push(stmt.sql);
        }
        assert!(rendered.iter().all(|s| s == "SELECT * FROM t ORDER BY c ASC"));

        let desc = assemble(
            Op::Select,
            &sqlite(),
            &Target::from("t"),
            &Select::new().order(("c", false)),
            &Values::new(),
        )
        .unwrap();
        assert_eq!(desc.sql, "SELECT * FROM t ORDER BY c DESC");
    }

    #[test]
    fn test_unknown_order_direction_rejected() {
        let result = assemble(
            Op::Select,
            &sqlite(),
            &Target::from("t"),
            &Select::new().order(("c", "SIDEWAYS")),
            &Values::new(),
        );
        assert!(matches!(result, Err(Error::BadArgument(_))));
    }

    #[test]
    fn test_limit_offset_rules() {
        let both = assemble(
            Op::Select,
            &sqlite(),
            &Target::from("t"),
            &Select::new().limit((3i64, 4i64)),
            &Values::new(),
        )
        .unwrap();
        assert_eq!(both.sql, "SELECT * FROM t LIMIT ? OFFSET ?");
        assert_eq!(both.params, vec![Value::Int(3), Value::Int(4)]);

        // Negative limit drops the LIMIT clause; the embedded engine
        // backfills the unbounded marker before OFFSET.
        let offset_only = assemble(
            Op::Select,
            &sqlite(),
            &Target::from("t"),
            &Select::new().limit((-1i64, 4i64)),
            &Values::new(),
        )
        .unwrap();
        assert_eq!(offset_only.sql, "SELECT * FROM t LIMIT ? OFFSET ?");
        assert_eq!(offset_only.params, vec![Value::Int(-1), Value::Int(4)]);

        let pg_offset_only = assemble(
            Op::Select,
            &postgres(),
            &Target::from("t"),
            &Select::new().limit((-1i64, 4i64)),
            &Values::new(),
        )
        .unwrap();
        assert_eq!(pg_offset_only.sql, "SELECT * FROM t OFFSET $1");
    }

    #[test]
    fn test_insert_shape_and_empty_values_rejected() {
        let stmt = assemble(
            Op::Insert,
            &sqlite(),
            &Target::from("t"),
            &Select::new(),
            &Values::new().set("a", 1i64).set("b", Value::Null),
        )
        .unwrap();
        assert_eq!(stmt.sql, "INSERT INTO t (a, b) VALUES (?, ?)");
        assert_eq!(stmt.params, vec![Value::Int(1), Value::Null]);

        let empty = assemble(
            Op::Insert,
            &sqlite(),
            &Target::from("t"),
            &Select::new(),
            &Values::new(),
        );
        assert!(matches!(empty, Err(Error::BadArgument(_))));
    }

    #[test]
    fn test_update_and_delete_shapes() {
        let update = assemble(
            Op::Update,
            &sqlite(),
            &Target::from("t"),
            &Select::new().filter(Where::new().eq("id", 2i64)),
            &Values::new().set("val", "z"),
        )
        .unwrap();
        assert_eq!(update.sql, "UPDATE t SET val = ? WHERE id = ?");
        assert_eq!(update.params, vec![Value::Text("z".into()), Value::Int(2)]);

        let delete = assemble(
            Op::Delete,
            &sqlite(),
            &Target::from("t"),
            &Select::new().filter(Where::new().eq("id", 2i64)),
            &Values::new(),
        )
        .unwrap();
        assert_eq!(delete.sql, "DELETE FROM t WHERE id = ?");

        let no_values = assemble(
            Op::Update,
            &sqlite(),
            &Target::from("t"),
            &Select::new(),
            &Values::new(),
        );
        assert!(matches!(no_values, Err(Error::BadArgument(_))));
    }

    #[test]
    fn test_postgres_numbered_placeholders_in_append_order() {
        let stmt = assemble(
            Op::Update,
            &postgres(),
            &Target::from("t"),
            &Select::new().filter(Where::new().eq("id", 7i64)),
            &Values::new().set("a", 1i64).set("b", 2i64),
        )
        .unwrap();
        assert_eq!(stmt.sql, "UPDATE t SET a = $1, b = $2 WHERE id = $3");
        assert_eq!(
            stmt.params,
            vec![Value::Int(1), Value::Int(2), Value::Int(7)]
        );
    }

    fn people_schema() -> TableSchema {
        TableSchema {
            name: "People".to_string(),
            columns: vec![
                ColumnSchema::new("Id", "bigint"),
                ColumnSchema::new("FullName", "text"),
                ColumnSchema::new("Extra", "jsonb"),
            ],
            primary_key: Some("Id".to_string()),
        }
    }

    #[test]
    fn test_bound_names_resolve_casing_and_quote() {
        let schema = people_schema();
        let ctx = Context {
            dialect: &POSTGRES,
            schema_prefix: None,
            table: Some(&schema),
        };
        let target = Target::Bound(TableBinding {
            table: "People",
            columns: &["id", "fullname"],
            primary_key: Some("id"),
        });
        let stmt = assemble(
            Op::Select,
            &ctx,
            &target,
            &Select::new()
                .cols(vec![Col::bound("fullname")])
                .filter(Where::from(Clause::Eq(Col::bound("id"), Value::Int(1)))),
            &Values::new(),
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT \"FullName\" FROM \"People\" WHERE \"Id\" = $1"
        );
    }

    #[test]
    fn test_plain_names_never_auto_quoted() {
        // Caller-supplied text is emitted verbatim even when it would need
        // quoting; record-derived names with the same shape are quoted.
        let stmt = assemble(
            Op::Select,
            &sqlite(),
            &Target::from("t"),
            &Select::new().cols("group"),
            &Values::new(),
        )
        .unwrap();
        assert_eq!(stmt.sql, "SELECT group FROM t");

        let bound = assemble(
            Op::Select,
            &sqlite(),
            &Target::from("t"),
            &Select::new().cols(vec![Col::bound("group")]),
            &Values::new(),
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT \"group\" FROM t");
    }

    #[test]
    fn test_insert_null_pk_elided_for_bound_target() {
        let target = Target::Bound(TableBinding {
            table: "t",
            columns: &["id", "val"],
            primary_key: Some("id"),
        });
        let stmt = assemble(
            Op::Insert,
            &sqlite(),
            &target,
            &Select::new(),
            &Values::new()
                .set(Col::bound("id"), Value::Null)
                .set(Col::bound("val"), "a"),
        )
        .unwrap();
        assert_eq!(stmt.sql, "INSERT INTO t (val) VALUES (?)");
    }

    #[test]
    fn test_insert_returning_with_schema_pk() {
        let schema = people_schema();
        let ctx = Context {
            dialect: &POSTGRES,
            schema_prefix: None,
            table: Some(&schema),
        };
        let stmt = assemble(
            Op::Insert,
            &ctx,
            &Target::from("People"),
            &Select::new(),
            &Values::new().set("FullName", "ada"),
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO People (FullName) VALUES ($1) RETURNING \"Id\""
        );
    }

    #[test]
    fn test_parameter_cast_for_registered_converter() {
        let _guard = registry::test_lock();
        registry::reset();
        registry::register_converter("jsonb", |v| v);
        let schema = people_schema();
        let ctx = Context {
            dialect: &POSTGRES,
            schema_prefix: None,
            table: Some(&schema),
        };
        let stmt = assemble(
            Op::Update,
            &ctx,
            &Target::from("People"),
            &Select::new().filter(Where::new().eq("Id", 1i64)),
            &Values::new().set("Extra", Value::Json(serde_json::json!({"a": 1}))),
        )
        .unwrap();
        assert_eq!(stmt.sql, "UPDATE People SET Extra = $1::jsonb WHERE Id = $2");
        registry::reset();
    }

    #[test]
    fn test_schema_prefix_applies_to_unqualified_names() {
        let ctx = Context {
            dialect: &POSTGRES,
            schema_prefix: Some("audit"),
            table: None,
        };
        let stmt = assemble(
            Op::Select,
            &ctx,
            &Target::from("t"),
            &Select::new(),
            &Values::new(),
        )
        .unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM audit.t");

        let qualified = assemble(
            Op::Select,
            &ctx,
            &Target::from("public.t"),
            &Select::new(),
            &Values::new(),
        )
        .unwrap();
        assert_eq!(qualified.sql, "SELECT * FROM public.t");
    }

    #[test]
    fn test_expression_placeholder_mismatch_rejected() {
        let result = assemble(
            Op::Select,
            &sqlite(),
            &Target::from("t"),
            &Select::new().filter(Where::new().raw("a = ? AND b = ?", [Value::Int(1)])),
            &Values::new(),
        );
        assert!(matches!(result, Err(Error::BadArgument(_))));
    }
}
