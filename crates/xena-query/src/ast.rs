// SPDX-License-Identifier: Apache-2.0

//! Structured query AST and its SQL compiler. Callers never hand the
//! engine SQL text: identifiers are validated, every literal becomes a
//! bound parameter, and inline arrays compile to `rarray` virtual-table
//! references (the `TABLE(col TYPE=(…))` construct), so the surface is
//! injection-free by construction.

use std::rc::Rc;

use rusqlite::types::{ToSqlOutput, Value as SqlValue};
use rusqlite::ToSql;

use xena_core::{Error, Result};

/// Typed literal, used both as a bound parameter and as a result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    fn to_sql_value(&self) -> SqlValue {
        match self {
            Self::Null => SqlValue::Null,
            Self::Int(v) => SqlValue::Integer(*v),
            Self::Float(v) => SqlValue::Real(*v),
            Self::Text(v) => SqlValue::Text(v.clone()),
            Self::Bytes(v) => SqlValue::Blob(v.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    const fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference, optionally qualified: "name" or "alias.name".
    Column(String),
    Literal(Value),
    Call { name: String, args: Vec<Expr> },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    InList {
        expr: Box<Expr>,
        values: Vec<Value>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    Table {
        name: String,
        alias: Option<String>,
    },
    /// Inline array joined as a one-column table; the column is named
    /// `value`. Used to join on caller-supplied name lists.
    Values { alias: String, values: Vec<Value> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: TableRef,
    pub on: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectItem {
    #[must_use]
    pub fn column(name: &str) -> Self {
        Self {
            expr: Expr::Column(name.to_string()),
            alias: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub select: Vec<SelectItem>,
    pub from: TableRef,
    pub joins: Vec<Join>,
    pub filter: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<(Expr, Direction)>,
    pub limit: Option<u64>,
}

impl Query {
    #[must_use]
    pub fn select_from(select: Vec<SelectItem>, table: &str) -> Self {
        Self {
            select,
            from: TableRef::Table {
                name: table.to_string(),
                alias: None,
            },
            joins: Vec::new(),
            filter: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }
}

/// Bound parameter: either a plain value or an `rarray` argument.
#[derive(Debug)]
pub(crate) enum SqlParam {
    Plain(SqlValue),
    Array(rusqlite::vtab::array::Array),
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Plain(v) => v.to_sql(),
            Self::Array(a) => a.to_sql(),
        }
    }
}

/// Functions callers may invoke. Everything else is rejected before SQL
/// is ever assembled.
const ALLOWED_FUNCTIONS: [&str; 7] = [
    "count",
    "sum",
    "min",
    "max",
    "avg",
    "unpack",
    "unpackvalue",
];

fn check_ident(part: &str) -> Result<()> {
    let mut chars = part.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if head_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(Error::schema(format!("malformed identifier `{part}`")))
    }
}

/// Validate a possibly-qualified identifier and render it quoted.
fn quote_ident(ident: &str) -> Result<String> {
    let parts: Vec<&str> = ident.split('.').collect();
    if parts.is_empty() || parts.len() > 2 {
        return Err(Error::schema(format!("malformed identifier `{ident}`")));
    }
    for part in &parts {
        check_ident(part)?;
    }
    Ok(parts
        .iter()
        .map(|p| format!("\"{p}\""))
        .collect::<Vec<_>>()
        .join("."))
}

struct Compiler {
    sql: String,
    params: Vec<SqlParam>,
}

impl Compiler {
    fn push_value(&mut self, value: &Value) {
        self.sql.push('?');
        self.params.push(SqlParam::Plain(value.to_sql_value()));
    }

    fn expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Column(name) => self.sql.push_str(&quote_ident(name)?),
            Expr::Literal(value) => self.push_value(value),
            Expr::Call { name, args } => {
                let lowered = name.to_ascii_lowercase();
                if !ALLOWED_FUNCTIONS.contains(&lowered.as_str()) {
                    return Err(Error::schema(format!("function `{name}` not allowed")));
                }
                // unpackValue is registered camel-cased; SQLite resolves
                // function names case-insensitively, so the lowered form
                // is safe to emit.
                self.sql.push_str(&lowered);
                self.sql.push('(');
                if args.is_empty() && lowered == "count" {
                    self.sql.push('*');
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.expr(arg)?;
                }
                self.sql.push(')');
            }
            Expr::Binary { op, lhs, rhs } => {
                self.sql.push('(');
                self.expr(lhs)?;
                self.sql.push(' ');
                self.sql.push_str(op.sql());
                self.sql.push(' ');
                self.expr(rhs)?;
                self.sql.push(')');
            }
            Expr::InList { expr, values } => {
                self.expr(expr)?;
                self.sql.push_str(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.push_value(value);
                }
                self.sql.push(')');
            }
            Expr::IsNull { expr, negated } => {
                self.expr(expr)?;
                self.sql.push_str(if *negated {
                    " IS NOT NULL"
                } else {
                    " IS NULL"
                });
            }
        }
        Ok(())
    }

    fn table_ref(&mut self, table: &TableRef) -> Result<()> {
        match table {
            TableRef::Table { name, alias } => {
                self.sql.push_str(&quote_ident(name)?);
                if let Some(alias) = alias {
                    self.sql.push_str(" AS ");
                    self.sql.push_str(&quote_ident(alias)?);
                }
            }
            TableRef::Values { alias, values } => {
                self.sql.push_str("rarray(?)");
                let array: Vec<SqlValue> =
                    values.iter().map(Value::to_sql_value).collect();
                self.params.push(SqlParam::Array(Rc::new(array)));
                self.sql.push_str(" AS ");
                self.sql.push_str(&quote_ident(alias)?);
            }
        }
        Ok(())
    }
}

/// Compile a query to SQL text plus bound parameters, in placeholder
/// order. Only SELECT statements can come out of this.
pub(crate) fn compile(query: &Query) -> Result<(String, Vec<SqlParam>)> {
    if query.select.is_empty() {
        return Err(Error::schema("query selects nothing"));
    }
    let mut c = Compiler {
        sql: String::from("SELECT "),
        params: Vec::new(),
    };
    for (i, item) in query.select.iter().enumerate() {
        if i > 0 {
            c.sql.push_str(", ");
        }
        c.expr(&item.expr)?;
        if let Some(alias) = &item.alias {
            c.sql.push_str(" AS ");
            c.sql.push_str(&quote_ident(alias)?);
        }
    }
    c.sql.push_str(" FROM ");
    c.table_ref(&query.from)?;
    for join in &query.joins {
        c.sql.push_str(" JOIN ");
        c.table_ref(&join.table)?;
        c.sql.push_str(" ON ");
        c.expr(&join.on)?;
    }
    if let Some(filter) = &query.filter {
        c.sql.push_str(" WHERE ");
        c.expr(filter)?;
    }
    if !query.group_by.is_empty() {
        c.sql.push_str(" GROUP BY ");
        for (i, expr) in query.group_by.iter().enumerate() {
            if i > 0 {
                c.sql.push_str(", ");
            }
            c.expr(expr)?;
        }
    }
    if !query.order_by.is_empty() {
        c.sql.push_str(" ORDER BY ");
        for (i, (expr, dir)) in query.order_by.iter().enumerate() {
            if i > 0 {
                c.sql.push_str(", ");
            }
            c.expr(expr)?;
            c.sql.push_str(match dir {
                Direction::Asc => " ASC",
                Direction::Desc => " DESC",
            });
        }
    }
    if let Some(limit) = query.limit {
        c.sql.push_str(" LIMIT ?");
        c.params.push(SqlParam::Plain(SqlValue::Integer(limit as i64)));
    }
    Ok((c.sql, c.params))
}
