//! Backend escaping rules.
//!
//! A [`Dialect`] turns identifiers and [`Value`]s into SQL text. Every identifier and every
//! value a [`Select`](crate::Select) renders goes through one of these methods.

use crate::value::Value;
use std::fmt::Debug;

/// Escaping rules of one database backend.
pub trait Dialect: Debug + Send + Sync {
    /// Quote a literal value.
    fn escape(&self, value: &Value) -> String;

    /// Quote a single identifier part (table or column name).
    fn escape_identifier(&self, name: &str) -> String;

    /// Quote a result-column label used after `AS`.
    fn quote_alias(&self, alias: &str) -> String {
        let mut out = String::with_capacity(alias.len() + 2);
        out.push('\'');
        for ch in alias.chars() {
            match ch {
                '\'' => out.push_str("''"),
                '\\' => out.push_str("\\\\"),
                c => out.push(c),
            }
        }
        out.push('\'');
        out
    }
}

/// MySQL escaping: backtick identifiers, backslash-escaped string literals.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    fn escape_string(s: &str, out: &mut String) {
        out.push('\'');
        for ch in s.chars() {
            match ch {
                '\0' => out.push_str("\\0"),
                '\u{8}' => out.push_str("\\b"),
                '\t' => out.push_str("\\t"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\u{1a}' => out.push_str("\\Z"),
                '"' => out.push_str("\\\""),
                '\'' => out.push_str("\\'"),
                '\\' => out.push_str("\\\\"),
                c => out.push(c),
            }
        }
        out.push('\'');
    }
}

impl Dialect for MySqlDialect {
    fn escape(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            Value::Int(n) => n.to_string(),
            Value::UInt(n) => n.to_string(),
            Value::Float(f) if f.is_finite() => f.to_string(),
            Value::Float(_) => "NULL".to_string(),
            Value::String(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                Self::escape_string(s, &mut out);
                out
            }
            Value::Bytes(b) => format!("X'{}'", hex::encode_upper(b)),
            Value::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
            Value::Time(t) => format!("'{}'", t.format("%H:%M:%S%.f")),
            Value::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Json(j) => {
                let text = j.to_string();
                let mut out = String::with_capacity(text.len() + 2);
                Self::escape_string(&text, &mut out);
                out
            }
        }
    }

    fn escape_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }
}

/// PostgreSQL escaping: double-quoted identifiers and aliases, standard string literals.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    fn escape_string(s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }
}

impl Dialect for PostgresDialect {
    fn escape(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Int(n) => n.to_string(),
            Value::UInt(n) => n.to_string(),
            Value::Float(f) if f.is_finite() => f.to_string(),
            Value::Float(_) => "NULL".to_string(),
            Value::String(s) => Self::escape_string(s),
            Value::Bytes(b) => format!("'\\x{}'::bytea", hex::encode_upper(b)),
            Value::Date(d) => format!("'{}'::date", d.format("%Y-%m-%d")),
            Value::Time(t) => format!("'{}'::time", t.format("%H:%M:%S%.f")),
            Value::DateTime(dt) => format!("'{}'::timestamp", dt.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Json(j) => format!("{}::jsonb", Self::escape_string(&j.to_string())),
        }
    }

    fn escape_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn quote_alias(&self, alias: &str) -> String {
        self.escape_identifier(alias)
    }
}
