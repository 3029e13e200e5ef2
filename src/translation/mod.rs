//! Named placeholder handling for SQL Server statements.
//!
//! Callers write `@name` placeholders and pass [`ParameterBinding`]s by name. Tiberius binds
//! parameters positionally as `@P1`, `@P2`, ..., so [`prepare`] validates the bindings and rewrites
//! the statement text into that form.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

mod parsers;
mod scanner;

use parsers::{is_block_comment_end, is_block_comment_start, is_escaped_close, is_line_comment_start};
use scanner::{State, is_positional_name, scan_identifier};

use crate::error::SqlError;
use crate::types::{ExecMode, ParameterBinding, SqlType, TypedValue};

static PARAMETER_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_#][A-Za-z0-9_#$]*$").expect("static regex is valid")
});

static PROCEDURE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\[[^\[\]]+\]|[A-Za-z_#][A-Za-z0-9_@$#]*)(\.(\[[^\[\]]+\]|[A-Za-z_#][A-Za-z0-9_@$#]*)){0,3}$")
        .expect("static regex is valid")
});

/// A binding whose value has been checked against its declared type.
#[derive(Clone, PartialEq)]
pub struct BoundParam {
    pub name: String,
    pub sql_type: SqlType,
    pub value: TypedValue,
}

impl fmt::Debug for BoundParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundParam")
            .field("name", &self.name)
            .field("sql_type", &self.sql_type)
            .finish_non_exhaustive()
    }
}

/// Statement text ready for a driver: positional placeholders plus typed parameters in order.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    /// The SQL (or procedure name) as the caller wrote it.
    pub source: String,
    /// Text sent to the server; `@P{n}` refers to `params[n - 1]`.
    pub text: String,
    pub params: Vec<BoundParam>,
    pub mode: ExecMode,
}

impl PreparedQuery {
    /// A parameterless direct statement, sent exactly as written.
    #[must_use]
    pub fn raw(sql: &str) -> Self {
        Self {
            source: sql.to_string(),
            text: sql.to_string(),
            params: Vec::new(),
            mode: ExecMode::Direct,
        }
    }
}

/// Validate `bindings` and produce the driver-ready statement for `mode`.
///
/// # Errors
///
/// Returns `SqlError::BindingError` when a binding name is malformed or repeated, when a value does
/// not fit its declared type, when a direct statement has no placeholder for a binding, or when a
/// procedure name is not a valid (optionally qualified) identifier.
pub fn prepare(
    sql: &str,
    bindings: &[ParameterBinding],
    mode: ExecMode,
) -> Result<PreparedQuery, SqlError> {
    let mut params: Vec<BoundParam> = Vec::with_capacity(bindings.len());
    for binding in bindings {
        if !PARAMETER_NAME.is_match(&binding.name) {
            return Err(SqlError::BindingError(format!(
                "invalid parameter name '{}'",
                binding.name
            )));
        }
        if is_positional_name(&binding.name) {
            return Err(SqlError::BindingError(format!(
                "parameter name @{} is reserved for positional placeholders",
                binding.name
            )));
        }
        if params
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(&binding.name))
        {
            return Err(SqlError::BindingError(format!(
                "parameter @{} is bound more than once",
                binding.name
            )));
        }
        let value = binding
            .sql_type
            .coerce(&binding.value)
            .map_err(|msg| SqlError::BindingError(format!("parameter @{}: {msg}", binding.name)))?;
        params.push(BoundParam {
            name: binding.name.clone(),
            sql_type: binding.sql_type,
            value,
        });
    }

    let text = match mode {
        ExecMode::Direct => rewrite_named_placeholders(sql, &params)?,
        ExecMode::StoredProcedure => procedure_call(sql, &params)?,
    };

    Ok(PreparedQuery {
        source: sql.to_string(),
        text,
        params,
        mode,
    })
}

fn procedure_call(name: &str, params: &[BoundParam]) -> Result<String, SqlError> {
    let name = name.trim();
    if !PROCEDURE_NAME.is_match(name) {
        return Err(SqlError::BindingError(format!(
            "invalid stored procedure name '{name}'"
        )));
    }
    let args: Vec<String> = params
        .iter()
        .enumerate()
        .map(|(i, p)| format!("@{} = @P{}", p.name, i + 1))
        .collect();
    if args.is_empty() {
        Ok(format!("EXEC {name}"))
    } else {
        Ok(format!("EXEC {name} {}", args.join(", ")))
    }
}

/// Replace each `@name` that matches a binding with its positional `@P{n}` form.
///
/// String literals, quoted and bracketed identifiers, comments and `@@` globals are left alone,
/// as are variables with no binding (e.g. ones the batch declares itself). An unbound variable
/// spelled like a positional placeholder (`@P1`) is rejected when anything is bound, since it would
/// alias a rewritten parameter.
fn rewrite_named_placeholders(sql: &str, params: &[BoundParam]) -> Result<String, SqlError> {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len() + params.len() * 2);
    let mut used = vec![false; params.len()];
    let mut state = State::Normal;
    let mut last = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'[' => state = State::Bracketed,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'@' if bytes.get(idx + 1) == Some(&b'@') => {
                    if let Some((end, _)) = scan_identifier(sql, idx + 2) {
                        idx = end - 1;
                    } else {
                        idx += 1;
                    }
                }
                b'@' => {
                    if let Some((end, name)) = scan_identifier(sql, idx + 1) {
                        if let Some(pos) = params
                            .iter()
                            .position(|p| p.name.eq_ignore_ascii_case(name))
                        {
                            out.push_str(&sql[last..idx]);
                            out.push_str(&format!("@P{}", pos + 1));
                            last = end;
                            used[pos] = true;
                        } else if !params.is_empty() && is_positional_name(name) {
                            return Err(SqlError::BindingError(format!(
                                "variable @{name} clashes with a positional placeholder"
                            )));
                        }
                        idx = end - 1;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if is_escaped_close(bytes, idx, b'\'') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if is_escaped_close(bytes, idx, b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::Bracketed => {
                if b == b']' {
                    if is_escaped_close(bytes, idx, b']') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
        }
        idx += 1;
    }
    out.push_str(&sql[last..]);

    if let Some(pos) = used.iter().position(|u| !u) {
        return Err(SqlError::BindingError(format!(
            "parameter @{} has no matching placeholder",
            params[pos].name
        )));
    }
    Ok(out)
}
