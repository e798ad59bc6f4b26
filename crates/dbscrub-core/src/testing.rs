//! Scriptable in-memory [`SqlExecutor`] for tests.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::{SqlError, SqlResult};
use crate::executor::{SqlExecutor, SqlRow, SqlValue};

/// Canned answer for a matching statement.
#[derive(Debug, Clone)]
pub enum Response {
    Affected(u64),
    Value(SqlValue),
    Rows(Vec<SqlRow>),
    Fail(SqlError),
    /// Never completes, like a statement stuck behind a lock.
    Pending,
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Contains(String),
}

impl Matcher {
    fn matches(&self, sql: &str) -> bool {
        match self {
            Matcher::Exact(expected) => sql == expected,
            Matcher::Contains(needle) => sql.contains(needle.as_str()),
        }
    }

    fn is_exact(&self) -> bool {
        matches!(self, Matcher::Exact(_))
    }
}

#[derive(Debug)]
struct Rule {
    matcher: Matcher,
    response: Response,
    remaining: Option<usize>,
}

/// Records every statement and answers from scripted rules.
///
/// Exact rules win over substring rules; among rules of the same kind the
/// most recently added one wins. Unmatched statements succeed with zero
/// affected rows, a scalar `0` or no rows.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    rules: Mutex<Vec<Rule>>,
    statements: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every statement containing `needle`.
    pub fn on(&self, needle: impl Into<String>, response: Response) -> &Self {
        self.push(Matcher::Contains(needle.into()), response, None)
    }

    /// Answer statements equal to `sql`.
    pub fn on_exact(&self, sql: impl Into<String>, response: Response) -> &Self {
        self.push(Matcher::Exact(sql.into()), response, None)
    }

    /// Answer only the next statement containing `needle`.
    pub fn once(&self, needle: impl Into<String>, response: Response) -> &Self {
        self.push(Matcher::Contains(needle.into()), response, Some(1))
    }

    fn push(&self, matcher: Matcher, response: Response, remaining: Option<usize>) -> &Self {
        self.rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Rule {
                matcher,
                response,
                remaining,
            });
        self
    }

    /// Every statement seen so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn statements_containing(&self, needle: &str) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|sql| sql.contains(needle))
            .collect()
    }

    /// Statements that would change schema or data.
    pub fn mutating_statements(&self) -> Vec<String> {
        const VERBS: [&str; 6] = ["ALTER", "CREATE", "DROP", "UPDATE", "DELETE", "INSERT"];
        self.statements()
            .into_iter()
            .filter(|sql| {
                let head = sql.trim_start().to_uppercase();
                VERBS.iter().any(|verb| head.starts_with(verb))
            })
            .collect()
    }

    fn respond(&self, sql: &str) -> Option<Response> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sql.to_string());

        let mut rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        let position = rules
            .iter()
            .rposition(|rule| rule.matcher.is_exact() && rule.matcher.matches(sql))
            .or_else(|| rules.iter().rposition(|rule| rule.matcher.matches(sql)))?;

        let rule = &mut rules[position];
        let response = rule.response.clone();
        if let Some(remaining) = rule.remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                rules.remove(position);
            }
        }
        Some(response)
    }
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    async fn execute(&self, sql: &str, _params: &[SqlValue]) -> SqlResult<u64> {
        match self.respond(sql) {
            None => Ok(0),
            Some(Response::Affected(rows)) => Ok(rows),
            Some(Response::Value(value)) => Ok(value.as_i64().unwrap_or(0).max(0) as u64),
            Some(Response::Rows(rows)) => Ok(rows.len() as u64),
            Some(Response::Fail(err)) => Err(err),
            Some(Response::Pending) => std::future::pending().await,
        }
    }

    async fn query_scalar(&self, sql: &str, _params: &[SqlValue]) -> SqlResult<SqlValue> {
        match self.respond(sql) {
            None => Ok(SqlValue::Int(0)),
            Some(Response::Affected(rows)) => Ok(SqlValue::Int(rows as i64)),
            Some(Response::Value(value)) => Ok(value),
            Some(Response::Rows(rows)) => Ok(rows
                .first()
                .and_then(|row| row.first())
                .cloned()
                .unwrap_or(SqlValue::Null)),
            Some(Response::Fail(err)) => Err(err),
            Some(Response::Pending) => std::future::pending().await,
        }
    }

    async fn query_rows(&self, sql: &str, _params: &[SqlValue]) -> SqlResult<Vec<SqlRow>> {
        match self.respond(sql) {
            None => Ok(Vec::new()),
            Some(Response::Rows(rows)) => Ok(rows),
            Some(Response::Value(value)) => Ok(vec![vec![value]]),
            Some(Response::Affected(_)) => Ok(Vec::new()),
            Some(Response::Fail(err)) => Err(err),
            Some(Response::Pending) => std::future::pending().await,
        }
    }
}
