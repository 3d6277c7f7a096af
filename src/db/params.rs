//! Parameter binding for database queries.
//!
//! Binds `QueryParam` values onto database-specific query objects. Shared by
//! pool-level execution and execution inside a routed transaction.

use crate::models::QueryParam;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::{MySql, Postgres, Sqlite};

pub(crate) fn bind_mysql_params<'q>(
    mut query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    params: &'q [QueryParam],
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            QueryParam::Bytes(v) => query.bind(v.as_slice()),
        };
    }
    query
}

pub(crate) fn bind_postgres_params<'q>(
    mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
    params: &'q [QueryParam],
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            QueryParam::Bytes(v) => query.bind(v.as_slice()),
        };
    }
    query
}

pub(crate) fn bind_sqlite_params<'q>(
    mut query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [QueryParam],
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            QueryParam::Bytes(v) => query.bind(v.as_slice()),
        };
    }
    query
}
