use chrono::{NaiveDate, NaiveDateTime};
use tiberius::Query;

use crate::translation::PreparedQuery;
use crate::types::{SqlType, TypedValue};

/// Build a tiberius query with every parameter bound positionally (`@P1`, `@P2`, ...).
#[must_use]
pub fn bind_query_params(prepared: &PreparedQuery) -> Query<'_> {
    let mut query = Query::new(prepared.text.as_str());

    for param in &prepared.params {
        match &param.value {
            TypedValue::Text(s) => query.bind(s.as_str()),
            TypedValue::U8(v) => query.bind(*v),
            TypedValue::I16(v) => query.bind(*v),
            TypedValue::I32(v) => query.bind(*v),
            TypedValue::I64(v) => query.bind(*v),
            TypedValue::Bit(v) => query.bind(*v),
            TypedValue::F32(v) => query.bind(*v),
            TypedValue::F64(v) => query.bind(*v),
            TypedValue::DateTime(dt) => query.bind(*dt),
            TypedValue::Date(d) => query.bind(*d),
            TypedValue::Binary(bytes) => query.bind(bytes.as_slice()),
            TypedValue::Null(sql_type) => bind_null(&mut query, *sql_type),
        }
    }

    query
}

// NULLs still go out typed so the server resolves overloads and comparisons the same way.
fn bind_null(query: &mut Query<'_>, sql_type: SqlType) {
    match sql_type {
        SqlType::VarChar
        | SqlType::NVarChar
        | SqlType::Char
        | SqlType::NChar
        | SqlType::Text
        | SqlType::NText
        | SqlType::UniqueIdentifier => query.bind(Option::<&str>::None),
        SqlType::TinyInt => query.bind(Option::<u8>::None),
        SqlType::SmallInt => query.bind(Option::<i16>::None),
        SqlType::Int => query.bind(Option::<i32>::None),
        SqlType::BigInt => query.bind(Option::<i64>::None),
        SqlType::Bit => query.bind(Option::<bool>::None),
        SqlType::Real => query.bind(Option::<f32>::None),
        SqlType::Float | SqlType::Decimal => query.bind(Option::<f64>::None),
        SqlType::DateTime | SqlType::DateTime2 => query.bind(Option::<NaiveDateTime>::None),
        SqlType::Date => query.bind(Option::<NaiveDate>::None),
        SqlType::VarBinary => query.bind(Option::<&[u8]>::None),
    }
}
