mod result_set;
mod row;

pub use result_set::{ResultSet, ResultSetBuilder};
pub use row::CustomDbRow;
