//! Durable records for users, trips and ride requests.

mod sqlite;

pub use sqlite::{Store, StoreError};

pub(crate) use sqlite::{
    is_storable, query_request, query_share, request_columns, request_from_row, share_columns,
    share_from_row, to_db_time, LATEST_DB_TIME, REQUEST_COLUMN_COUNT, SHARE_COLUMN_COUNT,
};
