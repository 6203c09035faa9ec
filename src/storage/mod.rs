pub mod curation;
pub mod db;
pub mod error;
pub mod operations;
pub(crate) mod schema;
pub mod stations;
