// Source readers, output writers and the in-memory store of the latest run.
pub mod csv_parser;
pub mod run_store;
pub mod sheets_export;
pub mod table;
pub mod writer;
