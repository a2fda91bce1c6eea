// Domain models shared by the pipeline engine and any front-end facing code.
// Nothing in this crate performs I/O.
pub mod catalog;
pub mod models;
pub mod report;
pub mod state;
pub mod utils;
