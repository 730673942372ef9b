pub mod common;
mod pg_source_tests;
