//! Persistence contracts for the administrator and customer directories,
//! with Postgres implementations.
//!
//! The traits are the seams the core is tested through; the `Pg*` types are
//! the production implementations.

pub mod admins;
pub mod customers;
