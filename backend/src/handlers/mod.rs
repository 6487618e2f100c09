//! Route handlers, grouped by resource. Every handler returns
//! `Result<_, AppError>`; access checks happen through the `auth` extractors.

pub mod accounts;
pub mod admin;
pub mod catalog;
pub mod collections;
pub mod documents;
