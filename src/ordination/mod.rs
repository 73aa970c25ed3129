//! Ordination of selected taxa.

pub mod ca;

pub use ca::{angular_order, correspondence_analysis, svd_rank, CaResult, Scaling};
