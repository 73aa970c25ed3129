//! Compositional transforms.
//!
//! - **TSS**: Total sum scaling to relative abundances
//! - **CLR**: Centered log-ratio transformation

pub mod clr;
pub mod tss;

pub use clr::{clr_matrix, to_clr, CLR_PSEUDOCOUNT};
pub use tss::{relative_abundance_matrix, to_relative_abundance};
