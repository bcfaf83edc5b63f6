#![doc = include_str!("../README.md")]

pub mod cli;
pub mod consensus;
pub mod error;
pub mod matrix;
pub mod partition;
pub mod plateau;
pub mod run;
pub mod scan;
pub mod table;
pub mod utils;

#[doc(inline)]
pub use crate::cli::Cli;
#[doc(inline)]
pub use crate::consensus::Consensus;
#[doc(inline)]
pub use crate::error::{Diagnostic, Error};
#[doc(inline)]
pub use crate::matrix::SupportMatrix;
#[doc(inline)]
pub use crate::partition::{MissingPolicy, Partition};
#[doc(inline)]
pub use crate::run::{run, RunArgs};
#[doc(inline)]
pub use crate::scan::Curve;
#[doc(inline)]
pub use crate::table::Table;
