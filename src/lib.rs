//! CFLP
//!
//! Formulates capacitated facility location problems as mixed-integer linear programs,
//! hands them to an off-the-shelf MILP backend, and decodes the result into a verified
//! plan of open warehouses and shipments.
//!
//! ```rust,no_run
//! use cflp::prelude::*;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let loaded = load_file("fixtures/toy.dat")?;
//! let outcome = solve(&loaded, &RunConfig::default())?;
//!
//! println!("{}", Report::new(&loaded.instance, &outcome.solution).summary_line());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constraints;
pub mod instance;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod prelude;
pub mod prep;
pub mod report;
pub mod solution;
pub mod solvers;
