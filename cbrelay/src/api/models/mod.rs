//! API request and response data models.
//!
//! - [`callbacks`]: callback bodies from the workflow engine and their normalisation
//! - [`results`]: poll query parameters and responses

pub mod callbacks;
pub mod results;
