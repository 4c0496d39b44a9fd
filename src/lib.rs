//! Pouch Quote
//!
//! Pouch Quote is a film usage and pricing engine for printed flexible packaging. It turns a raw
//! request into a normalized specification, works out how many pouches the film yields per metre,
//! plans the film length per SKU and composes a costed quote from a versioned pricing table.
//! Batch comparisons, economic quantity suggestions and parallel production options build on the
//! same pipeline.

pub mod advisor;
pub mod batch;
pub mod cli;
pub mod consistency;
pub mod costs;
pub mod fixtures;
pub mod length;
pub mod logging;
pub mod money;
pub mod parallel;
pub mod prelude;
pub mod quote;
pub mod report;
pub mod request;
pub mod specification;
pub mod tables;
pub mod worker;
pub mod yields;
