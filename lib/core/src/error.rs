//! Result alias shared by the runner crates.
//!
//! Errors are domain enums wrapped in a rootcause `Report`; the client crate
//! owns `ClientError`, the runner binary converts reports at its edge.

use rootcause::Report;

/// `Result` carrying a rootcause report over the context `C`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
