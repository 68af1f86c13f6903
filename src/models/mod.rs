//! Content models: the closed set of site resources and their field schemas.

mod resource;

pub use resource::*;
