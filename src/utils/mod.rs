pub mod headers;
pub mod paths;
