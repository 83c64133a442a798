#![allow(ambiguous_glob_reexports)]

pub mod initialize;
pub mod request;
pub mod fulfill;
pub mod request_status;
pub mod update_config;

pub use initialize::*;
pub use request::*;
pub use fulfill::*;
pub use request_status::*;
pub use update_config::*;
