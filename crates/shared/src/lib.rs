pub mod domain;
pub mod error;
pub mod openapi;
pub mod protocol;
