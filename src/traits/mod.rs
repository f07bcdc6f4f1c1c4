//! Core traits for the service container.

mod compiler_pass;
mod service;

pub use compiler_pass::CompilerPass;
pub use service::Service;
