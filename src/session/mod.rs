//! HTTP session management.

pub mod binding;
pub mod registry;

pub use binding::SessionBinding;
pub use registry::SessionRegistry;
