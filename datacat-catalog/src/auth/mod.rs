//! Authentication and authorization

pub mod acl;
pub mod filter;
pub mod session;

pub use acl::AclResolver;
pub use filter::ResultFilter;
pub use session::SessionAuthenticator;
