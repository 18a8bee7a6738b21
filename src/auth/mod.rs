//! Authentication
//!
//! Handles:
//! - Access/refresh JWT pairs
//! - Password hashing
//! - Request extractors

mod middleware;
mod password;
pub mod token;

pub use middleware::{ACCESS_TOKEN_COOKIE, CurrentUser, MaybeUser, REFRESH_TOKEN_COOKIE};
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenPair, issue_token_pair, verify_refresh_token};
