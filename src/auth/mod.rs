//! Local, advisory authorization.
//!
//! - [`claims`]: Decodes bearer-token payloads without verifying them
//! - [`gate`]: Role requirements and the page route guard
//!
//! Decoding a token successfully is not authentication. Only the backend's
//! acceptance of a token is authoritative; these checks exist so the UI does not
//! offer actions the user is obviously not allowed to take.

pub mod claims;
pub mod gate;

pub use claims::{ClaimDecoder, DecodeError, ROLE_CLAIM, TokenClaims};
pub use gate::{Access, RoleRequirement, check_access};
