//! Authentication and session verification.
//!
//! Two pieces, strictly layered:
//!
//! - the credential service ([`password`], [`token`]): pure functions over
//!   input bytes plus the server secret — password hashing/verification and
//!   session token issuance/verification. No I/O of its own.
//! - the request gate ([`gate`]): per-request middleware that reads the
//!   session cookie, resolves the [`principal::Principal`] through the
//!   store, and enforces the configured protected-route table ahead of all
//!   handlers.
//!
//! A token that fails signature, expiry, or parsing is treated exactly like
//! no token at all: the request continues as anonymous and the route table
//! decides what that means. Only the route table and handler-level
//! [`role::Role`] checks ever reject a request.

pub mod cookies;
pub mod gate;
pub mod password;
pub mod principal;
pub mod role;
pub mod token;
