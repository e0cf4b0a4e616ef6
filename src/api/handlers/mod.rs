//! Route handlers for the user account management API.
//!
//! `users` is the endpoint set proper; `auth` owns sign-in/sign-up/logout
//! and the admin gate; `envelope` is the shared response shape.

pub mod auth;
pub mod envelope;
pub mod health;
pub mod users;
