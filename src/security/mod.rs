//! Security module for leetbot.
//!
//! Admin commands are gated by a single shared credential, supplied as the
//! first argument of the command and verified here.

mod password;

pub use password::AdminCredential;
