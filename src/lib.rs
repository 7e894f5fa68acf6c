// src/lib.rs — Library root for avatar-studio

pub mod api;
pub mod auth;
pub mod avatars;
pub mod cli;
pub mod infra;
pub mod knowledge;
pub mod provider;
pub mod session;
pub mod util;
