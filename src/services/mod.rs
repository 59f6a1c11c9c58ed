//! Core backup operations: allocating the run directory and mirroring a
//! bucket into it.

pub mod key_path;
pub mod mirror_service;
pub mod run_directory;
