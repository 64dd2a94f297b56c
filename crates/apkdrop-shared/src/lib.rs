//! # apkdrop-shared
//!
//! Domain types and pure helpers shared by the apkdrop services: the
//! persisted JSON documents, filename version inference, human-readable
//! size/view formatting, and the line formats of the download and audit logs.
//!
//! Nothing in this crate touches the filesystem or the network.

pub mod constants;
pub mod error;
pub mod format;
pub mod logline;
pub mod types;
pub mod version;

pub use error::SharedError;
