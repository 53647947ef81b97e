//! # Formats Module
//!
//! File formats crossing the portal boundary:
//! - client uploads (CSV or XLSX) parsed into [`ClientRecord`](crate::ClientRecord)s
//! - CSV exports of the admin registration views
//!
//! Note: file I/O stays in the app layer. This module only converts bytes.

mod export;
mod upload;

pub use export::*;
pub use upload::*;
