// src/lib.rs
//! Change detection and webhook sync for an editable grid backed by SQLite
//! or a JSON workbook.

pub mod cli;
pub mod settings;
pub mod sheets;
