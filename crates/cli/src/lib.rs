//! Command-line front end for the deck auditor.
pub mod args;
pub mod commands;
