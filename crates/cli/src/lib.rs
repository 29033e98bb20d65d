//! Request handlers and exit codes for the `tabsight` binary.

pub mod api;
pub mod exit_codes;
