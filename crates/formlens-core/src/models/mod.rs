//! Data models: configuration, raw layout payloads, and the form output contract.

pub mod config;
pub mod form;
pub mod layout;
