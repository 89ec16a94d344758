pub mod config_cmd;
pub mod demo;
pub mod status;
pub mod validate;
