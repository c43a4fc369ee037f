pub mod backends;
pub mod chat;
pub mod commands_cmd;
pub mod config_cmd;
pub mod doctor;
pub mod onboard;
pub mod status;
