pub mod alert;
pub mod auth;
pub mod code;
pub mod location;
pub mod parent;
pub mod settings;
