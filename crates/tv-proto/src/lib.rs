pub mod catalog;
pub mod config;
pub mod favorites;
pub mod groups;
pub mod locale;
pub mod pagination;
pub mod platform;
pub mod protocol;
pub mod quick_select;
pub mod state;
