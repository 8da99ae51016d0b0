pub mod args;
pub mod context;
pub mod handlers;
