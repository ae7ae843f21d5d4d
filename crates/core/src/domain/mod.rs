pub mod chat;
pub mod movie;
pub mod poll;
