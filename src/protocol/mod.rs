pub mod canonical;
pub mod driver;
pub(crate) mod error_shapes;
pub mod openai_chat;
