//! `basic_messages` implements the basicmessage protocol, plain text sent over a connection
pub mod types;
pub use types::{BasicMessageAPI, BasicMessageError, BasicMessageRole};

mod messages;
pub use messages::{BasicMessage, BASIC_MESSAGE};

mod record;
pub use record::BasicMessageRecord;

mod usecase;
pub use usecase::Usecase as BasicMessageUsecase;

mod handler;
pub use handler::BasicMessageHandler;
