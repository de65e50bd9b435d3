//! `messaging` is the DIDComm plaintext message model
//!
//! Messages travel as [`AgentMessage`] envelopes. Each protocol defines typed bodies
//! implementing [`MessageBody`] and a tagged enum decoded from the envelope, keyed by the
//! `(protocol, version, name)` triple parsed into a [`MessageType`].
pub mod types;
pub use types::MessageError;

mod message_type;
pub use message_type::{MessageType, DIDCOMM_DOC_URI};

mod decorators;
pub use decorators::{ReturnRoute, ServiceDecorator, ThreadDecorator, TransportDecorator};

mod attachment;
pub use attachment::{Attachment, AttachmentData};

mod message;
pub use message::{AgentMessage, MessageBody};

mod problem_report;
pub use problem_report::{
    Ack, AckStatus, ProblemDescription, ProblemReport, NOTIFICATION_ACK, NOTIFICATION_PROBLEM_REPORT,
};
