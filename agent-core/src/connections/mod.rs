//! `connections` implements the DIDComm connection protocol (RFC 0160)
//!
//! An inviter publishes an invitation, the invitee answers with a request carrying its DID
//! document, the inviter answers with a response signed by the invitation key and a trust
//! ping completes the exchange on both sides.
//!
//! ```text
//! invited -> requested -> responded -> complete
//!     \__________\____________\______> abandoned
//! ```
pub mod types;
pub use types::{
    ConnectionAPI, ConnectionError, ConnectionRole, ConnectionState, CreateInvitationConfig,
    ReceiveInvitationConfig,
};

pub mod did_doc;
pub use did_doc::{DidCommService, DidDoc, PublicKey};

pub mod messages;
pub use messages::{
    ConnectionInvitation, ConnectionMessage, ConnectionPayload, ConnectionRequest,
    ConnectionResponse, TrustPing, TrustPingResponse,
};

mod record;
pub use record::ConnectionRecord;

mod signature;
pub use signature::{sign_data, unpack_and_verify, SignatureDecorator};

mod usecase;
pub use usecase::Usecase as ConnectionUsecase;

mod handler;
pub use handler::ConnectionHandler;
