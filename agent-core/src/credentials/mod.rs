//! `credentials` implements issue-credential 1.0
//!
//! ```text
//! holder                                   issuer
//! proposal-sent      --propose-credential-->  proposal-received
//! offer-received     <--offer-credential----  offer-sent
//! request-sent       --request-credential-->  request-received
//! credential-received <--issue-credential---  credential-issued
//! done               --ack----------------->  done
//! ```
//!
//! Either side may start the thread, a proposal or an offer can be answered by the other
//! kind to negotiate. Any `*-received` state can be declined.
pub mod types;
pub use types::{
    AcceptOfferConfig, AcceptProposalConfig, CredentialAPI, CredentialError, CredentialState,
    OfferCredentialConfig, ProposeCredentialConfig,
};

pub mod encoding;

pub mod messages;

mod preview;
pub use preview::{CredentialPreview, CredentialPreviewAttribute, CREDENTIAL_PREVIEW};

mod record;
pub use record::CredentialExchangeRecord;

mod usecase;
pub use usecase::Usecase as CredentialUsecase;

mod handler;
pub use handler::CredentialHandler;
