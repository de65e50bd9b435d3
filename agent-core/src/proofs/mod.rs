//! `proofs` implements present-proof 1.0
//!
//! ```text
//! prover                                          verifier
//! proposal-sent        --propose-presentation-->  proposal-received
//! request-received     <--request-presentation--  request-sent
//! presentation-sent    --presentation---------->  presentation-received
//! done                 <--ack-------------------  done
//! ```
//!
//! A verifier may also start with a request, connection-less when the request carries a
//! `~service` decorator.
pub mod types;
pub use types::{
    AcceptProposalConfig, ProofAPI, ProofError, ProofState, ProposeProofConfig,
    RequestProofConfig,
};

pub mod messages;

mod preview;
pub use preview::{
    PresentationPreview, PresentationPreviewAttribute, PresentationPreviewPredicate,
    PRESENTATION_PREVIEW,
};

pub mod selection;
pub use selection::RetrievedCredentials;

mod record;
pub use record::ProofRecord;

mod usecase;
pub use usecase::Usecase as ProofUsecase;

mod handler;
pub use handler::ProofHandler;
