//! `routing` lets a recipient without a stable endpoint receive messages through a mediator
//!
//! It covers coordinate-mediation (grant, deny and keylist), the `forward` message and
//! message pickup. A recipient keeps one default mediator, new connections get a key
//! registered in that mediator keylist and the mediator endpoint with its routing keys.
//!
//! ```text
//! recipient: init -> requested -> granted
//!                          \____> denied
//! ```
pub mod types;
pub use types::{
    MediationRecipientAPI, MediationRole, MediationState, MediatorAPI, Routing, RoutingError,
};

pub mod messages;

mod record;
pub use record::{MediationRecord, MediatorRoutingRecord};

mod recipient;
pub use recipient::Usecase as MediationRecipientUsecase;

mod mediator;
pub use mediator::Usecase as MediatorUsecase;

mod pickup;
pub use pickup::{build_pickup_strategy, ImplicitPickup, NoPickup, PickupStrategy, PollingPickup};

mod handler;
pub use handler::{MediationRecipientHandler, MediatorHandler};
