//! `discover_features` implements discover-features 1.0, a peer asks which protocols this
//! agent handles and gets back the ones matching its query
pub mod types;
pub use types::{DiscoverFeaturesAPI, DiscoverFeaturesError};

pub mod messages;
pub use messages::{FeatureDisclose, FeatureMessage, FeatureQuery, ProtocolDescriptor};

mod usecase;
pub use usecase::Usecase as DiscoverFeaturesUsecase;

mod handler;
pub use handler::DiscoverFeaturesHandler;
