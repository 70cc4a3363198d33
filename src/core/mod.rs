pub mod enroll;
pub mod identify;
pub mod registry;
pub mod station;

pub use enroll::{enroll, EnrollError, EnrollOptions, EnrollPrompt};
pub use identify::{identify, IdentificationOutcome};
pub use registry::{Registry, RegistryError, VoterDetails, VoterRecord};
pub use station::{Confirmation, ConfirmError, RegistryStats, ResetError, VotingStation};
