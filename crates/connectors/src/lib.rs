pub mod gate;
pub mod http;
pub mod saas;
pub mod wiring;

pub use gate::client::{GateClient, GateClientConfig};
pub use saas::client::{SaasClient, SaasClientConfig};
