pub mod address;
pub mod gate;

pub use address::{AddressResolver, HttpAddressResolver};
pub use gate::{CommandGate, NetworkGate};
