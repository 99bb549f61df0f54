pub mod decoded_message;
pub mod filter;

pub use decoded_message::DecodedMessage;
pub use filter::SubjectFilter;
