pub mod common;
pub mod fakes;
