pub mod mongo;
pub mod response;
pub mod summary_record;
pub mod summary_store;
