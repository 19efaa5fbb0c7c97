pub mod keys;
pub mod timeout;
