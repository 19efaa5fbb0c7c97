pub mod fetcher;
pub mod lister;
pub mod pipeline;
pub mod reconciler;
pub mod resolver;
pub mod staging;
pub mod storage;
pub mod transcoder;
