mod collection;
mod data_store;

pub use data_store::DataStore;
pub(crate) use data_store::Cached;
