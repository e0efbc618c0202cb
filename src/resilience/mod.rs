pub mod timeout;

pub use timeout::ProviderTimeoutExt;
