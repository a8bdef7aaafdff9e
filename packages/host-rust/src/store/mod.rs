//! [`PreferenceStore`](autogrid_core::PreferenceStore) implementations.

mod cookie;
mod memory;

pub use cookie::CookieJar;
pub use memory::MemoryPreferenceStore;
