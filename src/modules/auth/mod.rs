pub mod accounts;
pub mod oauth;
pub mod store;

pub use accounts::{AccountInfo, AccountManager};
pub use store::CredentialStore;
