//! Authentication snippets
//!
//! Application Default Credentials, API keys, service account impersonation,
//! ID tokens and workload identity federation with a custom subject token
//! supplier.

pub mod adc;
pub mod api_key;
pub mod external_account;
pub mod id_token;
pub mod impersonation;
pub mod okta;

pub use external_account::{
    ExternalAccountCredentials, ExternalAccountOptions, SubjectTokenSupplier,
};
pub use okta::OktaClientCredentialsSupplier;
