//! # bmi-wire
//!
//! Types exchanged between the einstein service and its clients.
//!
//! A request is a [`Credentials`] pair and one [`Command`], flattened into an
//! [`ExecuteRequest`] for `POST /v1/execute`.

mod command;
mod credentials;
mod request;

pub use command::Command;
pub use credentials::{BasicAuth, Credentials, CredentialsError};
pub use request::ExecuteRequest;
