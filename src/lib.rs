#![doc = "The `taskhub` library crate."]
#![doc = ""]
#![doc = "This crate contains the authentication and session-lifecycle core of the"]
#![doc = "TaskHub application: the signed access-token codec, the rotating"]
#![doc = "refresh-token store, the session manager orchestrating both, and the"]
#![doc = "principal-resolver middleware, together with configuration, error handling"]
#![doc = "and the HTTP auth surface. It is used by the main binary (`main.rs`) to"]
#![doc = "construct and run the application."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod session;
pub mod store;
