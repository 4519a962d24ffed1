//! Typed lookup against the public person directory.
//!
//! A small worked example of the unary path: an absolute URL that bypasses
//! the configured base, a query parameter, and a typed JSON body.

use serde::{Deserialize, Serialize};

use crate::api::request::{ClientOptions, RequestSpec};
use crate::client::Client;
use crate::error::ClientError;

/// Public person directory endpoint.
pub const PERSON_ENDPOINT: &str = "https://api.example.com/person";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub name: String,
    pub age: u32,
    pub sex: String,
}

impl Client {
    /// Look up a person by name in the public directory.
    pub async fn fetch_person(&self, name: &str) -> Result<Person, ClientError> {
        self.fetch_person_at(PERSON_ENDPOINT, name).await
    }

    /// Look up a person by name at a specific endpoint.
    pub async fn fetch_person_at(&self, endpoint: &str, name: &str) -> Result<Person, ClientError> {
        let spec = RequestSpec::new().query("name", name);
        self.get_json(endpoint, &spec, &ClientOptions::default()).await
    }
}
