//! The book record.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// A book as stored in the record store and exchanged over HTTP.
///
/// `name` is the lookup key but is not unique. Optional fields that are
/// absent are left out of both the JSON and the stored document. Unknown
/// fields, including the store's `_id`, are ignored on the way in.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Book {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl Book {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Presence check: the lookup key must not be blank.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::InvalidRequest);
        }
        Ok(())
    }

    /// Copies every field that is set on `other` onto `self`.
    pub fn merge_from(&mut self, other: &Book) {
        self.name.clone_from(&other.name);
        if other.author.is_some() {
            self.author.clone_from(&other.author);
        }
        if other.year.is_some() {
            self.year = other.year;
        }
        if other.publisher.is_some() {
            self.publisher.clone_from(&other.publisher);
        }
        if other.price.is_some() {
            self.price = other.price;
        }
    }
}
