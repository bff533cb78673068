use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{names_match, Entity, EntityId, EntityKind, Query, QueryType};
use crate::common::error::FieldError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interest {
    Enquiry,
    Purchase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub title: String,
    pub value: String,
}

/// A visitor's enquiry or purchase interest for one catalog entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enquiry {
    pub interest: Interest,
    pub contact_name: String,
    pub contact_email: String,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub answers: Vec<QueryAnswer>,
}

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

impl Enquiry {
    /// Every query of the entity needs an answer; number queries need a numeric one.
    pub fn validate_against(&self, queries: &[Query]) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.contact_name.trim().is_empty() {
            errors.push(FieldError::new("contactName", "is required"));
        }
        if !EMAIL.is_match(self.contact_email.trim()) {
            errors.push(FieldError::new("contactEmail", "must be a valid email address"));
        }
        for query in queries {
            let answer = self
                .answers
                .iter()
                .find(|answer| names_match(&answer.title, &query.title))
                .map(|answer| answer.value.trim())
                .filter(|value| !value.is_empty());
            match (answer, query.query_type) {
                (None, _) => errors.push(FieldError::new(
                    format!("answers.{}", query.title),
                    "is required",
                )),
                (Some(value), QueryType::Number) if value.parse::<f64>().is_err() => {
                    errors.push(FieldError::new(
                        format!("answers.{}", query.title),
                        "must be a number",
                    ))
                }
                _ => {}
            }
        }
        errors
    }
}

/// Structured payload handed to the notifier collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnquiryNotification {
    pub reference: Uuid,
    pub interest: Interest,
    pub entity_kind: EntityKind,
    pub entity_id: EntityId,
    pub entity_name: String,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub message: Option<String>,
    pub answers: Vec<QueryAnswer>,
    pub submitted_at: DateTime<Utc>,
}

impl EnquiryNotification {
    pub fn new(entity: &Entity, enquiry: Enquiry) -> Self {
        Self {
            reference: Uuid::new_v4(),
            interest: enquiry.interest,
            entity_kind: entity.kind,
            entity_id: entity.id.clone(),
            entity_name: entity.fields.name.clone(),
            contact_name: enquiry.contact_name.trim().to_string(),
            contact_email: enquiry.contact_email.trim().to_string(),
            contact_phone: enquiry.contact_phone,
            message: enquiry.message,
            answers: enquiry.answers,
            submitted_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnquiryReceipt {
    pub reference: Uuid,
    pub entity_id: EntityId,
}
