//! Maps entity details onto the directory's create-or-update document.

use crate::source::EntityDetails;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPayload {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    pub role: String,
    /// The directory expects the literal string `"true"`.
    pub active: String,
    pub associated_clients: Vec<i64>,
    pub engagements: Vec<EngagementRef>,
}

/// Engagement ids are forwarded as numbers when they parse as one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EngagementRef {
    Numeric(i64),
    Text(String),
}

impl EngagementRef {
    fn from_raw(raw: &str) -> Self {
        let raw = raw.trim();
        raw.parse()
            .map(EngagementRef::Numeric)
            .unwrap_or_else(|_| EngagementRef::Text(raw.to_owned()))
    }
}

/// Replaces characters the directory cannot store: `"` becomes `'`, `\`
/// becomes `/`, and line breaks become spaces.
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|ch| match ch {
            '"' => '\'',
            '\\' => '/',
            '\r' | '\n' => ' ',
            other => other,
        })
        .collect()
}

pub fn build_payload(details: &EntityDetails) -> EntityPayload {
    let mut associated_clients = Vec::new();
    let mut engagements = Vec::new();
    let mut role = String::new();

    for (index, client) in details.associated_clients.iter().enumerate() {
        let Some(engagement_ids) = client.engagement_ids.as_ref() else {
            continue;
        };
        if client.client_id == 0 {
            continue;
        }

        associated_clients.push(client.client_id);
        if index == 0 && !client.role.is_empty() {
            role = client.role.clone();
        }
        engagements.extend(
            engagement_ids
                .iter()
                .filter(|id| !id.trim().is_empty())
                .map(|id| EngagementRef::from_raw(id)),
        );
    }

    EntityPayload {
        id: details.id.clone(),
        first_name: sanitize(&details.first_name),
        last_name: sanitize(&details.last_name),
        email_address: details.email_address.clone(),
        role,
        active: "true".to_owned(),
        associated_clients,
        engagements,
    }
}
