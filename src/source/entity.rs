use serde::{Deserialize, Deserializer};

/// Person record returned by the entity detail endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityDetails {
    #[serde(deserialize_with = "nullable_string")]
    pub id: String,
    #[serde(deserialize_with = "nullable_string")]
    pub first_name: String,
    #[serde(deserialize_with = "nullable_string")]
    pub last_name: String,
    #[serde(deserialize_with = "nullable_string")]
    pub email_address: String,
    #[serde(deserialize_with = "nullable_string")]
    pub role: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(deserialize_with = "nullable_vec")]
    pub associated_clients: Vec<AssociatedClient>,
    #[serde(deserialize_with = "nullable_vec")]
    pub engagements: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssociatedClient {
    pub client_id: i64,
    #[serde(deserialize_with = "nullable_string")]
    pub role: String,
    /// `None` when the source omits the list; such clients are not forwarded.
    pub engagement_ids: Option<Vec<String>>,
}

impl EntityDetails {
    /// Names of required fields that are empty; empty result means the record is usable.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        [
            ("id", &self.id),
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("emailAddress", &self.email_address),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

fn default_active() -> bool {
    true
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
