use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Government organization. Routing tags restrict which document types its
/// officers may verify or issue; an empty tag list means unrestricted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub org_type: String,
    pub code: String,
    pub tier: i32,
    pub routing_tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(
        name: String,
        org_type: String,
        code: String,
        tier: i32,
        routing_tags: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            org_type: org_type.trim().to_string(),
            code: code.trim().to_uppercase(),
            tier,
            routing_tags: routing_tags
                .into_iter()
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect(),
            created_at: Utc::now(),
        }
    }

    pub fn handles(&self, doc_type: &str) -> bool {
        self.routing_tags.is_empty()
            || self
                .routing_tags
                .iter()
                .any(|tag| tag.eq_ignore_ascii_case(doc_type.trim()))
    }
}
