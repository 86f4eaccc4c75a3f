use serde::{Deserialize, Serialize};

/// A user account as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: String,
    pub avatar: String,
    /// The demo backend echoes the password back on reads; optional so
    /// persisted sessions can omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ApiUser {
    /// Whether this account has the admin role.
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case("admin")
    }
}

/// Payload for creating a user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub avatar: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Partial update of a user; unset fields are left untouched by the server.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_response() {
        let json = r#"{
            "id": 1,
            "email": "admin@mail.com",
            "password": "admin123",
            "name": "Admin",
            "role": "admin",
            "avatar": "https://i.imgur.com/LDOO4Qs.jpg",
            "creationAt": "2025-01-07T10:20:30.000Z",
            "updatedAt": "2025-01-07T10:20:30.000Z"
        }"#;

        let user: ApiUser = serde_json::from_str(json).expect("Failed to parse user JSON");
        assert_eq!(user.id, 1);
        assert_eq!(user.email, "admin@mail.com");
        assert!(user.is_admin());
        assert_eq!(user.creation_at.as_deref(), Some("2025-01-07T10:20:30.000Z"));
    }

    #[test]
    fn test_is_admin_is_case_insensitive() {
        let json = r#"{"id":2,"email":"c@mail.com","name":"C","role":"Customer","avatar":""}"#;
        let user: ApiUser = serde_json::from_str(json).expect("Failed to parse user JSON");
        assert!(!user.is_admin());
    }

    #[test]
    fn test_user_update_serializes_only_set_fields() {
        let update = UserUpdate {
            name: Some("New Name".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).expect("Failed to serialize update");
        assert_eq!(json, serde_json::json!({"name": "New Name"}));
    }
}
