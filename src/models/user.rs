use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The role an application account was registered with.
///
/// Roles the client does not know about are preserved verbatim so they
/// round-trip through the cached profile unchanged.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(from = "String", into = "String")]
pub enum Role {
    #[default]
    Teacher,
    Student,
    Parent,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Teacher => "TEACHER",
            Role::Student => "STUDENT",
            Role::Parent => "PARENT",
            Role::Other(s) => s,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "TEACHER" => Role::Teacher,
            "STUDENT" => Role::Student,
            "PARENT" => Role::Parent,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The application's own user profile, as returned by the backend.
/// Fields the client does not model are kept in `attributes`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct AppUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl AppUser {
    pub fn new(name: impl Into<String>, email: Option<String>, role: Option<Role>) -> Self {
        AppUser {
            name: Some(name.into()),
            email,
            role,
            attributes: Map::new(),
        }
    }

    /// The backend's identifier, whichever key and JSON type it arrived as.
    pub fn id(&self) -> Option<String> {
        ["id", "_id"]
            .iter()
            .filter_map(|key| self.attributes.get(*key))
            .find_map(|value| match value {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }
}

/// The federated identity provider's view of a signed-in user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FederatedUser {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

/// Whoever the session currently belongs to.
///
/// `Federated` only appears when the backend exchange did not yield an
/// application profile; consumers should go through the accessors rather
/// than matching on the shape.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum SessionUser {
    // Tried first: it requires `uid` and rejects any field it does not model,
    // so application profiles that happen to carry a `uid` fall through to `App`.
    Federated(FederatedUser),
    App(AppUser),
}

impl SessionUser {
    pub fn display_name(&self) -> Option<&str> {
        match self {
            SessionUser::App(user) => user.name.as_deref().or(user.email.as_deref()),
            SessionUser::Federated(user) => {
                user.display_name.as_deref().or(user.email.as_deref())
            }
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            SessionUser::App(user) => user.email.as_deref(),
            SessionUser::Federated(user) => user.email.as_deref(),
        }
    }

    /// Federated users carry no application role.
    pub fn role(&self) -> Option<&Role> {
        match self {
            SessionUser::App(user) => user.role.as_ref(),
            SessionUser::Federated(_) => None,
        }
    }

    pub fn is_federated(&self) -> bool {
        matches!(self, SessionUser::Federated(_))
    }
}

impl From<AppUser> for SessionUser {
    fn from(user: AppUser) -> Self {
        SessionUser::App(user)
    }
}

impl From<FederatedUser> for SessionUser {
    fn from(user: FederatedUser) -> Self {
        SessionUser::Federated(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cached_profile_parses_as_app_user() {
        let user: SessionUser =
            serde_json::from_value(json!({"name": "Sam", "role": "TEACHER"})).unwrap();
        assert!(!user.is_federated());
        assert_eq!(user.display_name(), Some("Sam"));
        assert_eq!(user.role(), Some(&Role::Teacher));
    }

    #[test]
    fn federated_shape_is_recognised_by_uid() {
        let user: SessionUser = serde_json::from_value(json!({
            "uid": "fb-123",
            "email": "ana@school.edu",
            "displayName": "Ana",
            "photoURL": "https://example.com/a.png",
            "emailVerified": true,
            "providerData": []
        }))
        .unwrap();
        match &user {
            SessionUser::Federated(f) => {
                assert_eq!(f.uid, "fb-123");
                assert_eq!(f.photo_url.as_deref(), Some("https://example.com/a.png"));
                assert!(f.email_verified);
            }
            other => panic!("expected federated user, got {:?}", other),
        }
        assert_eq!(user.role(), None);
        assert_eq!(user.display_name(), Some("Ana"));
    }

    #[test]
    fn unknown_fields_and_roles_survive_round_trip() {
        let raw = json!({"name": "Lee", "role": "ADMIN", "_id": 42, "school": "North"});
        let user: AppUser = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(user.role, Some(Role::Other("ADMIN".to_string())));
        assert_eq!(user.id().as_deref(), Some("42"));
        assert_eq!(serde_json::to_value(&user).unwrap(), raw);
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let user = SessionUser::Federated(FederatedUser {
            uid: "u1".to_string(),
            email: Some("x@school.edu".to_string()),
            ..Default::default()
        });
        assert_eq!(user.display_name(), Some("x@school.edu"));
    }

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!(Role::from("student".to_string()), Role::Student);
        assert_eq!(String::from(Role::Parent), "PARENT");
    }

    #[test]
    fn app_profile_with_uid_stays_an_app_user() {
        let raw = r#"{"name":"Sam","role":"TEACHER","uid":"fb-1"}"#;
        let user: SessionUser = serde_json::from_str(raw).unwrap();

        assert!(!user.is_federated());
        assert_eq!(user.display_name(), Some("Sam"));
        assert_eq!(user.role(), Some(&Role::Teacher));
        let back: Value = serde_json::to_value(&user).unwrap();
        assert_eq!(back, serde_json::from_str::<Value>(raw).unwrap());
    }

    #[test]
    fn federated_profile_round_trips() {
        let federated = FederatedUser {
            uid: "fb-1".to_string(),
            display_name: Some("Ana".to_string()),
            photo_url: Some("https://img.example/ana.png".to_string()),
            ..Default::default()
        };
        let raw = serde_json::to_string(&SessionUser::from(federated.clone())).unwrap();
        let back: SessionUser = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, SessionUser::Federated(federated));
    }
}
