use std::fmt;

use serde::{Deserialize, Serialize};

use super::user::{AppUser, Role};

/// Body of `POST /auth/login`.
#[derive(Serialize, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /auth/register`.
#[derive(Serialize, Clone)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl RegisterRequest {
    /// New accounts are teachers unless stated otherwise.
    pub fn teacher(name: String, email: String, password: String) -> Self {
        RegisterRequest {
            name,
            email,
            password,
            role: Role::Teacher,
        }
    }
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// Body of `POST /auth/google`.
#[derive(Serialize, Debug, Clone)]
pub struct IdTokenExchangeRequest {
    #[serde(rename = "idToken")]
    pub id_token: String,
}

/// A successful login or registration.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct AuthResponse {
    pub token: String,
    pub user: AppUser,
}

/// The federated exchange may legitimately omit either field.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ExchangeResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<AppUser>,
}

/// Error payload the backend sends alongside non-2xx statuses.
#[derive(Deserialize, Debug, Default)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exchange_request_uses_camel_case_key() {
        let body = IdTokenExchangeRequest {
            id_token: "fed-token".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"idToken": "fed-token"})
        );
    }

    #[test]
    fn register_request_serializes_role() {
        let body = RegisterRequest::teacher(
            "Lee".to_string(),
            "lee@school.edu".to_string(),
            "pw".to_string(),
        );
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"name": "Lee", "email": "lee@school.edu", "password": "pw", "role": "TEACHER"})
        );
    }

    #[test]
    fn debug_output_hides_password() {
        let body = LoginRequest {
            email: "a@b.c".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{:?}", body).contains("hunter2"));
    }

    #[test]
    fn exchange_response_tolerates_missing_fields() {
        let res: ExchangeResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(res, ExchangeResponse::default());
    }
}
