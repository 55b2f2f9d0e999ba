use serde::{Deserialize, Serialize};

/// Authenticated session as seen by the client.
///
/// `token` being present is the only definition of "logged in"; the flag is
/// derived on every read and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: Option<String>,
    pub user_id: Option<i64>,
    pub user_email: Option<String>,
    pub is_admin: Option<bool>,
}

impl Session {
    pub fn new(token: String, user_id: i64, user_email: String, is_admin: Option<bool>) -> Self {
        Self {
            token: Some(token),
            user_id: Some(user_id),
            user_email: Some(user_email),
            is_admin,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    /// Admin flag, only meaningful while logged in.
    pub fn is_admin(&self) -> bool {
        self.is_logged_in() && self.is_admin.unwrap_or(false)
    }
}
