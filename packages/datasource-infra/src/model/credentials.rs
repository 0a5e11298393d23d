use std::fmt;

/// A user/password pair together with the datasource class it applies to.
#[derive(Clone, PartialEq, Eq)]
pub struct DbCredentials {
    user: String,
    password: String,
    class_name: String,
}

impl DbCredentials {
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        class_name: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            class_name: class_name.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Exact match on both fields.
    pub fn matches(&self, user: &str, password: &str) -> bool {
        self.user == user && self.password == password
    }
}

impl fmt::Debug for DbCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbCredentials")
            .field("user", &self.user)
            .field("password", &"***")
            .field("class_name", &self.class_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let creds = DbCredentials::new("alice", "hunter2", "embedded-client");
        let shown = format!("{creds:?}");

        assert!(shown.contains("alice"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn test_matches_is_exact() {
        let creds = DbCredentials::new("alice", "pw", "embedded-client");
        assert!(creds.matches("alice", "pw"));
        assert!(!creds.matches("Alice", "pw"));
        assert!(!creds.matches("alice", "pw "));
    }
}
