use secrecy::SecretString;

/// Shared runtime configuration injected into handlers via `Extension`.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub session_ttl_seconds: i64,
    pub admin_email: Option<String>,
    pub admin_password: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(session_ttl_seconds: i64) -> Self {
        Self {
            session_ttl_seconds,
            admin_email: None,
            admin_password: SecretString::default(),
        }
    }

    pub fn set_admin(&mut self, email: String, password: SecretString) {
        self.admin_email = Some(email);
        self.admin_password = password;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(86400);
        assert_eq!(args.session_ttl_seconds, 86400);
        assert_eq!(args.admin_email, None);
        assert_eq!(args.admin_password.expose_secret(), "");
    }

    #[test]
    fn test_set_admin() {
        let mut args = GlobalArgs::new(60);
        args.set_admin("ops@roster.fyi".to_string(), SecretString::from("secret"));
        assert_eq!(args.admin_email.as_deref(), Some("ops@roster.fyi"));
        assert_eq!(args.admin_password.expose_secret(), "secret");
    }
}
