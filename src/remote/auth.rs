use crate::models::UserProfile;

/// Reports who is signed in.
pub trait AuthProvider: Send + Sync {
    fn current_user(&self) -> Option<UserProfile>;
}

/// Auth provider with a fixed user, or none when signed out.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    user: Option<UserProfile>,
}

impl StaticAuth {
    pub fn signed_in(user: UserProfile) -> Self {
        Self { user: Some(user) }
    }

    pub fn signed_out() -> Self {
        Self { user: None }
    }
}

impl AuthProvider for StaticAuth {
    fn current_user(&self) -> Option<UserProfile> {
        self.user.clone().filter(|u| !u.uid.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_uid_counts_as_signed_out() {
        let auth = StaticAuth::signed_in(UserProfile::new("  "));
        assert!(auth.current_user().is_none());
        assert!(StaticAuth::signed_out().current_user().is_none());

        let auth = StaticAuth::signed_in(UserProfile::new("u1"));
        assert_eq!(auth.current_user().unwrap().uid, "u1");
    }
}
