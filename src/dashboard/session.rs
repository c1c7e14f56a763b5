//! Signed-in user state for a dashboard client.
//!
//! A [`Session`] starts empty, is populated by a successful login and cleared
//! on logout. Nothing about the current user lives outside of it.

use crate::dashboard::fetcher::Fetcher;
use crate::db::models::{NewUser, ProfileUpdate, PublicUser};
use crate::error::{AppError, Result};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct Session {
    user: Option<PublicUser>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_user(&self) -> Option<&PublicUser> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// On failure the session is left unchanged.
    pub async fn login(
        &mut self,
        fetcher: &Fetcher,
        username: &str,
        password: &str,
    ) -> Result<&PublicUser> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        let user = fetcher.login(username, password).await?;
        info!("User {} signed in", user.username);
        Ok(&*self.user.insert(user))
    }

    pub fn logout(&mut self) {
        if let Some(user) = self.user.take() {
            info!("User {} signed out", user.username);
        }
    }

    /// Send the changed fields and merge them into the held user.
    pub async fn update_profile(
        &mut self,
        fetcher: &Fetcher,
        update: &ProfileUpdate,
    ) -> Result<&PublicUser> {
        let user = self.user.as_mut().ok_or_else(not_signed_in)?;
        if !update.is_empty() {
            fetcher.update_profile(user.id, update).await?;
            user.apply(update);
        }
        Ok(&*user)
    }

    pub async fn change_password(
        &self,
        fetcher: &Fetcher,
        form: &PasswordChangeForm,
    ) -> Result<()> {
        let user = self.user.as_ref().ok_or_else(not_signed_in)?;
        form.validate()?;
        fetcher
            .change_password(user.id, &form.current_password, &form.new_password)
            .await
    }
}

fn not_signed_in() -> AppError {
    AppError::Unauthorized("Not signed in".to_string())
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub email: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            &self.email,
            &self.username,
            &self.password,
            &self.first_name,
            &self.last_name,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(AppError::Validation("All fields are required".to_string()));
        }
        if self.password != self.confirm_password {
            return Err(AppError::Validation("Passwords don't match".to_string()));
        }
        Ok(())
    }

    fn to_new_user(&self) -> NewUser {
        NewUser {
            email: self.email.trim().to_string(),
            username: self.username.trim().to_string(),
            password: self.password.clone(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
        }
    }
}

/// Create an account. Returns the new user id; does not sign in.
pub async fn register(fetcher: &Fetcher, form: &RegistrationForm) -> Result<i64> {
    form.validate()?;
    let user_id = fetcher.register(&form.to_new_user()).await?;
    info!("Registered user {} with id {}", form.username, user_id);
    Ok(user_id)
}

#[derive(Debug, Clone, Default)]
pub struct PasswordChangeForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordChangeForm {
    pub fn validate(&self) -> Result<()> {
        if self.current_password.is_empty() || self.new_password.is_empty() {
            return Err(AppError::Validation(
                "Current and new password are required".to_string(),
            ));
        }
        if self.new_password != self.confirm_password {
            return Err(AppError::Validation("New passwords don't match".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> RegistrationForm {
        RegistrationForm {
            email: "grower@farm.test".to_string(),
            username: "grower".to_string(),
            password: "secret".to_string(),
            confirm_password: "secret".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Reyes".to_string(),
        }
    }

    #[test]
    fn test_registration_mismatch() {
        let mut f = form();
        f.confirm_password = "other".to_string();
        match f.validate() {
            Err(AppError::Validation(msg)) => assert_eq!(msg, "Passwords don't match"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_registration_blank_field() {
        let mut f = form();
        f.last_name = "  ".to_string();
        assert!(matches!(f.validate(), Err(AppError::Validation(_))));
        assert!(form().validate().is_ok());
    }

    #[test]
    fn test_registration_trims_identity_fields() {
        let mut f = form();
        f.username = " grower ".to_string();
        assert_eq!(f.to_new_user().username, "grower");
    }

    #[test]
    fn test_password_change_mismatch() {
        let f = PasswordChangeForm {
            current_password: "old".to_string(),
            new_password: "new1".to_string(),
            confirm_password: "new2".to_string(),
        };
        match f.validate() {
            Err(AppError::Validation(msg)) => assert_eq!(msg, "New passwords don't match"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_new_session_is_empty() {
        let mut session = Session::new();
        assert!(!session.is_authenticated());
        session.logout();
        assert!(session.current_user().is_none());
    }
}
