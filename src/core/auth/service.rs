//! Authentication service
//!
//! Sign-up, sign-in, password reset via emailed one-time codes, refresh
//! token rotation and profile updates. Coordinates the user, session and
//! reset repositories with the JWT service, image store and mailer.

use std::sync::Arc;

use rand::Rng;
use uuid::Uuid;

use crate::core::auth::jwt::{JwtError, JwtService, TokenPair};
use crate::core::db::models::{CreateUser, Role, UpdateUser, User};
use crate::core::db::repositories::{
    PasswordResetRepository, PasswordResetRepositoryError, SessionRepository,
    SessionRepositoryError, UserRepository, UserRepositoryError,
};
use crate::core::mailer::{Email, Mailer, MailerError};
use crate::core::storage::{ImageStore, ImageUpload, StorageError};
use crate::core::validation::{ValidationError, ValidationResult};

/// Number of digits in an emailed reset code
pub const OTP_LENGTH: usize = 5;

/// Fresh codes tried before giving up when drawn codes are already pending
pub const OTP_ISSUE_ATTEMPTS: usize = 8;

/// Authentication service error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Email already in use")]
    EmailAlreadyExists,

    #[error("Invalid Request passed as input")]
    UnknownEmail,

    #[error("Invalid otp code")]
    InvalidOtp,

    #[error("Otp code expired")]
    OtpExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Session not found or expired")]
    SessionNotFound,

    #[error("Image upload failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Mail delivery failed: {0}")]
    Mail(#[from] MailerError),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<UserRepositoryError> for AuthError {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::NotFound => AuthError::UserNotFound,
            UserRepositoryError::EmailAlreadyExists => AuthError::EmailAlreadyExists,
            _ => AuthError::InternalError(err.to_string()),
        }
    }
}

impl From<SessionRepositoryError> for AuthError {
    fn from(err: SessionRepositoryError) -> Self {
        match err {
            SessionRepositoryError::NotFound => AuthError::SessionNotFound,
            SessionRepositoryError::Expired => AuthError::TokenExpired,
            _ => AuthError::InternalError(err.to_string()),
        }
    }
}

impl From<PasswordResetRepositoryError> for AuthError {
    fn from(err: PasswordResetRepositoryError) -> Self {
        match err {
            PasswordResetRepositoryError::Expired => AuthError::OtpExpired,
            _ => AuthError::InternalError(err.to_string()),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::TokenExpired,
            JwtError::InvalidToken | JwtError::InvalidTokenType => AuthError::InvalidToken,
            _ => AuthError::InternalError(err.to_string()),
        }
    }
}

/// Sign-up request
#[derive(Debug)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
    /// Free-form role; anything but `PropertyManager` signs up a tenant
    pub role: String,
    pub account_state: bool,
    pub profile_image: ImageUpload,
}

/// Result of a sign-in attempt that reached the credential check
#[derive(Debug)]
pub enum SignInOutcome {
    Success { user: User, tokens: TokenPair },
    InvalidCredentials,
    AccountNotActive { user_id: Uuid },
}

/// Profile changes; `None` keeps the current value
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub profile_image: Option<ImageUpload>,
    pub password: Option<String>,
}

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    session_repo: SessionRepository,
    reset_repo: PasswordResetRepository,
    jwt_service: JwtService,
    images: ImageStore,
    mailer: Arc<dyn Mailer>,
}

impl AuthService {
    pub fn new(
        user_repo: UserRepository,
        session_repo: SessionRepository,
        reset_repo: PasswordResetRepository,
        jwt_service: JwtService,
        images: ImageStore,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            reset_repo,
            jwt_service,
            images,
            mailer,
        }
    }

    /// Numeric one-time code, zero padded to [`OTP_LENGTH`] digits
    pub fn generate_otp() -> String {
        let max = 10u32.pow(OTP_LENGTH as u32);
        let code = rand::thread_rng().gen_range(0..max);
        format!("{:0width$}", code, width = OTP_LENGTH)
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt_service
    }

    /// Resolve a bearer token to the user and role it was issued for
    pub fn authenticate(&self, access_token: &str) -> Result<(Uuid, Role), AuthError> {
        let claims = self.jwt_service.validate_access_token(access_token)?;
        Ok((claims.user_id()?, claims.role))
    }

    pub async fn sign_up(&self, request: SignUpRequest) -> Result<User, AuthError> {
        ValidationResult::new()
            .require("name", &request.name)
            .require("email", &request.email)
            .email(&request.email)
            .require("phoneNumber", &request.phone_number)
            .require("password", &request.password)
            .to_result()?;

        let email = request.email.trim().to_string();
        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = UserRepository::hash_password(&request.password)?;
        let image = self.images.store_upload(request.profile_image).await?;
        let role = Role::from_input(&request.role);

        let created = self
            .user_repo
            .insert(&CreateUser {
                name: request.name.trim().to_string(),
                email,
                password_hash,
                phone_number: request.phone_number.trim().to_string(),
                profile_image: image.file_path.clone(),
                role,
                account_status: request.account_state,
            })
            .await;

        let user = match created {
            Ok(user) => user,
            Err(e) => {
                self.images.discard(vec![image.file_path]).await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.mailer.send(Email::welcome(&user.email, &user.name)).await {
            tracing::warn!(user_id = %user.id, error = %e, "Welcome mail not sent");
        }

        Ok(user)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignInOutcome, AuthError> {
        ValidationResult::new()
            .email(email)
            .require("password", password)
            .to_result()?;

        let Some(user) = self.user_repo.find_by_email(email.trim()).await? else {
            return Ok(SignInOutcome::InvalidCredentials);
        };

        if !UserRepository::verify_password(password, &user.password_hash)? {
            tracing::debug!(user_id = %user.id, "Password mismatch");
            return Ok(SignInOutcome::InvalidCredentials);
        }

        if !user.account_status {
            return Ok(SignInOutcome::AccountNotActive { user_id: user.id });
        }

        let tokens = self.issue_session(&user).await?;
        Ok(SignInOutcome::Success { user, tokens })
    }

    /// Email a one-time reset code to a registered address
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        validate_email_input(email)?;

        let user = self
            .user_repo
            .find_by_email(email.trim())
            .await?
            .ok_or(AuthError::UnknownEmail)?;

        let code = self.issue_reset_code(user.id).await?;
        self.mailer.send(Email::reset_code(&user.email, &code)).await?;

        tracing::info!(user_id = %user.id, "Password reset code issued");
        Ok(())
    }

    /// Redeem a reset code for a short-lived access token
    pub async fn verify_token(&self, code: &str) -> Result<String, AuthError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::InvalidOtp);
        }

        let user_id = self
            .reset_repo
            .take_token(code)
            .await?
            .ok_or(AuthError::InvalidOtp)?;
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(self.jwt_service.generate_verification_token(user.id, user.role())?)
    }

    /// Rotate a refresh token: the old session is consumed and a new pair
    /// issued. Concurrent refreshes of one token yield a single new pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.jwt_service.validate_refresh_token(refresh_token)?;

        let session = self.session_repo.take_token(refresh_token).await?;
        let user_id = claims.user_id()?;
        if session.user_id != user_id {
            tracing::warn!(user_id = %user_id, "Refresh token bound to another user");
            return Err(AuthError::InvalidToken);
        }

        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.issue_session(&user).await
    }

    /// Forget a refresh token. Returns false if it was unknown.
    pub async fn sign_out(&self, refresh_token: &str) -> Result<bool, AuthError> {
        Ok(self.session_repo.delete_by_token(refresh_token).await?)
    }

    pub async fn fetch_profile(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Replace the profile image and/or password. A password change signs
    /// the user out of every other session.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<User, AuthError> {
        if let Some(password) = &update.password {
            ValidationResult::new()
                .require("password", password)
                .to_result()?;
        }

        let current = self.fetch_profile(user_id).await?;

        let password_hash = match &update.password {
            Some(p) => Some(UserRepository::hash_password(p)?),
            None => None,
        };
        let image = match update.profile_image {
            Some(upload) => Some(self.images.store_upload(upload).await?),
            None => None,
        };

        let changes = UpdateUser {
            profile_image: image.as_ref().map(|i| i.file_path.clone()),
            password_hash,
            ..Default::default()
        };
        if changes.is_empty() {
            return Ok(current);
        }

        let user = match self.user_repo.update(user_id, &changes).await {
            Ok(user) => user,
            Err(e) => {
                self.images
                    .discard(image.into_iter().map(|i| i.file_path).collect())
                    .await;
                return Err(e.into());
            }
        };

        if image.is_some() && !current.profile_image.is_empty() {
            self.images.discard(vec![current.profile_image.clone()]).await;
        }
        if changes.password_hash.is_some() {
            let revoked = self.session_repo.delete_all_for_user(user_id).await?;
            tracing::info!(user_id = %user_id, revoked, "Password changed");
        }

        Ok(user)
    }

    /// Store a newly drawn code, drawing again if another user holds it
    async fn issue_reset_code(&self, user_id: Uuid) -> Result<String, AuthError> {
        for _ in 0..OTP_ISSUE_ATTEMPTS {
            let code = Self::generate_otp();
            match self.reset_repo.set_token(user_id, &code).await {
                Ok(_) => return Ok(code),
                Err(PasswordResetRepositoryError::CodeInUse) => {
                    tracing::debug!(user_id = %user_id, "Reset code collision, drawing again");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AuthError::InternalError(
            "could not allocate a unique reset code".to_string(),
        ))
    }

    async fn issue_session(&self, user: &User) -> Result<TokenPair, AuthError> {
        let tokens = self.jwt_service.generate_token_pair(user.id, user.role())?;
        self.session_repo
            .create(
                user.id,
                &tokens.refresh_token,
                Some(self.jwt_service.refresh_token_expiration_days()),
            )
            .await?;
        Ok(tokens)
    }
}

fn validate_email_input(email: &str) -> Result<(), AuthError> {
    ValidationResult::new()
        .require("email", email)
        .email(email)
        .to_result()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // OTP Tests
    // ========================================================================

    #[test]
    fn test_generate_otp_is_five_digits() {
        for _ in 0..200 {
            let code = AuthService::generate_otp();
            assert_eq!(code.len(), OTP_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_generate_otp_varies() {
        let codes: std::collections::HashSet<_> =
            (0..50).map(|_| AuthService::generate_otp()).collect();
        assert!(codes.len() > 1);
    }

    // ========================================================================
    // Error Conversion Tests
    // ========================================================================

    #[test]
    fn test_from_user_repository_error() {
        assert!(matches!(
            AuthError::from(UserRepositoryError::NotFound),
            AuthError::UserNotFound
        ));
        assert!(matches!(
            AuthError::from(UserRepositoryError::EmailAlreadyExists),
            AuthError::EmailAlreadyExists
        ));
        assert!(matches!(
            AuthError::from(UserRepositoryError::HashingError("x".into())),
            AuthError::InternalError(_)
        ));
    }

    #[test]
    fn test_from_session_and_reset_errors() {
        assert!(matches!(
            AuthError::from(SessionRepositoryError::Expired),
            AuthError::TokenExpired
        ));
        assert!(matches!(
            AuthError::from(PasswordResetRepositoryError::Expired),
            AuthError::OtpExpired
        ));
    }

    #[test]
    fn test_from_jwt_error() {
        assert!(matches!(AuthError::from(JwtError::Expired), AuthError::TokenExpired));
        assert!(matches!(
            AuthError::from(JwtError::InvalidTokenType),
            AuthError::InvalidToken
        ));
        assert!(matches!(
            AuthError::from(JwtError::EncodingError("boom".into())),
            AuthError::InternalError(_)
        ));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(AuthError::UnknownEmail.to_string(), "Invalid Request passed as input");
        assert_eq!(AuthError::EmailAlreadyExists.to_string(), "Email already in use");
        assert_eq!(AuthError::InvalidOtp.to_string(), "Invalid otp code");
        assert_eq!(
            AuthError::from(ValidationError::InvalidEmail).to_string(),
            "Invalid email address"
        );
    }

    #[test]
    fn test_validate_email_input() {
        assert!(validate_email_input("user@example.com").is_ok());
        assert!(matches!(
            validate_email_input(""),
            Err(AuthError::Validation(ValidationError::Required { field: "email" }))
        ));
        assert!(matches!(
            validate_email_input("nope"),
            Err(AuthError::Validation(ValidationError::InvalidEmail))
        ));
    }

    // ========================================================================
    // Integration Tests (require database)
    // ========================================================================

    mod integration {
        use super::*;
        use crate::core::auth::jwt::JwtConfig;
        use crate::core::db::repositories::user::test_support::*;
        use crate::core::mailer::MemoryMailer;
        use std::io::Cursor;
        use tempfile::TempDir;

        struct Harness {
            service: AuthService,
            mailer: Arc<MemoryMailer>,
            pool: sqlx::PgPool,
            _storage: TempDir,
        }

        async fn harness() -> Harness {
            let pool = create_test_pool().await;
            let storage = TempDir::new().unwrap();
            let mailer = Arc::new(MemoryMailer::new());

            let service = AuthService::new(
                UserRepository::new(pool.clone()),
                SessionRepository::new(pool.clone()),
                PasswordResetRepository::new(pool.clone()),
                JwtService::new(JwtConfig::new("integration-secret")),
                ImageStore::new(storage.path()),
                mailer.clone(),
            );

            Harness {
                service,
                mailer,
                pool,
                _storage: storage,
            }
        }

        fn sign_up_request(email: &str, role: &str, active: bool) -> SignUpRequest {
            SignUpRequest {
                name: "Jane".to_string(),
                email: email.to_string(),
                phone_number: "0700000000".to_string(),
                password: "Password1".to_string(),
                role: role.to_string(),
                account_state: active,
                profile_image: ImageUpload::new("me.png", Cursor::new(vec![1, 2, 3])),
            }
        }

        #[tokio::test]
        #[ignore = "requires running PostgreSQL database"]
        async fn test_sign_up_then_sign_in() {
            let h = harness().await;
            let email = unique_email();

            let user = h
                .service
                .sign_up(sign_up_request(&email, "PropertyManager", true))
                .await
                .unwrap();
            assert_eq!(user.role(), Role::PropertyManager);
            assert!(user.profile_image.starts_with("/storage/"));
            assert_eq!(h.mailer.sent().len(), 1);

            let outcome = h.service.sign_in(&email, "Password1").await.unwrap();
            let SignInOutcome::Success { tokens, .. } = outcome else {
                panic!("expected successful sign in");
            };
            let (id, role) = h.service.authenticate(&tokens.access_token).unwrap();
            assert_eq!(id, user.id);
            assert_eq!(role, Role::PropertyManager);

            cleanup_user(&h.pool, user.id).await;
        }

        #[tokio::test]
        #[ignore = "requires running PostgreSQL database"]
        async fn test_sign_up_duplicate_email() {
            let h = harness().await;
            let email = unique_email();

            let user = h.service.sign_up(sign_up_request(&email, "Tenant", true)).await.unwrap();
            let again = h.service.sign_up(sign_up_request(&email, "Tenant", true)).await;
            assert!(matches!(again, Err(AuthError::EmailAlreadyExists)));

            cleanup_user(&h.pool, user.id).await;
        }

        #[tokio::test]
        #[ignore = "requires running PostgreSQL database"]
        async fn test_sign_in_outcomes() {
            let h = harness().await;
            let email = unique_email();
            let user = h.service.sign_up(sign_up_request(&email, "Tenant", false)).await.unwrap();

            assert!(matches!(
                h.service.sign_in(&email, "wrong").await.unwrap(),
                SignInOutcome::InvalidCredentials
            ));
            assert!(matches!(
                h.service.sign_in(&unique_email(), "Password1").await.unwrap(),
                SignInOutcome::InvalidCredentials
            ));
            assert!(matches!(
                h.service.sign_in(&email, "Password1").await.unwrap(),
                SignInOutcome::AccountNotActive { user_id } if user_id == user.id
            ));

            cleanup_user(&h.pool, user.id).await;
        }

        #[tokio::test]
        #[ignore = "requires running PostgreSQL database"]
        async fn test_forgot_password_and_verify_token() {
            let h = harness().await;
            let email = unique_email();
            let user = h.service.sign_up(sign_up_request(&email, "Tenant", true)).await.unwrap();

            h.service.forgot_password(&email).await.unwrap();
            let mail = h.mailer.sent().pop().unwrap();
            let code: String = mail.body.chars().filter(|c| c.is_ascii_digit()).take(5).collect();

            let token = h.service.verify_token(&code).await.unwrap();
            let (id, _) = h.service.authenticate(&token).unwrap();
            assert_eq!(id, user.id);

            assert!(matches!(
                h.service.verify_token(&code).await,
                Err(AuthError::InvalidOtp)
            ));
            assert!(matches!(
                h.service.forgot_password(&unique_email()).await,
                Err(AuthError::UnknownEmail)
            ));

            cleanup_user(&h.pool, user.id).await;
        }

        #[tokio::test]
        #[ignore = "requires running PostgreSQL database"]
        async fn test_refresh_rotates_and_sign_out() {
            let h = harness().await;
            let email = unique_email();
            let user = h.service.sign_up(sign_up_request(&email, "Tenant", true)).await.unwrap();

            let SignInOutcome::Success { tokens, .. } =
                h.service.sign_in(&email, "Password1").await.unwrap()
            else {
                panic!("expected successful sign in");
            };

            let rotated = h.service.refresh(&tokens.refresh_token).await.unwrap();
            assert!(matches!(
                h.service.refresh(&tokens.refresh_token).await,
                Err(AuthError::SessionNotFound)
            ));

            assert!(h.service.sign_out(&rotated.refresh_token).await.unwrap());
            assert!(!h.service.sign_out(&rotated.refresh_token).await.unwrap());

            cleanup_user(&h.pool, user.id).await;
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        #[ignore = "requires running PostgreSQL database"]
        async fn test_concurrent_refresh_issues_one_pair() {
            let h = harness().await;
            let email = unique_email();
            let user = h.service.sign_up(sign_up_request(&email, "Tenant", true)).await.unwrap();

            for round in 0..10 {
                let SignInOutcome::Success { tokens, .. } =
                    h.service.sign_in(&email, "Password1").await.unwrap()
                else {
                    panic!("expected successful sign in");
                };

                let (a, b) = tokio::join!(
                    h.service.refresh(&tokens.refresh_token),
                    h.service.refresh(&tokens.refresh_token)
                );
                assert_eq!(
                    a.is_ok() as u8 + b.is_ok() as u8,
                    1,
                    "round {round}: a refresh token must rotate exactly once"
                );
                let loser = if a.is_ok() { b } else { a };
                assert!(matches!(loser, Err(AuthError::SessionNotFound)));
            }

            cleanup_user(&h.pool, user.id).await;
        }

        #[tokio::test]
        #[ignore = "requires running PostgreSQL database"]
        async fn test_reset_codes_resolve_to_their_owner() {
            let h = harness().await;
            let alice = h
                .service
                .sign_up(sign_up_request(&unique_email(), "Tenant", true))
                .await
                .unwrap();
            let bob = h
                .service
                .sign_up(sign_up_request(&unique_email(), "Tenant", true))
                .await
                .unwrap();

            h.service.forgot_password(&alice.email).await.unwrap();
            h.service.forgot_password(&bob.email).await.unwrap();

            let codes: Vec<(String, String)> = h
                .mailer
                .sent()
                .into_iter()
                .filter(|m| m.body.contains("15 minutes"))
                .map(|m| {
                    let code = m.body.chars().filter(|c| c.is_ascii_digit()).take(5).collect();
                    (m.to, code)
                })
                .collect();
            assert_eq!(codes.len(), 2);
            assert_ne!(codes[0].1, codes[1].1);

            for (to, code) in codes {
                let token = h.service.verify_token(&code).await.unwrap();
                let (id, _) = h.service.authenticate(&token).unwrap();
                let expected = if to == alice.email { alice.id } else { bob.id };
                assert_eq!(id, expected);
            }

            cleanup_user(&h.pool, alice.id).await;
            cleanup_user(&h.pool, bob.id).await;
        }

        #[tokio::test]
        #[ignore = "requires running PostgreSQL database"]
        async fn test_update_profile_password() {
            let h = harness().await;
            let email = unique_email();
            let user = h.service.sign_up(sign_up_request(&email, "Tenant", true)).await.unwrap();

            let updated = h
                .service
                .update_profile(
                    user.id,
                    ProfileUpdate {
                        password: Some("NewPassword2".to_string()),
                        profile_image: Some(ImageUpload::new("new.jpg", Cursor::new(vec![9]))),
                    },
                )
                .await
                .unwrap();

            assert_ne!(updated.profile_image, user.profile_image);
            assert!(matches!(
                h.service.sign_in(&email, "NewPassword2").await.unwrap(),
                SignInOutcome::Success { .. }
            ));

            cleanup_user(&h.pool, user.id).await;
        }
    }
}
