//! Account resolvers: sign-up, sign-in, password reset and profile

use async_graphql::{Context, Object, Result, Upload};

use super::context::current_user_id;
use super::errors::app_error;
use super::guard::AuthGuard;
use super::types::{
    AccountNotActive, DefaultResponse, DefaultResponseResult, InvalidCredentials, OtpResponse,
    ProfileResults, SignInResponse, SignInResult, TokenRefreshResults, TokenRefreshed,
    VerificationResults,
};
use super::upload::take_image;
use crate::core::auth::{AuthError, AuthService, ProfileUpdate, SignInOutcome, SignUpRequest};

pub const SIGN_UP_MESSAGE: &str = "received successfully";
pub const SIGN_IN_MESSAGE: &str = "Login Successfull";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Error authenticating please try again !";
pub const ACCOUNT_NOT_ACTIVE_MESSAGE: &str =
    "Access Denied - This account has been temporarily disabled. Please activate your account";
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "Password reset was successfull check your email for a reset token";
pub const OTP_VERIFIED_MESSAGE: &str = "otp verification was successfull";

#[derive(Default)]
pub struct UserQuery;

#[Object]
impl UserQuery {
    /// Profile of the signed-in user
    #[graphql(guard = "AuthGuard")]
    async fn fetch_profile(&self, ctx: &Context<'_>) -> Result<ProfileResults> {
        let user_id = current_user_id(ctx)?;
        let auth = ctx.data::<AuthService>()?;

        tracing::debug!(user_id = %user_id, "Fetching profile");
        Ok(match auth.fetch_profile(user_id).await {
            Ok(user) => ProfileResults::User(user.into()),
            Err(e) => ProfileResults::ApplicationErrors(app_error(ctx, e)),
        })
    }

    /// Exchange an emailed reset code for a short-lived access token
    async fn verify_token(&self, ctx: &Context<'_>, token: String) -> Result<VerificationResults> {
        let auth = ctx.data::<AuthService>()?;

        Ok(match auth.verify_token(&token).await {
            Ok(token) => VerificationResults::OtpResponse(OtpResponse {
                token,
                message: OTP_VERIFIED_MESSAGE.to_string(),
            }),
            Err(e) => VerificationResults::ApplicationErrors(app_error(ctx, e)),
        })
    }
}

#[derive(Default)]
pub struct UserMutation;

#[Object]
impl UserMutation {
    #[allow(clippy::too_many_arguments)]
    async fn sign_up(
        &self,
        ctx: &Context<'_>,
        name: String,
        email: String,
        profile_image: Upload,
        phone_number: String,
        password: String,
        role: Option<String>,
        account_state: bool,
    ) -> Result<DefaultResponseResult> {
        let auth = ctx.data::<AuthService>()?;

        let profile_image = match take_image(ctx, &profile_image) {
            Ok(image) => image,
            Err(e) => return Ok(DefaultResponseResult::ApplicationErrors(app_error(ctx, e))),
        };

        let request = SignUpRequest {
            name,
            email,
            phone_number,
            password,
            role: role.unwrap_or_default(),
            account_state,
            profile_image,
        };

        Ok(match auth.sign_up(request).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, role = %user.role, "User signed up");
                DefaultResponseResult::DefaultResponse(DefaultResponse::new(SIGN_UP_MESSAGE))
            }
            Err(e) => DefaultResponseResult::ApplicationErrors(app_error(ctx, e)),
        })
    }

    /// Invalid input is reported as a top-level error since this union has no error member
    async fn signin(&self, ctx: &Context<'_>, email: String, password: String) -> Result<SignInResult> {
        let auth = ctx.data::<AuthService>()?;

        let outcome = match auth.sign_in(&email, &password).await {
            Ok(outcome) => outcome,
            Err(AuthError::Validation(e)) => return Err(e.into()),
            Err(e) => {
                let err = app_error(ctx, e);
                return Err(async_graphql::Error::new(err.error_message));
            }
        };

        Ok(match outcome {
            SignInOutcome::Success { user, tokens } => {
                tracing::info!(user_id = %user.id, "User signed in");
                SignInResult::SignInResponse(SignInResponse {
                    message: SIGN_IN_MESSAGE.to_string(),
                    user: user.into(),
                    token: tokens.access_token,
                    refresh_token: tokens.refresh_token,
                })
            }
            SignInOutcome::AccountNotActive { user_id } => {
                tracing::info!(user_id = %user_id, "Sign in to inactive account");
                SignInResult::AccountNotActive(AccountNotActive {
                    user_id: user_id.to_string(),
                    message: ACCOUNT_NOT_ACTIVE_MESSAGE.to_string(),
                })
            }
            SignInOutcome::InvalidCredentials => SignInResult::InvalidCredentials(InvalidCredentials {
                msg: INVALID_CREDENTIALS_MESSAGE.to_string(),
            }),
        })
    }

    async fn forgot_password(&self, ctx: &Context<'_>, email: String) -> Result<DefaultResponseResult> {
        let auth = ctx.data::<AuthService>()?;

        Ok(match auth.forgot_password(&email).await {
            Ok(()) => DefaultResponseResult::DefaultResponse(DefaultResponse::new(
                FORGOT_PASSWORD_MESSAGE,
            )),
            Err(e) => DefaultResponseResult::ApplicationErrors(app_error(ctx, e)),
        })
    }

    #[graphql(guard = "AuthGuard")]
    async fn update_profile(
        &self,
        ctx: &Context<'_>,
        profile_image: Option<Upload>,
        password: Option<String>,
    ) -> Result<ProfileResults> {
        let user_id = current_user_id(ctx)?;
        let auth = ctx.data::<AuthService>()?;

        let profile_image = match profile_image.as_ref().map(|u| take_image(ctx, u)).transpose() {
            Ok(image) => image,
            Err(e) => return Ok(ProfileResults::ApplicationErrors(app_error(ctx, e))),
        };

        let update = ProfileUpdate {
            profile_image,
            password,
        };

        Ok(match auth.update_profile(user_id, update).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "Profile updated");
                ProfileResults::User(user.into())
            }
            Err(e) => ProfileResults::ApplicationErrors(app_error(ctx, e)),
        })
    }

    /// Rotate a refresh token into a fresh token pair
    async fn refresh_token(&self, ctx: &Context<'_>, refresh_token: String) -> Result<TokenRefreshResults> {
        let auth = ctx.data::<AuthService>()?;

        Ok(match auth.refresh(&refresh_token).await {
            Ok(tokens) => TokenRefreshResults::TokenRefreshed(TokenRefreshed {
                message: "token refreshed".to_string(),
                token: tokens.access_token,
                refresh_token: tokens.refresh_token,
            }),
            Err(e) => TokenRefreshResults::ApplicationErrors(app_error(ctx, e)),
        })
    }

    async fn sign_out(&self, ctx: &Context<'_>, refresh_token: String) -> Result<DefaultResponseResult> {
        let auth = ctx.data::<AuthService>()?;

        Ok(match auth.sign_out(&refresh_token).await {
            Ok(true) => DefaultResponseResult::DefaultResponse(DefaultResponse::new("signed out")),
            Ok(false) => DefaultResponseResult::ApplicationErrors(app_error(ctx, AuthError::SessionNotFound)),
            Err(e) => DefaultResponseResult::ApplicationErrors(app_error(ctx, e)),
        })
    }
}
