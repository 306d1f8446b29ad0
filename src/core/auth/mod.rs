//! Authentication
//!
//! - JWT issuance and validation
//! - Sign-up, sign-in and refresh token rotation
//! - Password reset through emailed one-time codes

pub mod jwt;
pub mod service;

pub use jwt::{Claims, JwtConfig, JwtError, JwtService, TokenPair, TokenType};
pub use service::{AuthError, AuthService, ProfileUpdate, SignInOutcome, SignUpRequest};
