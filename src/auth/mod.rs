//! Access-token authentication for API routes.
//!
//! Access tokens are stateless: a request is authenticated by the token's
//! signature and expiry, plus a lookup of the user it names. Refresh tokens
//! never authenticate a request; they are only exchanged at `/refreshToken`.

mod cookie;
mod errors;
mod extractors;
mod state;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie, get_bearer_token, get_cookie,
    token_cookie,
};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::Auth;
pub use state::HasAuthBackend;
pub use types::{AuthenticatedUser, PublicUser};
