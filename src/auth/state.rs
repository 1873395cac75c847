//! Authentication state trait and macro.

use crate::db::Database;
use crate::jwt::JwtConfig;

/// Trait for state types that provide what the auth extractors need.
pub trait HasAuthBackend {
    fn jwt(&self) -> &JwtConfig;
    fn db(&self) -> &Database;
    fn secure_cookies(&self) -> bool;
}

/// Implement `HasAuthBackend` for a state struct with the standard fields.
///
/// The struct must have these fields:
/// - `jwt: Arc<JwtConfig>`
/// - `db: Database`
/// - `secure_cookies: bool`
///
/// # Example
/// ```ignore
/// #[derive(Clone)]
/// pub struct TweetsState {
///     pub db: Database,
///     pub jwt: Arc<JwtConfig>,
///     pub secure_cookies: bool,
/// }
///
/// impl_has_auth_backend!(TweetsState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn jwt(&self) -> &$crate::jwt::JwtConfig {
                &self.jwt
            }
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
            fn secure_cookies(&self) -> bool {
                self.secure_cookies
            }
        }
    };
}
