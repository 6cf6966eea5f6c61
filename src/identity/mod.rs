//! Identity provider integration: sessions, token verification, profiles and
//! the explicit auth context of a signed-in user.
//! Keep the public surface thin and split implementation across sub-modules.

mod session;
mod provider;
mod gotrue;
mod cookie;
mod profiles;
mod auth_context;

pub use session::{BearerToken, Session, SessionUser};
pub use provider::{IdentityError, IdentityProvider, TokenVerifier};
pub use gotrue::GoTrueClient;
pub use cookie::{access_token_from_cookie, parse_cookie};
pub use profiles::{ProfileDirectory, RestProfileDirectory, Role, UserProfile};
pub use auth_context::{AuthContext, AuthEvent, AuthStatus};
