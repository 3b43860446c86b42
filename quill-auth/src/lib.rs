//! quill-auth: sessions and authorization for Quill CMS.
//!
//! Session tokens are HS256 JWTs signed with a per-tenant secret
//! ([`secrets::SecretResolver`]). A token is only accepted on requests for the
//! tenant it names. The [`gate`] module holds the role and ownership checks
//! applied once an [`Identity`] is attached to a request.

pub mod directory;
pub mod gate;
pub mod options;
pub mod secrets;
pub mod token;
pub mod user;

pub use directory::{decode_user_record, TenantUsers, USERS_COLLECTION};
pub use gate::{ensure_can_assign_role, require_admin, require_role, require_self_or_admin};
pub use options::{AuthOptions, AuthOptionsBuilder, JwtAlgorithm, SESSION_COOKIE, SESSION_TTL};
pub use secrets::{
    secret_env_var, EnvLookup, InMemorySecretStore, SecretResolver, SecretSource, SecretStore,
    SecretStoreError,
};
pub use token::{decode_claims, sign_claims, SessionClaims, TokenIssuer};
pub use user::{
    DevtoCredentials, FacebookCredentials, Identity, LinkedInCredentials, RedditCredentials, Role,
    SocialCredentials, TwitterCredentials, User, UserDirectory, UserRecord,
};
