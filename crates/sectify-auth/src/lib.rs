pub mod authz;
pub mod error;
pub mod mfa;
pub mod model;
pub mod passwords;
pub mod store;
pub mod tokens;

pub use authz::{AuthorizationService, GRANT_TTL_SECS};
pub use error::{AuthError, Result};
pub use mfa::verify_totp;
pub use model::{AccessGrant, IpPrefix, Operation, Track, User};
pub use passwords::{hash_password, verify_password};
pub use store::{GrantStore, InMemoryTrackStore, InMemoryUserStore, TrackStore, UserStore};
pub use tokens::{Claims, Purpose, TokenService, ACCESS_TOKEN_TTL_SECS, MFA_TOKEN_TTL_SECS};
