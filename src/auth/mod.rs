/// Authentication primitives: token issuance/verification and password
/// hashing. Stateful refresh-token trust lives with the credential store.
mod claims;
mod jwt;
mod password;

pub use claims::AccessClaims;
pub use claims::RefreshClaims;
pub use jwt::issue_access_token;
pub use jwt::issue_refresh_token;
pub use jwt::issue_token_pair;
pub use jwt::verify_access_token;
pub use jwt::verify_refresh_token;
pub use jwt::TokenPair;
pub use password::hash_password;
pub use password::verify_password;
