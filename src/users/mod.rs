/// Credential records: the row model, its sanitized view, and the store
/// operations over Postgres.
pub mod model;
pub mod store;

pub use model::User;
pub use model::UserView;
pub use store::NewUser;
