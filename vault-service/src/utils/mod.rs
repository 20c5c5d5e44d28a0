pub mod password;
pub mod token;
pub mod validation;

pub use password::{hash_password, verify_password, Password, PasswordHashString};
pub use token::{generate_reset_token, hash_token};
pub use validation::ValidatedJson;
