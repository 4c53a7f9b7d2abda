pub mod access_right;
pub mod declaration;
pub mod identity;

pub use access_right::{AccessRight, AccessRole, AccessStatus};
pub use declaration::Declaration;
pub use identity::Identity;
