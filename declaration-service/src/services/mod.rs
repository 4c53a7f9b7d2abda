//! Services layer for declaration-service.
//!
//! Provides the access-control business logic plus the store, directory,
//! and email seams it is wired to.

mod access;
mod database;
mod directory;
mod email;
mod store;

pub use access::{AccessService, MemberRecord};
pub use database::Database;
pub use directory::{DeclarationDirectory, IdentityDirectory, MemoryDirectory};
pub use email::{EmailProvider, EmailService, MockEmailService, SentEmail};
pub use store::{AccessRightStore, MemoryAccessStore};
