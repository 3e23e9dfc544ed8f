//! Services layer - Business logic
//!
//! Services validate requests, enforce referential integrity and ownership,
//! and coordinate the repositories. Handlers talk to services only.

pub mod category;
pub mod content;
pub mod error;
pub mod integrity;
pub mod password;
pub mod policy;
pub mod theme;
pub mod user;

pub use category::{CategoryDraft, CategoryService};
pub use content::{BlockDraft, ContentDraft, ContentService};
pub use error::{ServiceError, ServiceResult};
pub use password::{hash_password, verify_password};
pub use policy::{can_mutate, ensure_can_mutate, Principal, ADMIN_ONLY, AUTHORS};
pub use theme::{ThemeDraft, ThemeService};
pub use user::{LoginDraft, RegisterDraft, UserService, UserUpdateDraft};
