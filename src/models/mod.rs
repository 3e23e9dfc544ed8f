//! Data models
//!
//! Entities stored by the service (User, Session, Category, Theme, Content,
//! ContentType), their expanded read models, validated inputs handed to the
//! services, and list options.

mod category;
mod content;
mod list;
mod session;
mod theme;
mod user;

pub use category::{decode_allow_types, encode_allow_types, Category, CategoryInput, CategoryRef};
pub use content::{
    BlockSyncPlan, BlockWrite, Content, ContentDetail, ContentFields, ContentInput, ContentType,
    ContentTypeDetail, ContentTypeItem,
};
pub use list::{
    Column, ColumnKind, FilterValue, ListOptions, ListQuery, ListQueryError, ListSchema, SortOrder,
    CATEGORY_LIST, CONTENT_LIST, THEME_LIST, USER_LIST,
};
pub use session::Session;
pub use theme::{Theme, ThemeDetail, ThemeInput, ThemeSummary};
pub use user::{CreateUserInput, UpdateUserInput, User, UserRole, UserSummary};
