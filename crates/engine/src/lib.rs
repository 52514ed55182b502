pub mod mapping;
pub mod models;
pub mod pager;
pub mod ports;
pub mod progress;
pub mod relations;
pub mod resume;
pub mod scope;
pub mod service;
mod timeout;

pub use mapping::{PartnerMapper, PartnerTypeKeys};
pub use ports::{ChangelogSource, EntityResolver, PartnerSink};
pub use relations::RelationReconciler;
pub use scope::SyncScope;
pub use service::{ChangelogService, ChangelogServiceConfig, SyncRunner};
