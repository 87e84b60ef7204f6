mod family;
mod membership;
mod profile;
mod sync_entity;
mod sync_meta;

pub use family::Family;
pub use membership::Membership;
pub use profile::UserProfile;
pub use sync_entity::SyncEntity;
pub use sync_meta::SyncMeta;
