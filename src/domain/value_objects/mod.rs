mod entity_kind;
mod ids;
mod invite_code;
mod member_role;
mod membership_status;
mod record_version;
mod sync_mode;

pub use entity_kind::EntityKind;
pub use ids::{FamilyId, MembershipId, ProfileId};
pub use invite_code::InviteCode;
pub use member_role::MemberRole;
pub use membership_status::MembershipStatus;
pub use record_version::RecordVersion;
pub use sync_mode::SyncMode;
