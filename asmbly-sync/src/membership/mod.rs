//! Membership timelines and churn/join classification

pub mod classify;
pub mod normalize;
pub mod period;

pub use classify::{classify, ChurnEvent, Classification, JoinEvent, GAP_TOLERANCE_DAYS};
pub use normalize::{normalize_memberships, parse_period, NormalizedHistory};
pub use period::{MemberTimeline, MembershipPeriod, MembershipStatus, MembershipType};
