// ============================
// realtime-client/src/router/admin.rs
// ============================
//! Router for admins and sub-admins.
//!
//! Admins review requests rather than file them, so the only thing that
//! changes for them is the pending list of the matching entity. Their own
//! profile and navigation are untouched.

use super::Action;
use realtime_common::{Entity, MessageKind};

pub(super) fn route(kind: &MessageKind) -> Option<Action> {
    match kind {
        MessageKind::NewLecturerRequest => Some(Action::RefreshPending(Entity::Lecturer)),
        MessageKind::NewInstitutionRequest => Some(Action::RefreshPending(Entity::Institution)),
        MessageKind::NewPartnerRequest => Some(Action::RefreshPending(Entity::Partner)),
        MessageKind::NewCourseRequest => Some(Action::RefreshPending(Entity::Course)),
        MessageKind::ApproveLecturer
        | MessageKind::RejectLecturer
        | MessageKind::ApproveInstitution
        | MessageKind::RejectInstitution
        | MessageKind::ApprovePartner
        | MessageKind::RejectPartner
        | MessageKind::ApproveCourse
        | MessageKind::RejectCourse
        | MessageKind::Unknown(_) => None,
    }
}
