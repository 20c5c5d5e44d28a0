pub mod auth;
pub mod rbac;
pub mod step_up;

pub use auth::{
    cleared_session_cookie, session_claims, session_cookie, SessionUser, SESSION_COOKIE,
};
pub use rbac::rbac_middleware;
pub use step_up::StepUpUser;
