//! Which producer screens need a login
//!
//! | route            | Authenticated | Unauthenticated |
//! |------------------|---------------|-----------------|
//! | `/`  (create)    | render        | redirect        |
//! | `/upload`        | render        | redirect        |
//! | `/login`         | render        | render          |
//! | `/{format}/...`  | render        | render          |
//!
//! Recipients never log in, so display routes are always rendered. When the
//! storage service runs without auth, nothing redirects.

use onceshare_crypto::ShareReference;

use crate::session::AuthState;

pub const LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Create,
    Upload,
    Login,
    Display(ShareReference),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Render,
    RedirectToLogin,
}

impl Route {
    /// Map a client path onto a route. Unknown paths give `None`.
    pub fn resolve(path: &str) -> Option<Route> {
        match path {
            "" | "/" => Some(Route::Create),
            "/upload" => Some(Route::Upload),
            LOGIN_ROUTE => Some(Route::Login),
            other => ShareReference::parse(other).ok().map(Route::Display),
        }
    }

    pub fn requires_login(&self) -> bool {
        matches!(self, Route::Create | Route::Upload)
    }

    pub fn decide(&self, state: &AuthState, auth_required: bool) -> RouteDecision {
        match (self.requires_login() && auth_required, state) {
            (true, AuthState::Unauthenticated) => RouteDecision::RedirectToLogin,
            _ => RouteDecision::Render,
        }
    }
}
