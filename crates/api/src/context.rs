use shopkeep_auth::Principal;

/// Principal context for a request.
///
/// Always present once the principal middleware has run; `None` means the
/// caller sent no credentials.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct RequestPrincipal(Option<Principal>);

impl RequestPrincipal {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn authenticated(principal: Principal) -> Self {
        Self(Some(principal))
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.0.as_ref()
    }
}
