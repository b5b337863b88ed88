//! Global session state reducer: API/auth handles and menu visibility.
//!
//! Pure synchronous transitions over an exclusively-owned state cell. The
//! one invariant worth the name: an auth session is released (logged out)
//! before its reference is replaced or dropped.

/// Authenticated session that must be released before it is dropped.
pub trait AuthSession: Send {
    /// Release the session (revoke tokens, close sockets). Called by the
    /// reducer; never called twice on the same object.
    fn log_out(&mut self);
}

/// Global session state. `Api` is whatever client handle the host app uses;
/// the reducer only stores and drops it.
pub struct RootState<Api> {
    pub api: Option<Api>,
    pub auth: Option<Box<dyn AuthSession>>,
    pub show_menu: bool,
}

impl<Api> Default for RootState<Api> {
    fn default() -> Self {
        Self {
            api: None,
            auth: None,
            show_menu: false,
        }
    }
}

impl<Api> std::fmt::Debug for RootState<Api> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootState")
            .field("api", &self.api.is_some())
            .field("auth", &self.auth.is_some())
            .field("show_menu", &self.show_menu)
            .finish()
    }
}

/// The closed action space; anything else simply does not exist.
pub enum SessionAction<Api> {
    /// Swap in a freshly authenticated API/auth pair.
    InitializeApi {
        api: Api,
        auth: Box<dyn AuthSession>,
    },
    /// Release the auth session and clear both handles.
    LogOut,
    OpenMenu,
    CloseMenu,
}

/// Apply one action to the session state.
pub fn reduce<Api>(state: &mut RootState<Api>, action: SessionAction<Api>) {
    match action {
        SessionAction::InitializeApi { api, auth } => {
            // A replaced session is still released first.
            if let Some(mut old) = state.auth.take() {
                old.log_out();
            }
            state.api = Some(api);
            state.auth = Some(auth);
        }
        SessionAction::LogOut => {
            // Move the session out, release it, and only then let it drop.
            if let Some(mut auth) = state.auth.take() {
                auth.log_out();
            }
            state.api = None;
        }
        SessionAction::OpenMenu => state.show_menu = true,
        SessionAction::CloseMenu => state.show_menu = false,
    }
}
