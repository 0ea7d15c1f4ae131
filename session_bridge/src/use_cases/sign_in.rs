use tracing::{error, info, warn};

use crate::domain::{AuthError, Destination, Notice};
use crate::use_cases::bridge::{LoadingGuard, SessionBridge};

const SIGN_IN_SUCCESS: &str = "Successfully signed in!";

impl SessionBridge {
    /// Signs in with email and password.
    ///
    /// Returns where the UI should navigate next. Every failure produces one
    /// error notice and is then handed back to the caller unchanged.
    #[tracing::instrument(name = "sign_in", skip_all, fields(email = %email))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Destination, AuthError> {
        let offline = self
            .connectivity
            .as_ref()
            .is_some_and(|connectivity| !connectivity.is_connected());
        if offline {
            warn!("sign in refused while auth service is unreachable");
            let err = AuthError::Offline;
            self.notifier.notify(Notice::error(err.sign_in_message()));
            return Err(err);
        }

        info!("attempting sign in");
        let _loading = LoadingGuard::engage(&self.state);

        match self.provider.sign_in_with_password(email, password).await {
            Ok(session) => {
                let destination = match &self.roles {
                    Some(roles) if roles.is_admin(&session.user) => Destination::Admin,
                    _ => Destination::Home,
                };
                self.state
                    .send_modify(|snapshot| snapshot.replace_session(Some(session)));

                info!(?destination, "sign in successful");
                self.notifier.notify(Notice::success(SIGN_IN_SUCCESS));
                Ok(destination)
            }
            Err(err) => {
                error!(error = %err, "sign in failed");
                self.notifier.notify(Notice::error(err.sign_in_message()));
                Err(err)
            }
        }
    }
}
