use tracing::{error, info};

use crate::domain::{Destination, Notice};
use crate::use_cases::bridge::{LoadingGuard, SessionBridge};

const SIGN_OUT_SUCCESS: &str = "Successfully signed out";
const SIGN_OUT_FAILURE: &str = "Error during sign out";

impl SessionBridge {
    /// Signs out and always lands on the login destination.
    ///
    /// Local state is cleared even when the provider call fails; that
    /// failure is reported to the user and logged, not returned.
    #[tracing::instrument(name = "sign_out", skip_all)]
    pub async fn sign_out(&self) -> Destination {
        info!("attempting sign out");
        let _loading = LoadingGuard::engage(&self.state);

        let result = self.provider.sign_out().await;

        self.state
            .send_modify(|snapshot| snapshot.replace_session(None));

        match result {
            Ok(()) => {
                info!("sign out successful");
                self.notifier.notify(Notice::success(SIGN_OUT_SUCCESS));
            }
            Err(err) => {
                error!(error = %err, "sign out failed; local session cleared anyway");
                self.notifier.notify(Notice::error(SIGN_OUT_FAILURE));
            }
        }

        Destination::Login
    }
}
