use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::flow::{DialogFlow, DialogKind};

/// Dialogs reachable from the account row on the getting-started page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountDialog {
    None,
    Entry,
    Create,
    SignIn,
    ForgotPassword,
}

impl DialogKind for AccountDialog {
    const NONE: Self = AccountDialog::None;

    fn back_target(self) -> Option<Self> {
        match self {
            AccountDialog::Create | AccountDialog::SignIn => Some(AccountDialog::Entry),
            AccountDialog::ForgotPassword => Some(AccountDialog::SignIn),
            AccountDialog::None | AccountDialog::Entry => None,
        }
    }
}

/// Identity shown on the row once the user has signed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub display_name: String,
    pub email: String,
}

/// Events emitted by the individual account dialogs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AccountDialogEvent {
    /// Close button or escape on any dialog.
    Close,
    /// Entry dialog.
    CreateButtonClicked,
    /// Entry dialog.
    SelfCustodyButtonClicked,
    /// Entry dialog.
    SignInButtonClicked,
    /// Create, sign-in and forgot-password dialogs.
    BackButtonClicked,
    /// Create dialog.
    CreateAccountButtonClicked,
    /// Sign-in dialog.
    ForgotPasswordButtonClicked,
    /// Sign-in dialog, after the credentials were accepted.
    SignInSubmitted(AccountProfile),
    /// Forgot-password dialog.
    CancelButtonClicked,
}

/// Style of the row's action button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonKind {
    Filled,
    Outline,
}

/// Render data for the account row itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSummary {
    pub title: String,
    pub description: String,
    pub button_label: String,
    pub button_kind: ButtonKind,
}

const ROW_TITLE_KEY: &str = "braveAccountRowTitle";
const ROW_DESCRIPTION_KEY: &str = "braveAccountRowDescription";
const GET_STARTED_LABEL_KEY: &str = "braveAccountGetStartedButtonLabel";
const MANAGE_ACCOUNT_LABEL_KEY: &str = "braveAccountManageAccountButtonLabel";

/// Controller behind the settings account row and its dialog chain.
#[derive(Debug, Default)]
pub struct AccountRow {
    dialogs: DialogFlow<AccountDialog>,
    profile: Option<AccountProfile>,
}

impl AccountRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dialog(&self) -> AccountDialog {
        self.dialogs.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<AccountDialog> {
        self.dialogs.subscribe()
    }

    pub fn is_signed_in(&self) -> bool {
        self.profile.is_some()
    }

    pub fn profile(&self) -> Option<&AccountProfile> {
        self.profile.as_ref()
    }

    /// The row's button: "get started" opens the entry dialog, "manage
    /// account" signs the user out.
    pub fn press_row_button(&mut self) {
        if let Some(profile) = self.profile.take() {
            info!(target: "dialog_flow", email = %profile.email, "signed out from account row");
        } else {
            self.dialogs.open(AccountDialog::Entry);
        }
    }

    /// Apply an event raised by the visible dialog.
    ///
    /// Returns `false` when the event does not belong to the dialog that is
    /// currently shown; such events leave the row untouched.
    pub fn handle(&mut self, event: AccountDialogEvent) -> bool {
        use AccountDialog as D;
        use AccountDialogEvent as E;

        let current = self.dialogs.current();
        match (current, event) {
            (D::None, event) => {
                debug!(target: "dialog_flow", ?event, "event with no dialog visible");
                false
            }
            (_, E::Close) => {
                self.dialogs.close();
                true
            }
            (D::Entry, E::CreateButtonClicked) => {
                self.dialogs.open(D::Create);
                true
            }
            (D::Entry, E::SelfCustodyButtonClicked) => {
                self.dialogs.close();
                true
            }
            (D::Entry, E::SignInButtonClicked) => {
                self.dialogs.open(D::SignIn);
                true
            }
            (D::Create | D::SignIn | D::ForgotPassword, E::BackButtonClicked)
            | (D::ForgotPassword, E::CancelButtonClicked) => {
                self.dialogs.back();
                true
            }
            (D::Create, E::CreateAccountButtonClicked) => {
                self.dialogs.close();
                true
            }
            (D::SignIn, E::ForgotPasswordButtonClicked) => {
                self.dialogs.open(D::ForgotPassword);
                true
            }
            (D::SignIn, E::SignInSubmitted(profile)) => {
                self.dialogs.close();
                info!(target: "dialog_flow", email = %profile.email, "signed in from account row");
                self.profile = Some(profile);
                true
            }
            (dialog, event) => {
                debug!(target: "dialog_flow", ?dialog, ?event, "event ignored by dialog");
                false
            }
        }
    }

    pub fn summary(&self) -> RowSummary {
        match &self.profile {
            Some(profile) => RowSummary {
                title: profile.display_name.clone(),
                description: profile.email.clone(),
                button_label: MANAGE_ACCOUNT_LABEL_KEY.to_string(),
                button_kind: ButtonKind::Outline,
            },
            None => RowSummary {
                title: ROW_TITLE_KEY.to_string(),
                description: ROW_DESCRIPTION_KEY.to_string(),
                button_label: GET_STARTED_LABEL_KEY.to_string(),
                button_kind: ButtonKind::Filled,
            },
        }
    }
}
