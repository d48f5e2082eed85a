//! Modal dialog state machines for browser settings surfaces.
//!
//! A view owns one [`DialogFlow`] per dialog chain. The flow holds exactly one
//! visible dialog (or none), exposes `open`/`back`/`close` as the only way to
//! change it, and publishes every change over a watch channel that the
//! renderer subscribes to. [`AccountRow`] wires the flow to the account sign-in
//! and creation dialogs of the getting-started page.

pub mod account;
pub mod flow;

pub use account::{
    AccountDialog, AccountDialogEvent, AccountProfile, AccountRow, ButtonKind, RowSummary,
};
pub use flow::{DialogFlow, DialogKind};
