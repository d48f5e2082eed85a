use dialog_flow::{AccountDialog, AccountDialogEvent, AccountRow, DialogFlow};

/// Open entry, then create, then back lands on entry.
#[test]
fn entry_create_back_scenario() {
    let flow = DialogFlow::<AccountDialog>::new();
    flow.open(AccountDialog::Entry);
    flow.open(AccountDialog::Create);
    flow.back();
    assert_eq!(flow.current(), AccountDialog::Entry);
}

/// Renderer observes each dialog of the sign-in chain in order.
#[tokio::test]
async fn renderer_sees_every_transition() {
    let mut row = AccountRow::new();
    let mut rx = row.subscribe();

    let steps = [
        (None, AccountDialog::Entry),
        (
            Some(AccountDialogEvent::SignInButtonClicked),
            AccountDialog::SignIn,
        ),
        (
            Some(AccountDialogEvent::ForgotPasswordButtonClicked),
            AccountDialog::ForgotPassword,
        ),
        (
            Some(AccountDialogEvent::BackButtonClicked),
            AccountDialog::SignIn,
        ),
        (Some(AccountDialogEvent::Close), AccountDialog::None),
    ];

    for (event, expected) in steps {
        match event {
            None => row.press_row_button(),
            Some(event) => assert!(row.handle(event)),
        }
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), expected);
    }
}

/// Dialog events arrive from the web layer as JSON.
#[test]
fn events_decode_from_renderer_payloads() {
    let mut row = AccountRow::new();
    row.press_row_button();

    let click: AccountDialogEvent =
        serde_json::from_str(r#"{"event":"sign_in_button_clicked"}"#).unwrap();
    assert!(row.handle(click));

    let submitted: AccountDialogEvent = serde_json::from_str(
        r#"{"event":"sign_in_submitted","display_name":"Jane Roe","email":"jane@example.com"}"#,
    )
    .unwrap();
    assert!(row.handle(submitted));

    assert!(row.is_signed_in());
    assert_eq!(row.profile().unwrap().email, "jane@example.com");
    assert_eq!(
        serde_json::to_value(row.dialog()).unwrap(),
        serde_json::json!("none")
    );
}
