//! Driver for the browser flow controllers.
//!
//! Scripts the account-row dialogs or a paywall purchase/restore against a
//! simulated store and prints the resulting state as JSON.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use dialog_flow::{AccountDialogEvent, AccountProfile, AccountRow};
use paywall::{
    LogAlertPresenter, PaywallConfig, PaywallHost, PaywallScreen, SimulatedStore, StoreBehaviour,
    SubscriptionTier,
};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Command-line arguments for the flow driver
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay account-row dialog events
    Account {
        /// JSON file with an array of dialog events; a sign-in walkthrough
        /// is used when omitted
        #[arg(long)]
        script: Option<PathBuf>,
    },
    /// Buy a subscription tier through the simulated store
    Purchase {
        #[arg(long, value_enum, default_value_t = TierArg::Yearly)]
        tier: TierArg,

        #[command(flatten)]
        store: StoreArgs,
    },
    /// Restore purchases through the simulated store
    Restore {
        #[command(flatten)]
        store: StoreArgs,
    },
}

#[derive(clap::Args, Debug)]
struct StoreArgs {
    /// How the simulated store answers
    #[arg(long, value_enum, default_value_t = OutcomeArg::Success)]
    outcome: OutcomeArg,

    /// Seconds before the simulated store answers
    #[arg(long, default_value_t = 2)]
    respond_after: u64,

    /// Paywall configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Mark the receipt as requiring backend validation
    #[arg(long, default_value_t = false)]
    validate_receipt: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TierArg {
    Yearly,
    Monthly,
}

impl From<TierArg> for SubscriptionTier {
    fn from(arg: TierArg) -> Self {
        match arg {
            TierArg::Yearly => SubscriptionTier::Yearly,
            TierArg::Monthly => SubscriptionTier::Monthly,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutcomeArg {
    Success,
    Fail,
    Cancel,
    Silent,
}

impl StoreArgs {
    fn behaviour(&self) -> StoreBehaviour {
        let after = Duration::from_secs(self.respond_after);
        match self.outcome {
            OutcomeArg::Success => StoreBehaviour::Respond {
                after,
                outcome: Ok(paywall::Receipt {
                    transaction_id: "simulated".into(),
                    validation_required: self.validate_receipt,
                }),
            },
            OutcomeArg::Fail => StoreBehaviour::fail_after(after, "simulated store failure"),
            OutcomeArg::Cancel => StoreBehaviour::cancel_after(after),
            OutcomeArg::Silent => StoreBehaviour::Silent,
        }
    }

    fn load_config(&self) -> anyhow::Result<PaywallConfig> {
        match &self.config {
            Some(path) => PaywallConfig::load(path)
                .with_context(|| format!("loading paywall config {}", path.display())),
            None => Ok(PaywallConfig::default()),
        }
    }
}

/// Host that only logs what the browser would do.
struct LogHost;

impl PaywallHost for LogHost {
    fn install_vpn_profile(&self) {
        info!(target: "paywall", "installing VPN profile");
    }

    fn open_vpn_authentication(&self) {
        info!(target: "paywall", "opening VPN authentication tab");
    }

    fn present_code_redemption(&self) {
        info!(target: "paywall", "presenting code redemption sheet");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt().with_env_filter(filter).init();

    match args.command {
        Commands::Account { script } => run_account(script)?,
        Commands::Purchase { tier, store } => {
            run_paywall(&store, Some(tier.into())).await?
        }
        Commands::Restore { store } => run_paywall(&store, None).await?,
    }

    Ok(())
}

fn run_account(script: Option<PathBuf>) -> anyhow::Result<()> {
    let events: Vec<AccountDialogEvent> = match script {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => vec![
            AccountDialogEvent::SignInButtonClicked,
            AccountDialogEvent::ForgotPasswordButtonClicked,
            AccountDialogEvent::CancelButtonClicked,
            AccountDialogEvent::SignInSubmitted(AccountProfile {
                display_name: "Jane Roe".into(),
                email: "jane@example.com".into(),
            }),
        ],
    };

    let mut row = AccountRow::new();
    row.press_row_button();
    for event in events {
        let accepted = row.handle(event.clone());
        info!(target: "dialog_flow", ?event, accepted, dialog = ?row.dialog(), "applied event");
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "dialog": row.dialog(),
            "signed_in": row.is_signed_in(),
            "row": row.summary(),
        }))?
    );
    Ok(())
}

/// Purchases `tier` when given, restores otherwise.
async fn run_paywall(store: &StoreArgs, tier: Option<SubscriptionTier>) -> anyhow::Result<()> {
    let config = store.load_config()?;
    let behaviour = store.behaviour();
    let service = Arc::new(SimulatedStore::new(behaviour.clone(), behaviour));

    let mut screen = PaywallScreen::present(
        &config,
        service,
        Arc::new(LogAlertPresenter),
        Arc::new(LogHost),
    )?;

    let generation = match tier {
        Some(tier) => {
            screen.select_tier(tier)?;
            screen.purchase().await?
        }
        None => screen.restore().await?,
    };
    info!(target: "paywall", ?generation, "operation issued");

    let snapshot = screen.handle().settled().await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "status": snapshot.status,
            "generation": snapshot.generation,
            "operation": snapshot.operation,
            "last_error": snapshot.last_error,
            "sheet": screen.sheet(),
        }))?
    );

    screen.teardown().await?;
    Ok(())
}
