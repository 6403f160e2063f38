//! `affil` -- operational CLI for the Rentora affiliate engine.
//!
//! Each subcommand maps 1:1 onto an engine operation: tracking clicks,
//! linking signups, recording payments, and managing payouts. Handy for
//! ops work and for exercising the engine against a local database.

#![allow(clippy::print_stdout)]

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use affil_core::config::{load_config, Config};

use affil_engine::affiliates::{referral_url, ProgramAdmin};
use affil_engine::attribution::SignupLinker;
use affil_engine::clicks::ClickTracker;
use affil_engine::commission::{AccrualEngine, PaymentEvent};
use affil_engine::payout::PayoutOrchestrator;
use affil_engine::storage::{
    AffiliateStatus, ClickContext, Database, NewAffiliate, PayoutMethod, PayoutStatus,
};
use affil_engine::token::FileTokenStore;

#[derive(Parser, Debug)]
#[command(name = "affil")]
#[command(version, about = "Rentora affiliate engine CLI")]
struct Args {
    /// Database file path
    #[arg(long, env = "AFFIL_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Attribution token file (stand-in for browser-local storage)
    #[arg(long, env = "AFFIL_TOKEN_PATH")]
    token_path: Option<PathBuf>,

    /// Public origin for shareable referral links
    #[arg(long, env = "AFFIL_ORIGIN")]
    origin: Option<String>,

    /// Log level filter (e.g. "info", "debug", "warn")
    #[arg(long, env = "AFFIL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output logs as JSON (for structured log aggregation)
    #[arg(long, env = "AFFIL_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit an affiliate application
    Apply {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        organization_id: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "paypal", value_parser = parse_payout_method)]
        payout_method: PayoutMethod,
        #[arg(long)]
        payout_destination: String,
    },
    /// Approve a pending application, or reinstate a suspended affiliate
    Approve { affiliate_id: String },
    /// Suspend an approved affiliate
    Suspend { affiliate_id: String },
    /// Show an affiliate with its shareable referral link
    Show { affiliate_id: String },
    /// Track an inbound ?ref=CODE visit
    TrackClick {
        code: String,
        #[arg(long, default_value = "/register")]
        landing_page: String,
        #[arg(long)]
        referrer_url: Option<String>,
        #[arg(long)]
        user_agent: Option<String>,
        #[arg(long)]
        ip_address: Option<String>,
    },
    /// Link a signup to a referral (uses the stored token unless --click-id is given)
    LinkSignup {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        organization_id: String,
        #[arg(long)]
        click_id: Option<String>,
    },
    /// Record a billing payment event (amount in cents)
    RecordPayment {
        #[arg(long)]
        organization_id: String,
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        billing_month: String,
    },
    /// Request a payout of the full pending balance
    RequestPayout { affiliate_id: String },
    /// List an affiliate's payouts, newest first
    Payouts {
        affiliate_id: String,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Apply an external processor's payout status transition
    AdvancePayout {
        payout_id: String,
        #[arg(value_parser = parse_payout_status)]
        status: PayoutStatus,
        #[arg(long)]
        txn_id: Option<String>,
    },
    /// Show or change program settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print the current program settings
    Show,
    /// Update program settings (only the given fields change)
    Set {
        #[arg(long)]
        rate_bps: Option<i64>,
        #[arg(long, value_parser = ["one_time", "recurring"])]
        commission_type: Option<String>,
        #[arg(long, conflicts_with = "unlimited_months")]
        recurring_months: Option<i64>,
        /// Remove the recurring-month cap
        #[arg(long)]
        unlimited_months: bool,
        #[arg(long)]
        window_days: Option<i64>,
        #[arg(long)]
        minimum_payout: Option<i64>,
        #[arg(long)]
        payout_schedule: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },
}

fn parse_payout_method(s: &str) -> Result<PayoutMethod, String> {
    PayoutMethod::parse(s).ok_or_else(|| format!("unknown payout method: {s}"))
}

/// Process-level settings after layering CLI arguments (and their env
/// fallbacks) over the resolved config files.
struct ProcessSettings {
    db_path: Option<PathBuf>,
    token_path: Option<PathBuf>,
    origin: String,
    log_level: String,
    log_json: bool,
}

/// Arguments win over config files; the config layer supplies anything
/// left unset, falling through to its own built-in defaults.
fn layer_over_config(args: &Args, config: Config) -> ProcessSettings {
    ProcessSettings {
        db_path: args.db_path.clone().or(config.engine.database_path),
        token_path: args.token_path.clone().or(config.tracker.token_path),
        origin: args.origin.clone().unwrap_or(config.tracker.public_origin),
        log_level: args.log_level.clone().unwrap_or(config.engine.log_level),
        log_json: args.log_json || config.engine.log_json,
    }
}

fn parse_payout_status(s: &str) -> Result<PayoutStatus, String> {
    PayoutStatus::parse(s).ok_or_else(|| format!("unknown payout status: {s}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(std::env::current_dir().ok().as_deref())?;
    let settings = layer_over_config(&args, config);

    let log_filter = format!("affil={0},affil_engine={0}", settings.log_level);
    affil_core::tracing_init::init_tracing(&log_filter, settings.log_json);

    let db_path = match settings.db_path {
        Some(path) => path,
        None => affil_core::config::default_database_path()
            .context("Cannot determine home directory for the default database path")?,
    };
    info!(path = %db_path.display(), "Opening affiliate database");
    let db = Database::open(&db_path).await?;

    let token_store = FileTokenStore::new(match settings.token_path {
        Some(path) => path,
        None => default_token_path()?,
    });

    match args.command {
        Command::Apply {
            user_id,
            organization_id,
            email,
            payout_method,
            payout_destination,
        } => {
            let admin = ProgramAdmin::new(db);
            let affiliate = admin
                .apply(&NewAffiliate {
                    user_id,
                    organization_id,
                    email,
                    payout_method,
                    payout_destination,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&affiliate)?);
        }
        Command::Approve { affiliate_id } => {
            let admin = ProgramAdmin::new(db);
            let affiliate = admin
                .set_status(&affiliate_id, AffiliateStatus::Approved)
                .await?;
            println!("{}", serde_json::to_string_pretty(&affiliate)?);
        }
        Command::Suspend { affiliate_id } => {
            let admin = ProgramAdmin::new(db);
            let affiliate = admin
                .set_status(&affiliate_id, AffiliateStatus::Suspended)
                .await?;
            println!("{}", serde_json::to_string_pretty(&affiliate)?);
        }
        Command::Show { affiliate_id } => {
            let admin = ProgramAdmin::new(db);
            let affiliate = admin.get(&affiliate_id).await?;
            let link = referral_url(&settings.origin, &affiliate.referral_code);
            println!("{}", serde_json::to_string_pretty(&affiliate)?);
            println!("referral link: {link}");
        }
        Command::TrackClick {
            code,
            landing_page,
            referrer_url,
            user_agent,
            ip_address,
        } => {
            let tracker = ClickTracker::new(db);
            let ctx = ClickContext {
                landing_page,
                referrer_url,
                user_agent,
                ip_address,
            };
            match tracker.track_click(&token_store, &code, &ctx).await {
                Some(click_id) => println!("tracked: {click_id}"),
                None => println!("not tracked (invalid code or storage failure)"),
            }
        }
        Command::LinkSignup {
            user_id,
            organization_id,
            click_id,
        } => {
            let linker = SignupLinker::new(db);
            let linked = match click_id {
                Some(click_id) => {
                    linker
                        .track_signup(&click_id, &user_id, &organization_id)
                        .await?
                }
                None => {
                    linker
                        .track_signup_from_token(&token_store, &user_id, &organization_id)
                        .await?
                }
            };
            if linked {
                println!("signup linked");
            } else {
                println!("no-op (no token, or referral already converted)");
            }
        }
        Command::RecordPayment {
            organization_id,
            amount,
            billing_month,
        } => {
            let engine = AccrualEngine::new(db);
            let commission = engine
                .record_payment(&PaymentEvent {
                    organization_id,
                    amount,
                    billing_month,
                })
                .await?;
            match commission {
                Some(c) => println!("{}", serde_json::to_string_pretty(&c)?),
                None => println!("no commission accrued"),
            }
        }
        Command::RequestPayout { affiliate_id } => {
            let orchestrator = PayoutOrchestrator::new(db);
            let payout = orchestrator.request_payout(&affiliate_id).await?;
            println!("{}", serde_json::to_string_pretty(&payout)?);
        }
        Command::Payouts {
            affiliate_id,
            limit,
            offset,
        } => {
            let orchestrator = PayoutOrchestrator::new(db);
            let payouts = orchestrator.get_payouts(&affiliate_id, limit, offset).await?;
            println!("{}", serde_json::to_string_pretty(&payouts)?);
        }
        Command::AdvancePayout {
            payout_id,
            status,
            txn_id,
        } => {
            let orchestrator = PayoutOrchestrator::new(db);
            let payout = orchestrator
                .advance_payout(&payout_id, status, txn_id.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&payout)?);
        }
        Command::Settings { action } => match action {
            SettingsAction::Show => {
                let settings = db.get_settings().await?;
                println!("{}", serde_json::to_string_pretty(&settings)?);
            }
            SettingsAction::Set {
                rate_bps,
                commission_type,
                recurring_months,
                unlimited_months,
                window_days,
                minimum_payout,
                payout_schedule,
                active,
            } => {
                let mut settings = db.get_settings().await?;
                if let Some(v) = rate_bps {
                    settings.commission_rate_bps = v;
                }
                if let Some(v) = commission_type {
                    settings.commission_type = v;
                }
                if let Some(v) = recurring_months {
                    settings.recurring_months = Some(v);
                }
                if unlimited_months {
                    settings.recurring_months = None;
                }
                if let Some(v) = window_days {
                    settings.attribution_window_days = v;
                }
                if let Some(v) = minimum_payout {
                    settings.minimum_payout = v;
                }
                if let Some(v) = payout_schedule {
                    settings.payout_schedule = v;
                }
                if let Some(v) = active {
                    settings.program_active = i64::from(v);
                }
                db.save_settings(&settings).await?;
                let settings = db.get_settings().await?;
                println!("{}", serde_json::to_string_pretty(&settings)?);
            }
        },
    }

    Ok(())
}

/// Default attribution token path: ~/.affil/referral.json
fn default_token_path() -> anyhow::Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".affil").join("referral.json"))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn bare_args() -> Args {
        Args {
            db_path: None,
            token_path: None,
            origin: None,
            log_level: None,
            log_json: false,
            command: Command::Show {
                affiliate_id: "aff-1".to_string(),
            },
        }
    }

    #[test]
    fn config_fills_unset_arguments() {
        let mut config = Config::default();
        config.engine.database_path = Some(PathBuf::from("/tmp/custom.db"));
        config.engine.log_level = "debug".to_string();
        config.engine.log_json = true;

        let settings = layer_over_config(&bare_args(), config);
        assert_eq!(settings.db_path.as_deref(), Some(Path::new("/tmp/custom.db")));
        assert_eq!(settings.log_level, "debug");
        assert!(settings.log_json);
        // Built-in default survives when neither layer sets the origin
        assert_eq!(settings.origin, "https://app.rentora.io");
    }

    #[test]
    fn arguments_win_over_config() {
        let mut config = Config::default();
        config.engine.database_path = Some(PathBuf::from("/tmp/from-config.db"));
        config.engine.log_level = "debug".to_string();
        config.tracker.public_origin = "https://config.example".to_string();

        let mut args = bare_args();
        args.db_path = Some(PathBuf::from("/tmp/from-args.db"));
        args.log_level = Some("warn".to_string());
        args.origin = Some("https://args.example".to_string());

        let settings = layer_over_config(&args, config);
        assert_eq!(settings.db_path.as_deref(), Some(Path::new("/tmp/from-args.db")));
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.origin, "https://args.example");
    }
}
