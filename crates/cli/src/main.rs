//! cartsync CLI - Drive the cart reconciler from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the current cart
//! cartsync show
//!
//! # Add, change and remove lines
//! cartsync add var_123 -q 2 --name "Canvas Tote" --price 12.50 --stock 8
//! cartsync update guest-6f1c... 5
//! cartsync remove guest-6f1c...
//!
//! # Merge the guest cart after signing in
//! cartsync merge
//! ```
//!
//! # Commands
//!
//! - `show` - Print the authoritative cart
//! - `add` / `update` / `remove` / `clear` - Change the cart
//! - `coupon apply` / `coupon remove` - Manage the coupon (signed-in only)
//! - `merge` - Merge the guest cart into the signed-in user's cart
//! - `reset` - Forget the guest cart and any loaded server cart
//!
//! Whether the CLI acts as a guest or as a signed-in user is decided by
//! `CARTSYNC_USER_ID`; see [`cartsync_client::config`].

#![cfg_attr(not(test), forbid(unsafe_code))]

use cartsync_client::ClientConfig;
use clap::{Parser, Subcommand};

mod commands;
mod telemetry;

use commands::CommandError;
use commands::cart::AddArgs;

#[derive(Parser)]
#[command(name = "cartsync")]
#[command(author, version, about = "Guest and signed-in cart client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current cart
    Show,
    /// Add a variant to the cart
    Add(AddArgs),
    /// Set the quantity of a cart line
    Update {
        /// Cart line ID
        item: String,

        /// New quantity (guest quantities are clamped into range)
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a cart line
    Remove {
        /// Cart line ID
        item: String,
    },
    /// Remove every line
    Clear,
    /// Manage the applied coupon
    Coupon {
        #[command(subcommand)]
        action: CouponAction,
    },
    /// Merge the guest cart into the signed-in user's cart
    Merge,
    /// Forget the guest cart and the loaded server cart
    Reset,
}

#[derive(Subcommand)]
enum CouponAction {
    /// Apply a coupon code
    Apply {
        /// Coupon code
        code: String,
    },
    /// Remove the applied coupon
    Remove,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            telemetry::init_tracing(false);
            tracing::error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let sentry_guard = telemetry::init_sentry(config.sentry_dsn.as_deref());
    telemetry::init_tracing(config.log_json);

    let result = run(cli, &config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        // Flush pending Sentry events before exiting
        drop(sentry_guard);
        std::process::exit(e.exit_code());
    }
}

#[allow(clippy::print_stdout)]
async fn run(cli: Cli, config: &ClientConfig) -> Result<(), CommandError> {
    let mut cart = commands::cart::open(config)?;

    match cli.command {
        Commands::Show => commands::cart::show(&mut cart).await?,
        Commands::Add(args) => commands::cart::add(&mut cart, args).await?,
        Commands::Update { item, quantity } => {
            commands::cart::update(&mut cart, &item, quantity).await?;
        }
        Commands::Remove { item } => commands::cart::remove(&mut cart, &item).await?,
        Commands::Clear => commands::cart::clear(&mut cart).await?,
        Commands::Coupon { action } => match action {
            CouponAction::Apply { code } => commands::cart::apply_coupon(&mut cart, &code).await?,
            CouponAction::Remove => commands::cart::remove_coupon(&mut cart).await?,
        },
        Commands::Merge => {
            let report = commands::cart::merge(&mut cart).await?;
            print!("{}", commands::render::merge_report(&report));
        }
        Commands::Reset => commands::cart::reset(&mut cart),
    }

    print!("{}", commands::render::cart(&cart));
    Ok(())
}
