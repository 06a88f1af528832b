pub mod bootstrap;
pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand};

use cartstore_core::{ProductId, UpdateProductAmount};
use commands::cart::CartAction;
use commands::CommandResult;

#[derive(Debug, Parser)]
#[command(
    name = "cartstore",
    about = "Cartstore shopping-cart CLI",
    long_about = "Inspect and change the persisted shopping cart, validated against the inventory service.",
    after_help = "Examples:\n  cartstore add 1\n  cartstore update 1 3\n  cartstore show\n  cartstore doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Print the current cart with totals")]
    Show,
    #[command(about = "Add one unit of a product, checking stock first")]
    Add { product_id: u64 },
    #[command(about = "Remove a product from the cart")]
    Remove { product_id: u64 },
    #[command(about = "Set the quantity of a product already in the cart")]
    Update { product_id: u64, amount: u32 },
    #[command(about = "Remove every product from the cart")]
    Clear,
    #[command(about = "Apply pending storage migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, storage connectivity and inventory reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> CommandResult {
    let cli = Cli::parse();
    logging::init_from_env();

    match cli.command {
        Command::Show => commands::cart::run(CartAction::Show),
        Command::Add { product_id } => commands::cart::run(CartAction::Add(ProductId(product_id))),
        Command::Remove { product_id } => {
            commands::cart::run(CartAction::Remove(ProductId(product_id)))
        }
        Command::Update { product_id, amount } => {
            commands::cart::run(CartAction::Update(UpdateProductAmount {
                product_id: ProductId(product_id),
                amount,
            }))
        }
        Command::Clear => commands::cart::run(CartAction::Clear),
        Command::Migrate => commands::migrate::run(),
        Command::Config => CommandResult { exit_code: 0, output: commands::config::run() },
        Command::Doctor { json } => {
            CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    }
}
