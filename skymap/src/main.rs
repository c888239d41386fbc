use colored::Colorize;
use commands::command_argument_builder;
use skymap::handlers::{handle_enumerate, handle_inspect, handle_render, handle_ui};
use skymap_core::print_banner;
use tracing_subscriber::EnvFilter;

mod commands;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    if !quiet {
        print_banner();
    }

    let result = match chosen_command.subcommand() {
        // The explorer owns the terminal, so no log output there
        Some(("ui", primary_command)) => handle_ui(primary_command),
        Some((name, primary_command)) => {
            init_tracing();
            match name {
                "enumerate" => handle_enumerate(primary_command).await,
                "render" => handle_render(primary_command),
                "inspect" => handle_inspect(primary_command),
                _ => unreachable!("clap should ensure we don't get here"),
            }
        }
        // No subcommand provided, just show the banner
        None => return,
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
