use crate::CLAP_STYLING;
use clap::{ArgAction, arg, command};
use std::path::PathBuf;
use url::Url;

const CATEGORIES: [&str; 3] = ["resource", "network", "data"];
const VIEW_MODES: [&str; 6] = [
    "container-grouped",
    "linear-flow",
    "hierarchical",
    "vpc",
    "service",
    "account",
];

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("skymap")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("skymap")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            backend_args(credential_args(view_args(export_args(
                command!("enumerate").about(
                    "Enumerate an account through the backend and summarize the topology",
                ),
            ))))
            .arg(
                arg!(--"save" <PATH>)
                    .required(false)
                    .help("Write the raw enumeration response to this file")
                    .value_parser(clap::value_parser!(PathBuf)),
            ),
        )
        .subcommand(
            view_args(export_args(
                command!("render")
                    .about("Render a saved enumeration response to PNG, SVG or JSON")
                    .arg(input_arg().required(true)),
            ))
            .arg(settings_arg()),
        )
        .subcommand(
            command!("inspect")
                .about("Print the inspector view of one element from a saved response")
                .arg(input_arg().required(true))
                .arg(
                    arg!(--"id" <ID>)
                        .required(true)
                        .help("Node or edge id to inspect"),
                )
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print the element as JSON instead of key/value lines")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(backend_args(credential_args(
            command!("ui")
                .about("Launch the interactive topology explorer")
                .arg(input_arg().required(false)),
        )))
}

fn settings_arg() -> clap::Arg {
    arg!(--"settings" <PATH>)
        .required(false)
        .help("Settings file (default: ~/.config/skymap/settings.toml)")
        .value_parser(clap::value_parser!(PathBuf))
}

fn input_arg() -> clap::Arg {
    arg!(-i --"input" <PATH>)
        .help("A saved enumeration response (JSON)")
        .value_parser(clap::value_parser!(PathBuf))
}

fn backend_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(settings_arg()).arg(
        arg!(--"endpoint" <URL>)
            .required(false)
            .help("Enumeration backend base URL (overrides settings)")
            .value_parser(clap::value_parser!(Url)),
    )
}

fn credential_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(--"profile" <NAME>)
            .required(false)
            .help("Named credentials profile"),
    )
    .arg(
        arg!(--"access-key-id" <KEY>)
            .required(false)
            .help("Static access key id")
            .requires("secret-access-key"),
    )
    .arg(
        arg!(--"secret-access-key" <SECRET>)
            .required(false)
            .help("Static secret access key")
            .requires("access-key-id"),
    )
    .arg(
        arg!(--"session-token" <TOKEN>)
            .required(false)
            .help("Session token for temporary credentials"),
    )
    .arg(
        arg!(--"assume-roles" <ARNS>)
            .required(false)
            .help("Comma-separated role ARNs to assume"),
    )
    .arg(
        arg!(--"regions" <REGIONS>)
            .required(false)
            .help("Comma-separated regions, or ALL")
            .default_value("ALL"),
    )
}

fn view_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(--"view" <MODE>)
            .required(false)
            .help("View mode (overrides settings)")
            .value_parser(VIEW_MODES),
    )
    .arg(
        arg!(--"hide" <CATEGORY>)
            .required(false)
            .help("Hide an edge category; may be repeated")
            .value_parser(CATEGORIES)
            .action(ArgAction::Append),
    )
    .arg(
        arg!(--"search" <TEXT>)
            .required(false)
            .help("Highlight matching nodes and their neighbours"),
    )
}

fn export_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-o --"output" <PATH>)
            .required(false)
            .help("Export file (default: timestamped name in the current directory)")
            .value_parser(clap::value_parser!(PathBuf)),
    )
    .arg(
        arg!(-f --"format" <FORMAT>)
            .required(false)
            .help("Export format: png, svg, json (default: from --output, else png)")
            .value_parser(["png", "svg", "json"]),
    )
}
