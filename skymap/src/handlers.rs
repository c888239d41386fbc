use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Local};
use clap::ArgMatches;
use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use skymap_client::{EnumerationClient, EnumerationRequest, EnumerationResponse};
use skymap_core::findings::Finding;
use skymap_core::{
    EdgeCategory, ExportFormat, IngestOutcome, Settings, Severity, ViewMode, ViewModel,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Credential and scope flags as typed on the command line.
#[derive(Debug, Clone, Default)]
pub struct CredentialArgs<'a> {
    pub profile: Option<&'a str>,
    pub access_key_id: Option<&'a str>,
    pub secret_access_key: Option<&'a str>,
    pub session_token: Option<&'a str>,
    pub assume_roles: Option<&'a str>,
    pub regions: Option<&'a str>,
}

impl<'a> CredentialArgs<'a> {
    pub fn from_matches(args: &'a ArgMatches) -> Self {
        Self {
            profile: string_flag(args, "profile"),
            access_key_id: string_flag(args, "access-key-id"),
            secret_access_key: string_flag(args, "secret-access-key"),
            session_token: string_flag(args, "session-token"),
            assume_roles: string_flag(args, "assume-roles"),
            regions: string_flag(args, "regions"),
        }
    }
}

fn string_flag<'a>(args: &'a ArgMatches, name: &str) -> Option<&'a str> {
    args.get_one::<String>(name).map(String::as_str)
}

pub fn build_request(creds: &CredentialArgs<'_>) -> EnumerationRequest {
    EnumerationRequest::new()
        .with_profile(creds.profile)
        .with_static_credentials(
            creds.access_key_id,
            creds.secret_access_key,
            creds.session_token,
        )
        .with_assume_roles(creds.assume_roles.unwrap_or(""))
        .with_regions(creds.regions.unwrap_or(""))
}

/// Settings from `path` (or the default location) with the endpoint flag applied.
pub fn load_settings(path: Option<&PathBuf>, endpoint: Option<&Url>) -> Result<Settings> {
    let path = match path {
        Some(p) => PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref()),
        None => Settings::default_path(),
    };
    let mut settings = Settings::load(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    if let Some(endpoint) = endpoint {
        settings.backend.endpoint = endpoint.to_string();
    }
    Ok(settings)
}

pub fn load_response_file(path: &Path) -> Result<EnumerationResponse> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    EnumerationResponse::from_json(&text)
        .with_context(|| format!("{} is not an enumeration response", path.display()))
}

/// `skymap-YYYYmmdd-HHMMSS.<ext>`
pub fn default_export_path(format: ExportFormat, now: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!(
        "skymap-{}.{}",
        now.format("%Y%m%d-%H%M%S"),
        format.extension()
    ))
}

/// Explicit format wins, then the output extension, then PNG.
pub fn resolve_export_target(
    output: Option<&PathBuf>,
    format: Option<&str>,
    now: DateTime<Local>,
) -> Result<(ExportFormat, PathBuf)> {
    let format = match format {
        Some(raw) => ExportFormat::parse(raw)?,
        None => output
            .and_then(|p| ExportFormat::from_path(p))
            .unwrap_or(ExportFormat::Png),
    };
    let path = output
        .cloned()
        .unwrap_or_else(|| default_export_path(format, now));
    Ok((format, path))
}

pub fn apply_view_args(
    vm: &mut ViewModel,
    view: Option<&str>,
    hide: &[&str],
    search: Option<&str>,
) -> Result<()> {
    for raw in hide {
        let category =
            EdgeCategory::from_str(raw).ok_or_else(|| anyhow!("Unknown edge category '{}'", raw))?;
        vm.set_category(category, false);
    }
    if let Some(query) = search {
        vm.set_search(query);
    }
    if let Some(raw) = view {
        let mode = ViewMode::from_str(raw).ok_or_else(|| anyhow!("Unknown view mode '{}'", raw))?;
        if mode != vm.view_mode() {
            vm.set_view_mode(mode);
        }
    } else if !hide.is_empty() {
        // Hidden edges no longer pull their endpoints together
        vm.relayout();
    }
    Ok(())
}

fn view_args_from(args: &ArgMatches) -> (Option<&str>, Vec<&str>, Option<&str>) {
    let view = string_flag(args, "view");
    let hide = args
        .get_many::<String>("hide")
        .map(|values| values.map(String::as_str).collect())
        .unwrap_or_default();
    let search = string_flag(args, "search");
    (view, hide, search)
}

pub fn severity_label(severity: Severity) -> ColoredString {
    let label = format!("[{}]", severity);
    match severity {
        Severity::Critical => label.red().bold(),
        Severity::High => label.bright_red().bold(),
        Severity::Medium => label.yellow().bold(),
        Severity::Low => label.blue(),
        Severity::Info => label.dimmed(),
    }
}

pub fn format_finding_line(finding: &Finding) -> String {
    let mut line = format!("  {} {}", severity_label(finding.severity), finding.title);
    if let Some(id) = &finding.element_id {
        line.push_str(&format!(" ({})", id.bright_white()));
    }
    line
}

/// Summary, warnings and findings of the loaded topology.
pub fn print_ingest_report(vm: &ViewModel) {
    println!(
        "{} {}",
        "✓".green().bold(),
        vm.status().to_string().bright_white()
    );
    println!(
        "  {} view: {}",
        "→".blue(),
        vm.view_mode().as_str().bright_white()
    );

    if !vm.warnings().is_empty() {
        println!();
        println!("{} {} warning(s)", "⚠".yellow().bold(), vm.warnings().len());
        for warning in vm.warnings() {
            println!("  {} {}", "•".yellow(), warning);
        }
    }

    if !vm.findings().is_empty() {
        println!();
        println!(
            "{} {} finding(s)",
            "⚑".bright_red().bold(),
            vm.findings().total()
        );
        for finding in vm.findings().iter() {
            println!("{}", format_finding_line(finding));
        }
    }
}

pub fn export_view(vm: &mut ViewModel, format: ExportFormat, path: &Path) -> Result<usize> {
    Ok(vm.export_to(format, path)?)
}

fn export_from_args(vm: &mut ViewModel, args: &ArgMatches) -> Result<()> {
    let (format, path) = resolve_export_target(
        args.get_one::<PathBuf>("output"),
        string_flag(args, "format"),
        Local::now(),
    )?;
    let bytes = export_view(vm, format, &path)?;
    println!(
        "{} Exported {} bytes to {}",
        "✓".green().bold(),
        bytes,
        path.display().to_string().bright_white()
    );
    Ok(())
}

fn load_view(args: &ArgMatches, settings: &Settings) -> Result<ViewModel> {
    let input = args
        .get_one::<PathBuf>("input")
        .ok_or_else(|| anyhow!("--input is required"))?;
    let response = load_response_file(input)?;
    let mut vm = ViewModel::from_settings(settings);
    if let IngestOutcome::Failed(message) = vm.load_response(response) {
        bail!(message);
    }
    Ok(vm)
}

pub async fn handle_enumerate(args: &ArgMatches) -> Result<()> {
    let settings = load_settings(args.get_one::<PathBuf>("settings"), args.get_one::<Url>("endpoint"))?;
    let client = EnumerationClient::with_timeout(&settings.backend.endpoint, settings.backend.timeout_secs)?;
    let request = build_request(&CredentialArgs::from_matches(args));

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!(
        "Enumerating {} via {}",
        request.regions.join(", "),
        client.endpoint()
    ));

    let mut vm = ViewModel::from_settings(&settings);
    let ticket = vm.begin_ingestion();
    let result = client.enumerate(&request).await;
    spinner.finish_and_clear();

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            vm.complete_ingestion(ticket, Err::<EnumerationResponse, _>(e.status_text()));
            bail!("Enumeration failed: {}", vm.status());
        }
    };

    if let Some(save) = args.get_one::<PathBuf>("save") {
        let json = serde_json::to_string_pretty(&response)?;
        fs::write(save, json).with_context(|| format!("Failed to write {}", save.display()))?;
        println!(
            "{} Saved response to {}",
            "✓".green().bold(),
            save.display().to_string().bright_white()
        );
    }

    vm.complete_ingestion::<std::convert::Infallible>(ticket, Ok(response));
    let (view, hide, search) = view_args_from(args);
    apply_view_args(&mut vm, view, &hide, search)?;
    print_ingest_report(&vm);

    if args.contains_id("output") || args.contains_id("format") {
        println!();
        export_from_args(&mut vm, args)?;
    }
    Ok(())
}

pub fn handle_render(args: &ArgMatches) -> Result<()> {
    let settings = load_settings(args.get_one::<PathBuf>("settings"), None)?;
    let mut vm = load_view(args, &settings)?;
    let (view, hide, search) = view_args_from(args);
    apply_view_args(&mut vm, view, &hide, search)?;
    print_ingest_report(&vm);
    println!();
    export_from_args(&mut vm, args)
}

pub fn handle_inspect(args: &ArgMatches) -> Result<()> {
    let mut vm = load_view(args, &Settings::default())?;
    let id = args
        .get_one::<String>("id")
        .ok_or_else(|| anyhow!("--id is required"))?;
    vm.select(id)?;

    let view = vm.inspector_view();
    if args.get_flag("json") {
        println!("{}", view.to_pretty_json());
        return Ok(());
    }

    for line in view.lines() {
        println!("{}", line);
    }
    let findings: Vec<&Finding> = vm.findings().for_element(id).collect();
    if !findings.is_empty() {
        println!();
        for finding in findings {
            println!("{}", format_finding_line(finding));
        }
    }
    Ok(())
}

pub fn handle_ui(args: &ArgMatches) -> Result<()> {
    let settings = load_settings(args.get_one::<PathBuf>("settings"), args.get_one::<Url>("endpoint"))?;
    let preload = args
        .get_one::<PathBuf>("input")
        .map(|p| load_response_file(p))
        .transpose()?;
    let options = skymap_tui::TuiOptions {
        settings,
        request: build_request(&CredentialArgs::from_matches(args)),
        preload,
    };
    tokio::task::block_in_place(|| skymap_tui::run(options))
}

