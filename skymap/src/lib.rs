pub mod handlers;

// Re-export the pieces the binary and tests reach for
pub use handlers::{
    CredentialArgs, apply_view_args, build_request, default_export_path, export_view,
    format_finding_line, load_response_file, load_settings, resolve_export_target,
};
