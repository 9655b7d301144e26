use std::{env, env::VarError};

/// The server takes no arguments. Any argument prints the help text and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Secrets (FSS_JWT_SECRET, FSS_WEBHOOK_HMAC_SECRET, FSS_MP_ACCESS_TOKEN) are never printed.
    const DISPLAY_ENVS: [&str; 9] = [
        "RUST_LOG",
        "FSS_HOST",
        "FSS_PORT",
        "FSS_DATABASE_URL",
        "FSS_WEBHOOK_HMAC_CHECKS",
        "FSS_PENDING_ORDER_TIMEOUT",
        "FSS_EXPIRY_CHECK_INTERVAL",
        "FSS_MP_BASE_URL",
        "FSS_MP_TIMEOUT",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
