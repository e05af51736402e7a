use chunkwise_config::AppConfig;

/// Print the startup banner with a config summary.
pub fn print_banner(config: &AppConfig, migrations: &[&str]) {
    let version = env!("CARGO_PKG_VERSION");
    let url = format!("http://{}:{}", config.gateway.host, config.gateway.port);

    let db_path = config.database.resolved_path();
    let db_display = match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => db_path.to_string_lossy().replace(&home, "~"),
        _ => db_path.to_string_lossy().to_string(),
    };

    let admins = config
        .gateway
        .api_keys
        .iter()
        .filter(|k| k.role == chunkwise_config::ApiKeyRole::Admin)
        .count();
    let keys = match config.gateway.api_keys.len() {
        0 => "none (all requests rejected)".to_string(),
        n => format!("{n} ({admins} admin)"),
    };

    let width = 72;
    let inner = width - 4;
    let title = format!("chunkwise v{version}");
    let top = format!("╭─── {title} {}╮", "─".repeat(width - 7 - title.chars().count()));
    let bottom = format!("╰{}╯", "─".repeat(width - 2));
    let row = |text: &str| {
        let text: String = text.chars().take(inner).collect();
        format!("│ {text:<inner$} │")
    };

    println!("{top}");
    println!("{}", row(""));
    println!("{}", row(&format!("Gateway      {url}")));
    println!("{}", row(&format!("Database     {db_display}")));
    println!("{}", row(&format!("Default      {}", config.default_migration)));
    println!("{}", row(&format!("Migrations   {}", migrations.join(", "))));
    println!("{}", row(&format!("API keys     {keys}")));
    println!("{}", row(""));
    println!("{}", row("Press Ctrl+C to stop"));
    println!("{bottom}");
}
