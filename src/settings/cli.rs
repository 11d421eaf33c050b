use super::Parser;

/// quillpress board server.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Cli {
    /// Settings file; defaults to `settings/dev.toml` in debug builds and
    /// `settings/release.toml` otherwise.
    #[arg(long, value_name = "PATH")]
    pub settings: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_path_is_optional() {
        let cli = Cli::parse_from(["quillpress"]);
        assert!(cli.settings.is_none());
        let cli = Cli::parse_from(["quillpress", "--settings", "settings/release.toml"]);
        assert_eq!(cli.settings.as_deref(), Some("settings/release.toml"));
    }
}
