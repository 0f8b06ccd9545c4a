// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};

use lazydub::app_config::{self, Config, TranslationProvider};
use lazydub::app_controller::{Controller, FileOutcome};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Gemini,
    Anthropic,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Gemini => TranslationProvider::Gemini,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// Provider selection shared by the commands that talk to a provider
#[derive(Args, Debug, Clone)]
struct ProviderArgs {
    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// API key for the selected provider
    #[arg(long)]
    api_key: Option<String>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide = true, hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide = true, hide_env_values = true)]
    anthropic_api_key: Option<String>,
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Input VTT file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Output directory (defaults to the input's directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Ignore cached translations and translate again
    #[arg(long)]
    force_retranslate: bool,

    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Remove every cached translation
    Clear,
    /// Remove expired and unreadable entries
    Cleanup,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate subtitles from English to Russian
    Translate(TranslateArgs),

    /// Check the provider connection with a test translation
    Check(ProviderArgs),

    /// Manage the translation cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Generate shell completions for lazydub
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// LazyDub - English to Russian subtitle translation
///
/// Translates WebVTT subtitles with Gemini or Anthropic models. The opening
/// minutes are translated first, the rest follows in the background, and
/// finished translations are cached.
#[derive(Parser, Debug)]
#[command(name = "lazydub")]
#[command(version)]
#[command(about = "English to Russian subtitle translation")]
#[command(long_about = "LazyDub translates WebVTT subtitles from English to Russian using AI providers.

EXAMPLES:
    lazydub translate lecture.vtt                  # Translate using default config
    lazydub translate -o out/ lecture.vtt          # Write lecture_ru.vtt into out/
    lazydub translate --force-retranslate lecture.vtt
    lazydub translate -p anthropic course/         # Translate every VTT file in a folder
    lazydub check                                  # Test the configured provider
    lazydub cache cleanup                          # Drop expired cache entries
    lazydub completions bash > lazydub.bash        # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the config file doesn't
    exist, a default one will be created automatically. API keys can also be
    provided through GEMINI_API_KEY or ANTHROPIC_API_KEY.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji and ANSI color for log level
    fn decoration_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("❌ ", "1;31"),
            Level::Warn => ("🚧 ", "1;33"),
            Level::Info => (" ", "1;32"),
            Level::Debug => ("🔍 ", "1;36"),
            Level::Trace => ("📋 ", "1;35"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (emoji, color) = Self::decoration_for_level(record.level());
            let _ = writeln!(std::io::stderr(), "\x1B[{}m{} {} {}\x1B[0m", color, now, emoji, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install with the most verbose level; the effective level is set from
    // the config or the command line below
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "lazydub", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = Config::load_or_create(&cli.config_path)?;
    if let Some(log_level) = cli.log_level {
        config.log_level = log_level.into();
    }
    log::set_max_level(LevelFilter::from(&config.log_level));

    match cli.command {
        Commands::Translate(args) => {
            apply_provider_overrides(&mut config, &args.provider);
            config.validate().context("Configuration validation failed")?;
            run_translate(config, args).await
        }
        Commands::Check(provider) => {
            apply_provider_overrides(&mut config, &provider);
            config.validate().context("Configuration validation failed")?;
            run_check(config).await
        }
        Commands::Cache { action } => {
            let controller = Controller::with_config(config)?;
            match action {
                CacheAction::Clear => controller.clear_cache(),
                CacheAction::Cleanup => controller.cleanup_cache(),
            };
            Ok(())
        }
        Commands::Completions { .. } => Ok(()),
    }
}

/// Override the config with provider options from the command line
fn apply_provider_overrides(config: &mut Config, args: &ProviderArgs) {
    if let Some(provider) = &args.provider {
        config.translation.provider = provider.clone().into();
    }

    let active = config.translation.provider.clone();
    let env_key = match active {
        TranslationProvider::Gemini => args.gemini_api_key.clone(),
        TranslationProvider::Anthropic => args.anthropic_api_key.clone(),
    };

    let provider_config = config.translation.provider_config_mut(&active);
    if let Some(model) = &args.model {
        provider_config.model = model.clone();
    }

    // Explicit flag first, then the environment, then the config file
    if let Some(api_key) = args.api_key.clone() {
        provider_config.api_key = api_key;
    } else if let Some(api_key) = env_key.filter(|k| !k.is_empty()) {
        if provider_config.api_key.is_empty() {
            provider_config.api_key = api_key;
        }
    }
}

async fn run_translate(config: Config, options: TranslateArgs) -> Result<()> {
    let controller = Controller::with_config(config)?;
    let input_path = options.input_path;

    if input_path.is_file() {
        let output_dir = options
            .output_dir
            .unwrap_or_else(|| input_path.parent().unwrap_or(Path::new(".")).to_path_buf());

        match controller
            .run(input_path.clone(), output_dir, options.force_overwrite, options.force_retranslate)
            .await?
        {
            FileOutcome::Written(path) => info!("Translation saved to {}", path.display()),
            FileOutcome::SkippedExisting(path) => info!("Existing translation kept at {}", path.display()),
            FileOutcome::AlreadyTranslated => info!("{} is already in Russian", input_path.display()),
        }
    } else if input_path.is_dir() {
        if options.output_dir.is_some() {
            warn!("--output-dir is ignored in folder mode, translations are written next to their sources");
        }
        let report = controller
            .run_folder(input_path, options.force_overwrite, options.force_retranslate)
            .await?;
        if report.failed > 0 {
            return Err(anyhow!("{} file(s) failed to translate", report.failed));
        }
    } else {
        return Err(anyhow!("Input path does not exist: {:?}", input_path));
    }

    Ok(())
}

async fn run_check(config: Config) -> Result<()> {
    let controller = Controller::with_config(config)?;

    if controller.check().await? {
        info!("Provider is reachable and translating");
        Ok(())
    } else {
        Err(anyhow!("Provider answered, but the test translation did not look Russian"))
    }
}
