//! # ilabyaml CLI
//!
//! Runs the generation server, or drives the form from a TOML file and
//! writes the resulting `qna.yaml`.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ilabyaml serve` | Start the HTTP server (`POST /api/generate`) |
//! | `ilabyaml generate --form form.toml` | Generate and export `qna.yaml` |
//! | `ilabyaml init-form [path]` | Write a form file from the bundled defaults |
//! | `ilabyaml defaults` | Print the form defaults in effect |
//!
//! ## Examples
//!
//! ```bash
//! # Generate in-process (needs OPENAI_API_KEY)
//! ilabyaml generate --form form.toml --out ./knowledge/astronomy/phoenix
//!
//! # Generate through a running server and print the document
//! ilabyaml generate --form form.toml --server http://127.0.0.1:3000 --stdout
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ilabyaml::client::{GenerationBackend, HttpGenerationClient, LocalGeneration};
use ilabyaml::completion::{create_provider, CompletionProvider};
use ilabyaml::config::{self, Config};
use ilabyaml::export;
use ilabyaml::form::{trigger_generate, FormDefaults, FormFile, FormState};
use ilabyaml::generate::Generator;
use ilabyaml::server;

/// ilabyaml: generate InstructLab qna.yaml files with a hosted chat model.
#[derive(Parser)]
#[command(
    name = "ilabyaml",
    about = "Generate qna.yaml for an InstructLab taxonomy using AI",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults apply when absent.
    #[arg(long, global = true, default_value = "./config/ilabyaml.toml")]
    config: PathBuf,

    /// Log at debug level, including raw provider responses.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Generate qna.yaml from a form file.
    ///
    /// Fields missing from the form keep their bundled default values.
    Generate {
        /// Form file (TOML) with the submission fields.
        #[arg(long)]
        form: PathBuf,

        /// Read the knowledge seed from this file instead of the form.
        #[arg(long)]
        seed: Option<PathBuf>,

        /// Base URL of a running ilabyaml server. Generates in-process when omitted.
        #[arg(long)]
        server: Option<String>,

        /// Directory to write qna.yaml into.
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Print the document to stdout instead of writing a file.
        #[arg(long)]
        stdout: bool,
    },

    /// Write a form file pre-filled with the bundled defaults.
    InitForm {
        #[arg(default_value = "form.toml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Print the form defaults in effect.
    Defaults,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            server::run_server(&cfg).await?;
        }
        Commands::Generate {
            form,
            seed,
            server,
            out,
            stdout,
        } => {
            run_generate(&cfg, &form, seed, server.as_deref(), &out, stdout).await?;
        }
        Commands::InitForm { path, force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            let defaults = Arc::new(FormDefaults::from_config(&cfg.form)?);
            let state = FormState::new(defaults);
            let text = FormFile::from_submission(&state.submission).to_toml()?;
            std::fs::write(&path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote form file: {}", path.display());
        }
        Commands::Defaults => {
            let defaults = FormDefaults::from_config(&cfg.form)?;
            let text = toml::to_string_pretty(&defaults).context("Failed to serialize defaults")?;
            print!("{}", text);
        }
    }

    Ok(())
}

async fn run_generate(
    cfg: &Config,
    form: &std::path::Path,
    seed: Option<PathBuf>,
    server_url: Option<&str>,
    out: &std::path::Path,
    stdout: bool,
) -> Result<()> {
    let defaults = Arc::new(FormDefaults::from_config(&cfg.form)?);
    let mut file = FormFile::load(form)?;
    if let Some(seed) = seed {
        let text = std::fs::read_to_string(&seed)
            .with_context(|| format!("Failed to read knowledge seed: {}", seed.display()))?;
        file.knowledge_seed = Some(text);
    }
    let mut state = file.apply_to(FormState::new(defaults));

    let backend: Box<dyn GenerationBackend> = match server_url {
        Some(url) => {
            // Outlive the server's own deadline so its error body reaches us.
            let timeout = Duration::from_secs(cfg.generate.deadline_secs + 10);
            Box::new(HttpGenerationClient::new(url, timeout)?)
        }
        None => {
            let provider: Arc<dyn CompletionProvider> =
                Arc::from(create_provider(&cfg.completion)?);
            Box::new(LocalGeneration::new(Generator::new(
                provider,
                cfg.generate.clone(),
            )))
        }
    };

    let progress = tokio::spawn(report_loading(state.subscribe_loading()));
    let result = trigger_generate(&mut state, backend.as_ref()).await;
    progress.abort();
    let yaml = result?;

    if stdout {
        export::write_stdout(&yaml)?;
    } else {
        let path = export::write_qna(out, &yaml)?;
        println!("Wrote {}", path.display());
        println!("Please verify the accuracy of the generated data before training!");
    }

    Ok(())
}

/// Log while the form is waiting on the backend, so long generations are visible.
async fn report_loading(mut loading: tokio::sync::watch::Receiver<bool>) {
    let started = std::time::Instant::now();
    while loading.changed().await.is_ok() {
        if *loading.borrow_and_update() {
            tracing::info!("waiting for generated content");
        } else {
            tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "generation finished");
        }
    }
}
