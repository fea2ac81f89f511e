use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use veo_director::config::Settings;
use veo_director::credentials::{CredentialProvider, Keyring};
use veo_director::jobs::VideoJobClient;
use veo_director::logging::init_logging;
use veo_director::media::MediaStore;
use veo_director::scene_store::SceneStore;
use veo_director::session::{ProjectSession, SessionError};
use veo_director::storage::{FileStore, ProjectStorage};
use veo_director::types::{AspectRatio, GenerationStatus, ProjectConfig};
use veo_director::utils::truncate_prompt;
use veo_director::veo_client::VeoClient;
use veo_director::workflow::{GenerationOrchestrator, ProgressWatcher, RunOutcome};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "veo-director")]
#[command(about = "Turn a JSON scene script into a sequence of generated video clips", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set project name, style prompt and aspect ratio
    Configure(ProjectArgs),
    /// Prompt for a Gemini API key and check it is usable
    SelectKey,
    /// Load a JSON scene script, replacing the current scenes
    Script {
        /// Path to a JSON array of {"scene", "prompt"} objects
        file: PathBuf,
        #[command(flatten)]
        project: ProjectArgs,
    },
    /// Generate every scene that is not completed yet
    Generate {
        /// Prompt for an API key if none is set
        #[arg(long)]
        select_key: bool,
    },
    /// Retry one scene, then continue with the rest
    Retry {
        /// Scene number as written in the script
        scene: String,
        /// Prompt for an API key if none is set
        #[arg(long)]
        select_key: bool,
    },
    /// Show the scene list and progress
    Status,
    /// Bundle completed scenes into a zip archive
    Export {
        /// Directory the archive is written to
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Start over: clear scenes and the saved project
    Reset {
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Default)]
struct ProjectArgs {
    /// Project name, also used for the archive name
    #[arg(short, long)]
    name: Option<String>,
    /// Visual style prepended to every scene prompt
    #[arg(short, long)]
    style: Option<String>,
    /// 16:9 (landscape) or 9:16 (portrait)
    #[arg(short, long, value_parser = parse_aspect)]
    aspect: Option<AspectRatio>,
}

impl ProjectArgs {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.style.is_none() && self.aspect.is_none()
    }

    fn apply(self, config: &mut ProjectConfig) {
        if let Some(name) = self.name {
            config.project_name = name;
        }
        if let Some(style) = self.style {
            config.style_prompt = style;
        }
        if let Some(aspect) = self.aspect {
            config.aspect_ratio = aspect;
        }
    }
}

fn parse_aspect(raw: &str) -> Result<AspectRatio, String> {
    AspectRatio::from_label(raw).ok_or_else(|| format!("unknown aspect ratio '{}', use 16:9 or 9:16", raw))
}

#[tokio::main]
async fn main() -> CliResult<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();
    init_logging()?;

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    tracing::debug!("{:?}", settings);

    let credentials: Arc<dyn CredentialProvider> = Arc::new(Keyring::new(settings.api_key.clone()));
    let storage = ProjectStorage::new(Arc::new(FileStore::new(settings.state_dir())));
    let session = ProjectSession::open(storage, credentials.clone());

    match cli.command {
        Command::Configure(project) => configure(&session, project),
        Command::SelectKey => {
            session.ensure_credential(true)?;
            println!("🔑 API key selected");
            Ok(())
        }
        Command::Script { file, project } => {
            if !project.is_empty() {
                session.update_config(|c| project.apply(c));
            }
            let json = tokio::fs::read_to_string(&file).await?;
            let count = session.load_script(&json)?;
            println!("🎞️ Loaded {} scenes from {}", count, file.display());
            print_status(&session, false);
            Ok(())
        }
        Command::Generate { select_key } => {
            session.ensure_credential(select_key).map_err(key_hint)?;
            let orchestrator = orchestrator(&settings, &session, credentials);
            let progress = print_progress(&session.store());
            let outcome = orchestrator.start_generation().await;
            progress.finish().await;
            report(&session, outcome)
        }
        Command::Retry { scene, select_key } => {
            session.ensure_credential(select_key).map_err(key_hint)?;
            let index = session
                .index_of(&scene)
                .ok_or_else(|| format!("No scene numbered '{}'", scene))?;
            let orchestrator = orchestrator(&settings, &session, credentials);
            let progress = print_progress(&session.store());
            let outcome = orchestrator.retry(index).await;
            progress.finish().await;
            report(&session, outcome?)
        }
        Command::Status => {
            print_status(&session, false);
            Ok(())
        }
        Command::Export { out } => {
            tokio::fs::create_dir_all(&out).await?;
            match session.export(&out)? {
                Some(summary) => {
                    println!(
                        "📦 Wrote {} ({} clips)",
                        summary.archive.display(),
                        summary.entries.len()
                    );
                    if summary.skipped > 0 {
                        println!("⚠️ {} completed scenes had no readable clip", summary.skipped);
                    }
                }
                None => println!("Nothing to export yet"),
            }
            Ok(())
        }
        Command::Reset { yes } => {
            if !yes && !confirm("Discard all scenes and the saved project?")? {
                println!("Cancelled");
                return Ok(());
            }
            session.reset();
            if let Err(e) = MediaStore::new(settings.media_dir()).purge().await {
                tracing::warn!("Failed to remove downloaded clips: {}", e);
            }
            println!("🧹 Started a new project");
            Ok(())
        }
    }
}

fn configure(session: &ProjectSession, project: ProjectArgs) -> CliResult<()> {
    session.update_config(|c| project.apply(c));
    let config = session.config();
    println!("Project:      {}", config.project_name);
    println!("Style:        {}", config.style_prompt);
    println!("Aspect ratio: {} ({})", config.aspect_ratio, config.aspect_ratio.label());
    if session.store().is_empty() {
        println!("Settings are saved together with the scenes; pass them to `script` as well.");
    }
    Ok(())
}

fn orchestrator(
    settings: &Settings,
    session: &ProjectSession,
    credentials: Arc<dyn CredentialProvider>,
) -> GenerationOrchestrator {
    let api = VeoClient::new(credentials.clone())
        .with_base_url(settings.base_url.clone())
        .with_model(settings.model.clone());
    let jobs = VideoJobClient::new(Arc::new(api), credentials, MediaStore::new(settings.media_dir()))
        .with_poll_interval(settings.poll_interval);
    GenerationOrchestrator::new(session.store(), Arc::new(jobs), session.shared_config())
}

/// One line per scene status change
fn print_progress(store: &SceneStore) -> ProgressWatcher {
    ProgressWatcher::spawn(store, |scene| {
        println!("  scene {:>3}  {}", scene.scene.to_string(), scene.status.badge());
    })
}

fn report(session: &ProjectSession, outcome: RunOutcome) -> CliResult<()> {
    match outcome {
        RunOutcome::Finished { completed } => println!("✅ All {} scenes completed", completed),
        RunOutcome::Halted { index, error } => {
            println!("❌ Stopped at scene #{}: {}", index + 1, error);
        }
        RunOutcome::Interrupted { reason } => println!("⚠️ Run interrupted: {}", reason),
        RunOutcome::AlreadyRunning => println!("A generation run is already active"),
    }
    print_status(session, false);
    Ok(())
}

fn print_status(session: &ProjectSession, run_active: bool) {
    let config = session.config();
    let summary = session.summary();
    println!();
    println!("{}  [{}]", config.project_name, config.aspect_ratio.label());
    println!("{} / {} scenes completed", summary.completed, summary.total);
    for scene in session.scenes() {
        println!(
            "  {:>4}  {:<10}  {}",
            scene.scene.to_string(),
            scene.status.badge(),
            truncate_prompt(&scene.prompt, 60)
        );
        if let Some(error) = &scene.error {
            println!("        ↳ {}", error);
        }
    }
    if summary.can_start(run_active) {
        println!("Run `veo-director generate` to continue.");
    }
}

fn key_hint(e: SessionError) -> Box<dyn std::error::Error> {
    match e {
        SessionError::MissingCredential => {
            "No API key. Set GEMINI_API_KEY or pass --select-key to enter one.".into()
        }
        other => other.into(),
    }
}

fn confirm(question: &str) -> CliResult<bool> {
    use std::io::Write;
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
