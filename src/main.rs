#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gitguard::{
    GiteaClient, Protocol, ProcessEnv, ReportSink, RepoTarget, Result, Settings, SshClient,
    DirectorySink, clone_matrix, list_logs, load_or_default,
    output::{TabStyle, format_command, format_http, format_logs, format_matrix, to_json},
};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Tab,
    Json,
}

#[derive(Parser, Debug)]
#[command(version, about = "Drive git, ssh and the Gitea API against a test instance.")]
struct Cli {
    /// Settings file (default: ./gitguard.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format: tab (default) or json
    #[arg(long, value_enum, default_value_t = OutputFormat::Tab, global = true)]
    output: OutputFormat,

    /// Table style to use with --output tab
    #[arg(long, value_enum, default_value_t = TabStyle::Rounded, global = true)]
    tab_style: TabStyle,

    /// Verbose diagnostics on stderr (overridden by RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,

    /// Do not inject GIT_TRACE / GIT_CURL_VERBOSE / GIT_SSH_COMMAND
    #[arg(long, global = true)]
    no_trace: bool,

    /// Do not forward logs and HTTP exchanges to the report directory
    #[arg(long, global = true)]
    no_attach: bool,

    /// Write report attachments as numbered files into this directory
    #[arg(long, global = true)]
    report_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Default)]
struct TargetArgs {
    #[arg(long, value_enum)]
    protocol: Option<Protocol>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    owner: Option<String>,
    #[arg(long)]
    repo: Option<String>,
}

impl TargetArgs {
    fn apply(&self, mut target: RepoTarget) -> RepoTarget {
        if self.protocol.is_some() {
            target.protocol = self.protocol;
        }
        if self.host.is_some() {
            target.host.clone_from(&self.host);
        }
        if self.owner.is_some() {
            target.owner.clone_from(&self.owner);
        }
        if self.repo.is_some() {
            target.repo.clone_from(&self.repo);
        }
        target
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the remote URL of the configured repository
    Url(TargetArgs),

    /// Run git with the given arguments
    Git {
        #[command(flatten)]
        target: TargetArgs,
        /// Working directory for git
        #[arg(short = 'C', long)]
        workdir: Option<PathBuf>,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },

    /// Clone the repository once per protocol, in parallel
    CloneMatrix {
        #[command(flatten)]
        target: TargetArgs,
        /// Protocols to try (default: all)
        #[arg(long = "via", value_enum)]
        via: Vec<Protocol>,
        /// Each clone lands in <dest>/<protocol>
        #[arg(long)]
        dest: PathBuf,
    },

    /// Run a command on the host over ssh
    Ssh {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        identity_file: Option<PathBuf>,
        /// Treat a non-zero remote exit as an error
        #[arg(long)]
        check: bool,
        command: String,
    },

    /// Call the Gitea REST API
    #[command(subcommand)]
    Api(ApiCommand),

    /// List command logs in an artifacts directory
    Logs {
        /// Default: settings artifacts-dir, else ./artifacts
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum ApiCommand {
    Health,
    Version,
    User { name: String },
    Users,
    Org { name: String },
    Orgs,
    Repos {
        /// Repositories of this user instead of the token's owner
        #[arg(long)]
        user: Option<String>,
    },
    Repo { owner: String, name: String },
    Unadopted,
}

fn init_tracing(debug: bool) {
    let fallback = if debug { "gitguard=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn settings(cli: &Cli) -> Result<Settings> {
    let mut settings = load_or_default(cli.config.as_deref())?.with_env(&ProcessEnv);
    if cli.no_trace {
        settings.git.trace = false;
        settings.ssh.trace = false;
    }
    if cli.no_attach {
        settings.git.attach_logs = false;
        settings.ssh.attach_logs = false;
        settings.api.attach_logs = false;
    }
    debug!(?settings, "effective settings");
    Ok(settings)
}

fn emit<T: serde::Serialize + ?Sized>(cli: &Cli, value: &T, table: impl FnOnce(TabStyle) -> String) {
    match cli.output {
        OutputFormat::Tab => println!("{}", table(cli.tab_style)),
        OutputFormat::Json => println!("{}", to_json(value)),
    }
}

/// `Ok(false)` when the command ran but its result is not ok.
fn run(cli: &Cli) -> Result<bool> {
    let mut settings = settings(cli)?;
    let sink: Option<Arc<dyn ReportSink>> = cli
        .report_dir
        .as_ref()
        .map(|dir| Arc::new(DirectorySink::new(dir)) as Arc<dyn ReportSink>);

    match &cli.command {
        Command::Url(target) => {
            let url = target.apply(settings.target()?).url()?;
            match cli.output {
                OutputFormat::Tab => println!("{url}"),
                OutputFormat::Json => println!("{}", to_json(&serde_json::json!({ "url": url }))),
            }
            Ok(true)
        }
        Command::Git {
            target,
            workdir,
            args,
        } => {
            let mut builder = settings.git_builder()?.target(target.apply(settings.target()?));
            if let Some(dir) = workdir {
                builder = builder.workdir(dir);
            }
            if let Some(sink) = sink {
                builder = builder.sink(sink);
            }
            let result = builder.build().run(args, None, &[])?;
            emit(cli, &result, |style| format_command(&result, style));
            Ok(result.ok())
        }
        Command::CloneMatrix { target, via, dest } => {
            let mut builder = settings.git_builder()?;
            if let Some(sink) = sink {
                builder = builder.sink(sink);
            }
            let protocols = if via.is_empty() {
                Protocol::ALL.to_vec()
            } else {
                via.clone()
            };
            let target = target.apply(settings.target()?);
            let outcomes = clone_matrix(
                &builder,
                &target,
                &protocols,
                dest,
                cli.output == OutputFormat::Tab,
            )?;
            emit(cli, &outcomes, |style| format_matrix(&outcomes, style));
            Ok(outcomes.iter().all(gitguard::MatrixOutcome::ok))
        }
        Command::Ssh {
            host,
            user,
            port,
            identity_file,
            check,
            command,
        } => {
            if host.is_some() {
                settings.ssh.host.clone_from(host);
            }
            if let Some(user) = user {
                settings.ssh.user.clone_from(user);
            }
            if let Some(port) = port {
                settings.ssh.port = *port;
            }
            if identity_file.is_some() {
                settings.ssh.identity_file.clone_from(identity_file);
            }
            let mut builder = settings.ssh_builder()?;
            if let Some(sink) = sink {
                builder = builder.sink(sink);
            }
            let ssh: SshClient = builder.build();
            let result = if *check {
                ssh.run_checked(command)?
            } else {
                ssh.run(command)?
            };
            emit(cli, &result, |style| format_command(&result, style));
            Ok(result.ok())
        }
        Command::Api(call) => {
            let client: GiteaClient = settings.gitea_builder(Arc::new(ProcessEnv), sink)?.build()?;
            let result = match call {
                ApiCommand::Health => client.health_check()?,
                ApiCommand::Version => client.version()?,
                ApiCommand::User { name } => client.get_user(name)?,
                ApiCommand::Users => client.list_users()?,
                ApiCommand::Org { name } => client.get_org(name)?,
                ApiCommand::Orgs => client.list_orgs()?,
                ApiCommand::Repos { user } => client.list_repos(user.as_deref())?,
                ApiCommand::Repo { owner, name } => client.get_repo(owner, name)?,
                ApiCommand::Unadopted => client.list_unadopted_repos()?,
            };
            emit(cli, &result, |style| format_http(&result, style));
            Ok(result.ok())
        }
        Command::Logs { dir } => {
            let dir = dir
                .clone()
                .or_else(|| settings.artifacts_dir.clone())
                .unwrap_or_else(|| PathBuf::from("artifacts"));
            let logs = list_logs(&dir)?;
            emit(cli, &logs, |style| format_logs(&logs, style));
            Ok(true)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!(%err, "command failed");
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
    }
}
