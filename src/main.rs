use clap::{Parser, Subcommand};
use crewfs::agent;
use crewfs::commands::team::NewMember;
use crewfs::error::CrewError;
use crewfs::model::{MemberUpdate, PlanAction, RuntimeUpdate, TaskStatus, TaskUpdate};
use crewfs::output::Format;
use crewfs::store::repo::Crew;
use crewfs::store::tasks::NewTask;
use crewfs::store::team::NewTeam;

#[derive(Parser)]
#[command(
    name = "crew",
    version,
    about = "Filesystem-coordinated teams of agents: rosters, tasks and inboxes"
)]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "json")]
    format: Format,
    /// Team to act on (defaults to $CREW_TEAM)
    #[arg(long, global = true)]
    team: Option<String>,
    /// Acting agent (defaults to $CREW_AGENT, then team-lead)
    #[arg(long, global = true)]
    agent: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Team rosters
    Team {
        #[command(subcommand)]
        action: TeamAction,
    },
    /// Task board
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Agent inboxes
    Inbox {
        #[command(subcommand)]
        action: InboxAction,
    },
    /// Agent runtime status
    Status {
        #[command(subcommand)]
        action: StatusAction,
    },
}

#[derive(Subcommand)]
enum TeamAction {
    /// Create a team led by team-lead
    Create {
        /// Team name
        name: String,
        /// Team description
        #[arg(long, short, default_value = "")]
        description: String,
        /// Model used by members that do not set one
        #[arg(long)]
        default_model: Option<String>,
        /// Spawn teammates in separate windows
        #[arg(long)]
        separate_windows: bool,
        /// Lead session id (generated if omitted)
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Display the roster
    Show,
    /// Delete the team, its inboxes and its tasks
    Delete,
    /// Add a teammate to the roster
    AddMember {
        /// Member name
        name: String,
        /// Agent id (generated if omitted)
        #[arg(long)]
        agent_id: Option<String>,
        #[arg(long)]
        model: Option<String>,
        /// Working directory (defaults to the current one)
        #[arg(long)]
        cwd: Option<String>,
        /// Initial prompt
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long)]
        color: Option<String>,
        /// Require plan approval before work starts
        #[arg(long)]
        plan_mode_required: bool,
    },
    /// Update roster fields of a member
    UpdateMember {
        /// Member name
        name: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        tmux_pane_id: Option<String>,
        #[arg(long)]
        window_id: Option<String>,
        #[arg(long)]
        cwd: Option<String>,
        /// Replace subscriptions (comma-separated)
        #[arg(long, value_delimiter = ',')]
        subscriptions: Option<Vec<String>>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        thinking: Option<String>,
        #[arg(long)]
        backend_type: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },
    /// Release a teammate's tasks and remove it from the roster
    Retire {
        /// Member name
        name: String,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// Create a pending task
    Create {
        /// Task subject
        subject: String,
        #[arg(long, short, default_value = "")]
        description: String,
        /// Present-continuous form shown while in progress
        #[arg(long)]
        active_form: Option<String>,
        /// Metadata as a JSON object
        #[arg(long)]
        metadata: Option<String>,
    },
    /// List tasks in id order
    List {
        #[arg(long, value_enum)]
        status: Option<TaskStatus>,
        #[arg(long)]
        owner: Option<String>,
    },
    /// Display a single task
    Show {
        id: String,
    },
    /// Update task fields
    Update {
        id: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long, short)]
        description: Option<String>,
        #[arg(long)]
        active_form: Option<String>,
        /// New status; `deleted` removes the task
        #[arg(long, value_enum)]
        status: Option<TaskStatus>,
        #[arg(long)]
        owner: Option<String>,
        /// Replace the ids this task blocks (comma-separated)
        #[arg(long, value_delimiter = ',')]
        blocks: Option<Vec<String>>,
        /// Replace the ids blocking this task (comma-separated)
        #[arg(long, value_delimiter = ',')]
        blocked_by: Option<Vec<String>>,
        /// Metadata to merge, as a JSON object; null values remove keys
        #[arg(long)]
        metadata: Option<String>,
        /// Lock attempts before giving up
        #[arg(long)]
        retries: Option<u32>,
    },
    /// Submit a plan and move the task to planning
    Plan {
        id: String,
        /// Plan text
        plan: String,
    },
    /// Approve a submitted plan
    Approve {
        id: String,
    },
    /// Reject a submitted plan with feedback
    Reject {
        id: String,
        /// Feedback for the planner
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Release every task owned by an agent
    ResetOwner {
        /// Owner whose tasks are released
        owner: String,
    },
}

#[derive(Subcommand)]
enum InboxAction {
    /// Send a message to one member
    Send {
        /// Recipient
        to: String,
        text: String,
        #[arg(long)]
        summary: Option<String>,
    },
    /// Send a message to every other member
    Broadcast {
        text: String,
        #[arg(long)]
        summary: Option<String>,
    },
    /// Read and mark unread messages
    Read {
        /// Inbox owner (defaults to the acting agent)
        #[arg(long = "of")]
        owner: Option<String>,
        /// Include messages already read
        #[arg(long)]
        all: bool,
        /// Do not mark messages as read
        #[arg(long)]
        peek: bool,
    },
}

#[derive(Subcommand)]
enum StatusAction {
    /// Record a heartbeat for the acting agent
    Heartbeat {
        #[arg(long)]
        pid: Option<u32>,
        /// Agent loop is up and polling
        #[arg(long)]
        ready: Option<bool>,
        #[arg(long)]
        error: Option<String>,
    },
    /// Display an agent's runtime status
    Show {
        /// Agent (defaults to the acting agent)
        name: Option<String>,
    },
}

fn run(cli: Cli) -> crewfs::error::Result<()> {
    let format = cli.format;
    let crew = Crew::from_env()?;
    let acting = cli.agent.unwrap_or_else(agent::resolve_agent);
    let team_arg = cli.team.or_else(agent::resolve_team);
    let team = || team_arg.clone().ok_or(CrewError::NoTeam);

    match cli.command {
        Commands::Team { action } => match action {
            TeamAction::Create {
                name,
                description,
                default_model,
                separate_windows,
                session_id,
            } => crewfs::commands::team::create(
                &crew,
                &name,
                session_id,
                NewTeam {
                    description,
                    default_model,
                    separate_windows: separate_windows.then_some(true),
                },
                format,
            ),
            TeamAction::Show => crewfs::commands::team::show(&crew, &team()?, format),
            TeamAction::Delete => crewfs::commands::team::delete(&crew, &team()?, format),
            TeamAction::AddMember {
                name,
                agent_id,
                model,
                cwd,
                prompt,
                color,
                plan_mode_required,
            } => crewfs::commands::team::add_member(
                &crew,
                &team()?,
                NewMember {
                    name,
                    agent_id,
                    model,
                    cwd,
                    prompt,
                    color,
                    plan_mode_required,
                },
                format,
            ),
            TeamAction::UpdateMember {
                name,
                model,
                tmux_pane_id,
                window_id,
                cwd,
                subscriptions,
                color,
                thinking,
                backend_type,
                active,
            } => crewfs::commands::team::update_member(
                &crew,
                &team()?,
                &name,
                MemberUpdate {
                    model,
                    tmux_pane_id,
                    window_id,
                    cwd,
                    subscriptions,
                    color,
                    thinking,
                    backend_type,
                    is_active: active,
                    ..MemberUpdate::default()
                },
                format,
            ),
            TeamAction::Retire { name } => {
                crewfs::commands::team::retire(&crew, &team()?, &name, format)
            }
        },
        Commands::Task { action } => match action {
            TaskAction::Create {
                subject,
                description,
                active_form,
                metadata,
            } => {
                let metadata = metadata
                    .as_deref()
                    .map(crewfs::commands::task::parse_metadata)
                    .transpose()?;
                crewfs::commands::task::create(
                    &crew,
                    &team()?,
                    NewTask {
                        subject,
                        description,
                        active_form,
                        metadata,
                    },
                    format,
                )
            }
            TaskAction::List { status, owner } => {
                crewfs::commands::task::list(&crew, &team()?, status, owner.as_deref(), format)
            }
            TaskAction::Show { id } => crewfs::commands::task::show(&crew, &team()?, &id, format),
            TaskAction::Update {
                id,
                subject,
                description,
                active_form,
                status,
                owner,
                blocks,
                blocked_by,
                metadata,
                retries,
            } => {
                let metadata = metadata
                    .as_deref()
                    .map(crewfs::commands::task::parse_metadata)
                    .transpose()?;
                crewfs::commands::task::update(
                    &crew,
                    &team()?,
                    &id,
                    TaskUpdate {
                        subject,
                        description,
                        active_form,
                        status,
                        owner,
                        blocks,
                        blocked_by,
                        metadata,
                        ..TaskUpdate::default()
                    },
                    retries,
                    format,
                )
            }
            TaskAction::Plan { id, plan } => {
                crewfs::commands::task::plan(&crew, &team()?, &id, &plan, format)
            }
            TaskAction::Approve { id } => crewfs::commands::task::evaluate(
                &crew,
                &team()?,
                &id,
                PlanAction::Approve,
                None,
                format,
            ),
            TaskAction::Reject { id, feedback } => crewfs::commands::task::evaluate(
                &crew,
                &team()?,
                &id,
                PlanAction::Reject,
                feedback.as_deref(),
                format,
            ),
            TaskAction::ResetOwner { owner } => {
                crewfs::commands::task::reset_owner(&crew, &team()?, &owner, format)
            }
        },
        Commands::Inbox { action } => match action {
            InboxAction::Send { to, text, summary } => crewfs::commands::inbox::send(
                &crew,
                &team()?,
                &acting,
                &to,
                &text,
                summary.as_deref(),
                format,
            ),
            InboxAction::Broadcast { text, summary } => crewfs::commands::inbox::broadcast(
                &crew,
                &team()?,
                &acting,
                &text,
                summary.as_deref(),
                format,
            ),
            InboxAction::Read { owner, all, peek } => {
                let owner = owner.unwrap_or_else(|| acting.clone());
                crewfs::commands::inbox::read(&crew, &team()?, &owner, &acting, all, peek, format)
            }
        },
        Commands::Status { action } => match action {
            StatusAction::Heartbeat { pid, ready, error } => crewfs::commands::status::heartbeat(
                &crew,
                &team()?,
                &acting,
                RuntimeUpdate {
                    pid,
                    ready,
                    last_error: error,
                    ..RuntimeUpdate::default()
                },
                format,
            ),
            StatusAction::Show { name } => {
                let name = name.unwrap_or_else(|| acting.clone());
                crewfs::commands::status::show(&crew, &team()?, &name, format)
            }
        },
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let format = cli.format;
    if let Err(e) = run(cli) {
        match format {
            Format::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "error": e.code(),
                        "message": e.to_string()
                    })
                );
            }
            Format::Pretty => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }
}
