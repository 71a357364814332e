//! nb - command-line front end for the neighborhood contribution ledger.

use clap::Parser;
use neighborhood::action_log;
use neighborhood::cli::{
    AppCommands, Cli, Commands, CommitCommands, ConfigCommands, NeighborCommands, PostCommands,
    ProjectCommands, SessionCommands,
};
use neighborhood::commands::{self, Context, Output};
use neighborhood::config::{ConfigOverrides, LedgerConfig};
use neighborhood::store::get_storage_dir;
use std::process;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the tracing filter.
const LOG_ENV: &str = "NB_LOG";

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    let data_dir = match get_storage_dir(cli.data_dir.as_deref()) {
        Ok(dir) => dir,
        Err(e) => fail(&e, human),
    };
    let file_config = match LedgerConfig::load(&data_dir) {
        Ok(config) => config,
        Err(e) => fail(&e, human),
    };
    init_tracing(file_config.log_level.as_deref());

    let overrides = ConfigOverrides {
        github_api_base: cli.github_api_base,
        hackatime_api_base: cli.hackatime_api_base,
        github_token: cli.github_token,
        timeline_order: match &cli.command {
            Commands::Timeline { order, .. } => *order,
            _ => None,
        },
    };

    let ctx = Context::new(data_dir, &file_config, cli.token, &overrides);

    let (cmd_name, args_json) = serialize_command(&cli.command);
    let start = Instant::now();
    let result = run_command(cli.command, &ctx, human);
    let duration = start.elapsed().as_millis() as u64;

    if should_log(&ctx) {
        let error = result.as_ref().err().map(|e| e.to_string());
        action_log::log_action(
            &ctx.data_dir,
            &cmd_name,
            args_json,
            result.is_ok(),
            error,
            duration,
        );
    }

    if let Err(e) = result {
        fail(&e, human);
    }
}

fn init_tracing(file_level: Option<&str>) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(file_level.unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Log only when enabled and the ledger has been initialized.
fn should_log(ctx: &Context) -> bool {
    ctx.config.action_log.value && ctx.data_dir.is_dir()
}

fn fail(error: &neighborhood::Error, human: bool) -> ! {
    if human {
        eprintln!("Error: {}", error);
    } else {
        let body = serde_json::json!({
            "error": error.to_string(),
            "kind": error.kind(),
            "status": error.status(),
        });
        eprintln!("{}", body);
    }
    process::exit(1);
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

fn run_command(command: Commands, ctx: &Context, human: bool) -> neighborhood::Result<()> {
    match command {
        Commands::Init => output(&commands::init(ctx)?, human),
        Commands::Status => output(&commands::status(ctx)?, human),

        Commands::Neighbor { command } => match command {
            NeighborCommands::Add {
                email,
                name,
                slack_id,
            } => output(&commands::neighbor_add(ctx, &email, name, slack_id)?, human),
            NeighborCommands::Whoami => output(&commands::whoami(ctx)?, human),
        },

        Commands::App { command } => match command {
            AppCommands::Create {
                name,
                description,
                closed,
                hacktendo,
                join,
            } => output(
                &commands::app_create(ctx, &name, description, closed, hacktendo, join)?,
                human,
            ),
            AppCommands::Show { app } => output(&commands::app_show(ctx, &app)?, human),
            AppCommands::Join { app_id } => output(&commands::app_join(ctx, &app_id)?, human),
            AppCommands::Leave { app_id } => output(&commands::app_leave(ctx, &app_id)?, human),
            AppCommands::Abandon { app_id } => {
                output(&commands::app_abandon(ctx, &app_id)?, human)
            }
            AppCommands::Submit {
                app_id,
                code_url,
                playable_url,
                description,
            } => output(
                &commands::app_submit(ctx, &app_id, &code_url, &playable_url, description)?,
                human,
            ),
        },

        Commands::Project { command } => match command {
            ProjectCommands::Ensure {
                name,
                app,
                neighbor,
            } => output(&commands::project_ensure(ctx, &name, &app, &neighbor)?, human),
            ProjectCommands::Attribute {
                project_id,
                neighbor,
                app,
            } => output(
                &commands::project_attribute(ctx, &project_id, &neighbor, &app)?,
                human,
            ),
            ProjectCommands::LinkGithub { project_id, link } => output(
                &commands::project_link_github(ctx, &project_id, &link)?,
                human,
            ),
            ProjectCommands::Duplicates => output(&commands::project_duplicates(ctx)?, human),
            ProjectCommands::Delete { project_id } => {
                output(&commands::project_delete(ctx, &project_id)?, human)
            }
            ProjectCommands::Sync { app, since } => {
                output(&commands::project_sync(ctx, &app, since)?, human)
            }
        },

        Commands::Session { command } => match command {
            SessionCommands::Record {
                project,
                app,
                start,
                end,
                video,
            } => output(
                &commands::session_record(ctx, &project, &app, start, end, &video)?,
                human,
            ),
        },

        Commands::Commit { command } => match command {
            CommitCommands::Record {
                app,
                project,
                message,
                video,
                session,
            } => output(
                &commands::commit_record(ctx, &app, &project, &message, &video, &session)?,
                human,
            ),
        },

        Commands::Timeline {
            app,
            start,
            end,
            github_user,
            order: _,
        } => output(
            &commands::timeline(ctx, &app, start, end, &github_user)?,
            human,
        ),

        Commands::Post { command } => match command {
            PostCommands::Create {
                app,
                demo_video,
                photobooth_video,
                description,
            } => output(
                &commands::post_create(ctx, &app, &demo_video, &photobooth_video, &description)?,
                human,
            ),
            PostCommands::List { app } => output(&commands::post_list(ctx, &app)?, human),
            PostCommands::Comment { post_id, content } => {
                output(&commands::post_comment(ctx, &post_id, &content)?, human)
            }
        },

        Commands::Config { command } => match command {
            ConfigCommands::Show => output(&commands::config_show(ctx)?, human),
            ConfigCommands::Set { key, value } => {
                output(&commands::config_set(ctx, &key, &value)?, human)
            }
        },
    }
    Ok(())
}

/// Command name and arguments for the action log.
fn serialize_command(command: &Commands) -> (String, serde_json::Value) {
    use serde_json::json;

    match command {
        Commands::Init => ("init".to_string(), json!({})),
        Commands::Status => ("status".to_string(), json!({})),

        Commands::Neighbor { command } => match command {
            NeighborCommands::Add {
                email,
                name,
                slack_id,
            } => (
                "neighbor add".to_string(),
                json!({ "email": email, "name": name, "slack_id": slack_id }),
            ),
            NeighborCommands::Whoami => ("neighbor whoami".to_string(), json!({})),
        },

        Commands::App { command } => match command {
            AppCommands::Create {
                name,
                description,
                closed,
                hacktendo,
                join,
            } => (
                "app create".to_string(),
                json!({
                    "name": name,
                    "description": description,
                    "closed": closed,
                    "hacktendo": hacktendo,
                    "join": join
                }),
            ),
            AppCommands::Show { app } => ("app show".to_string(), json!({ "app": app })),
            AppCommands::Join { app_id } => ("app join".to_string(), json!({ "app_id": app_id })),
            AppCommands::Leave { app_id } => {
                ("app leave".to_string(), json!({ "app_id": app_id }))
            }
            AppCommands::Abandon { app_id } => {
                ("app abandon".to_string(), json!({ "app_id": app_id }))
            }
            AppCommands::Submit {
                app_id,
                code_url,
                playable_url,
                description,
            } => (
                "app submit".to_string(),
                json!({
                    "app_id": app_id,
                    "code_url": code_url,
                    "playable_url": playable_url,
                    "description": description
                }),
            ),
        },

        Commands::Project { command } => match command {
            ProjectCommands::Ensure {
                name,
                app,
                neighbor,
            } => (
                "project ensure".to_string(),
                json!({ "name": name, "app": app, "neighbor": neighbor }),
            ),
            ProjectCommands::Attribute {
                project_id,
                neighbor,
                app,
            } => (
                "project attribute".to_string(),
                json!({ "project_id": project_id, "neighbor": neighbor, "app": app }),
            ),
            ProjectCommands::LinkGithub { project_id, link } => (
                "project link-github".to_string(),
                json!({ "project_id": project_id, "link": link }),
            ),
            ProjectCommands::Duplicates => ("project duplicates".to_string(), json!({})),
            ProjectCommands::Delete { project_id } => (
                "project delete".to_string(),
                json!({ "project_id": project_id }),
            ),
            ProjectCommands::Sync { app, since } => (
                "project sync".to_string(),
                json!({ "app": app, "since": since }),
            ),
        },

        Commands::Session { command } => match command {
            SessionCommands::Record {
                project,
                app,
                start,
                end,
                video,
            } => (
                "session record".to_string(),
                json!({
                    "project": project,
                    "app": app,
                    "start": start,
                    "end": end,
                    "video": video
                }),
            ),
        },

        Commands::Commit { command } => match command {
            CommitCommands::Record {
                app,
                project,
                message,
                video,
                session,
            } => (
                "commit record".to_string(),
                json!({
                    "app": app,
                    "project": project,
                    "message": message,
                    "video": video,
                    "session": session
                }),
            ),
        },

        Commands::Timeline {
            app,
            start,
            end,
            github_user,
            order,
        } => (
            "timeline".to_string(),
            json!({
                "app": app,
                "start": start,
                "end": end,
                "github_user": github_user,
                "order": order
            }),
        ),

        Commands::Post { command } => match command {
            PostCommands::Create {
                app,
                demo_video,
                photobooth_video,
                description,
            } => (
                "post create".to_string(),
                json!({
                    "app": app,
                    "demo_video": demo_video,
                    "photobooth_video": photobooth_video,
                    "description": description
                }),
            ),
            PostCommands::List { app } => ("post list".to_string(), json!({ "app": app })),
            PostCommands::Comment { post_id, content } => (
                "post comment".to_string(),
                json!({ "post_id": post_id, "content": content }),
            ),
        },

        Commands::Config { command } => match command {
            ConfigCommands::Show => ("config show".to_string(), json!({})),
            ConfigCommands::Set { key, value } => {
                let value = if key.contains("token") {
                    json!("[REDACTED]")
                } else {
                    json!(value)
                };
                ("config set".to_string(), json!({ "key": key, "value": value }))
            }
        },
    }
}
