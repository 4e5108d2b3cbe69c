use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use commonroom_core::config::Config;
use commonroom_core::core_group::{
    DiscussionPrivacyOptions, GroupId, GroupManager, GroupManagerImpl, GroupParams, GroupSqlStore,
    MembershipManager, UserId, VisibilityTerm,
};
use commonroom_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "commonroom")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file; environment overrides apply otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the database file from the config
    #[arg(long)]
    database: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),

    /// Manage groups
    #[command(subcommand)]
    Group(GroupCommand),

    /// Manage memberships
    #[command(subcommand)]
    Member(MemberCommand),

    /// Invite an email address to a group
    Invite {
        group: i64,
        email: String,
        #[arg(long)]
        inviter: i64,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Add { name: String, email: String },
}

#[derive(ClapArgs, Debug)]
struct GroupOptions {
    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    max_size: Option<i64>,

    /// public, parent_members or members
    #[arg(long)]
    visible_to: Option<VisibilityTerm>,

    /// public_only, private_only or public_or_private
    #[arg(long)]
    discussion_privacy: Option<DiscussionPrivacyOptions>,

    /// User who becomes the first admin
    #[arg(long)]
    creator: Option<i64>,
}

impl GroupOptions {
    fn into_params(self, name: String) -> (GroupParams, Option<UserId>) {
        let mut params = GroupParams::new(name);
        params.description = self.description;
        params.max_size = self.max_size;
        params.visible_to = self.visible_to;
        params.discussion_privacy_options = self.discussion_privacy;
        (params, self.creator.map(UserId::new))
    }
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    Create {
        name: String,
        #[command(flatten)]
        options: GroupOptions,
    },
    Subgroup {
        parent: i64,
        name: String,
        #[command(flatten)]
        options: GroupOptions,
    },
    Rename {
        group: i64,
        name: String,
    },
    Visibility {
        group: i64,
        term: String,
    },
    Parent {
        group: i64,
        parent: i64,
    },
    Archive {
        group: i64,
    },
    Show {
        group: i64,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum MemberCommand {
    Add {
        group: i64,
        #[arg(required = true)]
        users: Vec<i64>,
        #[arg(long)]
        inviter: Option<i64>,
    },
    Admin {
        group: i64,
        user: i64,
    },
    Remove {
        group: i64,
        user: i64,
    },
    List {
        group: i64,
    },
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::from_env()?,
    };
    if let Some(database) = &args.database {
        config.store.database_path = database.clone();
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(manager: &mut GroupManagerImpl<GroupSqlStore>, command: Command) -> Result<()> {
    match command {
        Command::User(UserCommand::Add { name, email }) => {
            print_json(&manager.register_user(&name, &email)?)
        }
        Command::Group(command) => match command {
            GroupCommand::Create { name, options } => {
                let (params, creator) = options.into_params(name);
                print_json(&manager.create_group(params, creator)?)
            }
            GroupCommand::Subgroup { parent, name, options } => {
                let (params, creator) = options.into_params(name);
                print_json(&manager.create_subgroup(GroupId::new(parent), params, creator)?)
            }
            GroupCommand::Rename { group, name } => {
                print_json(&manager.rename_group(GroupId::new(group), &name)?)
            }
            GroupCommand::Visibility { group, term } => {
                print_json(&manager.set_visibility(GroupId::new(group), &term)?)
            }
            GroupCommand::Parent { group, parent } => {
                print_json(&manager.set_parent(GroupId::new(group), GroupId::new(parent))?)
            }
            GroupCommand::Archive { group } => {
                manager.archive_group(GroupId::new(group))?;
                print_json(&manager.get_group(GroupId::new(group))?)
            }
            GroupCommand::Show { group } => print_json(&manager.get_group(GroupId::new(group))?),
            GroupCommand::List => print_json(&manager.list_top_level_groups()?),
        },
        Command::Member(command) => match command {
            MemberCommand::Add { group, users, inviter } => {
                let users: Vec<UserId> = users.into_iter().map(UserId::new).collect();
                print_json(&manager.add_members(
                    GroupId::new(group),
                    &users,
                    inviter.map(UserId::new),
                )?)
            }
            MemberCommand::Admin { group, user } => {
                print_json(&manager.add_admin(GroupId::new(group), UserId::new(user), None)?)
            }
            MemberCommand::Remove { group, user } => {
                manager.remove_member(GroupId::new(group), UserId::new(user))?;
                print_json(&manager.members(GroupId::new(group))?)
            }
            MemberCommand::List { group } => print_json(&manager.members(GroupId::new(group))?),
        },
        Command::Invite { group, email, inviter } => {
            print_json(&manager.invite(GroupId::new(group), &email, UserId::new(inviter))?)
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let mut log_config = LogConfig::try_from(&config.logging)?;
    if let Some(level) = &args.log_level {
        log_config.level = LogLevel::parse(level).unwrap_or_else(|| {
            eprintln!("Invalid log level '{}', using 'info'", level);
            LogLevel::Info
        });
    }
    if args.json_logs {
        log_config = log_config.json_format(true);
    }
    init_logging_with_config(log_config)?;

    debug!(database = %config.store.database_path.display(), "opening store");
    let store = GroupSqlStore::open(&config.store.database_path, config.store.pool_size)
        .with_context(|| format!("opening {}", config.store.database_path.display()))?;
    let mut manager = GroupManagerImpl::new(store, config.groups.clone());

    run(&mut manager, args.command)?;

    info!("commonroom finished");
    Ok(())
}
