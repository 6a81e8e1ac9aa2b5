use std::{sync::Arc, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    load_settings, AnnotateClient, AuthSession, FeedProgress, ProjectFeed, ProjectStore,
};
use shared::{
    domain::{Modality, ProjectId, ProjectSortMode},
    protocol::{CreateDatasetRequest, CreateProjectRequest},
};
use storage::SessionStore;

#[derive(Parser, Debug)]
#[command(about = "Console client for the annotation project API")]
struct Cli {
    /// Overrides server_url from client.toml / environment.
    #[arg(long)]
    server_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and persist the session token locally.
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
    /// End the session and drop the persisted token.
    Logout,
    /// Show the currently logged-in user.
    Me,
    /// Page through the project list until the server runs out of results.
    Projects {
        #[arg(long, value_enum, default_value_t = SortArg::CreateTimeDesc)]
        sort: SortArg,
    },
    /// Create a project.
    Create {
        name: String,
        #[arg(long, default_value = "2D")]
        modality: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Show one project by id.
    Show { id: i64 },
    /// Attach a dataset to a project.
    CreateDataset {
        project_id: i64,
        name: String,
        #[arg(long, default_value = "v1")]
        format_version: String,
        #[arg(long, default_value = "")]
        description: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    CreateTimeDesc,
    CreateTimeAsc,
    NameAsc,
    NameDesc,
}

impl From<SortArg> for ProjectSortMode {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::CreateTimeDesc => ProjectSortMode::CreateTimeDesc,
            SortArg::CreateTimeAsc => ProjectSortMode::CreateTimeAsc,
            SortArg::NameAsc => ProjectSortMode::NameAsc,
            SortArg::NameDesc => ProjectSortMode::NameDesc,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
    }

    let persistence = SessionStore::new(&settings.session_db_url).await?;
    let auth = Arc::new(AuthSession::restore(persistence).await?);
    let client = AnnotateClient::with_timeout(
        &settings.server_url,
        auth,
        Duration::from_secs(settings.request_timeout_secs),
    )?;

    match cli.command {
        Command::Login { username, password } => {
            let user = client.login(&username, &password).await?;
            println!("Logged in as {} <{}>", user.username, user.email);
        }
        Command::Logout => {
            client.logout().await?;
            println!("Logged out.");
        }
        Command::Me => match client.current_user().await {
            Ok(user) => println!("{} <{}> (id={})", user.username, user.email, user.id.0),
            Err(err) if err.is_auth_failure() => not_logged_in(),
            Err(err) => return Err(err.into()),
        },
        Command::Projects { sort } => {
            list_projects(Arc::new(client), sort.into()).await?;
        }
        Command::Create {
            name,
            modality,
            description,
        } => {
            let modality: Modality = modality
                .parse()
                .map_err(|message: String| anyhow::anyhow!(message))?;
            let request = CreateProjectRequest {
                name,
                modality,
                description,
            };
            match client.create_project(&request).await {
                Ok(()) => println!("Created project {:?}.", request.name),
                Err(err) if err.is_auth_failure() => not_logged_in(),
                Err(err) => return Err(err.into()),
            }
        }
        Command::Show { id } => match client.get_project(ProjectId(id)).await {
            Ok(project) => {
                println!(
                    "#{} {} [{} / {}]",
                    project.id.0,
                    project.name,
                    project.modality.as_str(),
                    project.status.as_str()
                );
                if !project.description.is_empty() {
                    println!("  {}", project.description);
                }
                println!("  created {}", project.created_at);
            }
            Err(err) if err.is_auth_failure() => not_logged_in(),
            Err(err) => return Err(err.into()),
        },
        Command::CreateDataset {
            project_id,
            name,
            format_version,
            description,
        } => {
            let request = CreateDatasetRequest {
                project_id: ProjectId(project_id),
                name,
                description,
                format_version,
            };
            match client.create_dataset(&request).await {
                Ok(()) => println!("Created dataset {:?}.", request.name),
                Err(err) if err.is_auth_failure() => not_logged_in(),
                Err(err) => return Err(err.into()),
            }
        }
    }

    Ok(())
}

fn not_logged_in() {
    println!("Not logged in. Run `console login <username> --password <password>` first.");
}

/// Fetches page after page, printing each batch as it lands, until the feed
/// reports the end of the listing.
async fn list_projects(client: Arc<AnnotateClient>, sort: ProjectSortMode) -> Result<()> {
    let store = Arc::new(ProjectStore::new());
    let feed = ProjectFeed::new(client, Arc::clone(&store));
    feed.change_sort_mode(sort).await;

    let mut printed = 0usize;
    loop {
        match feed.request_more().await {
            Ok(FeedProgress::Appended { .. }) => {
                let projects = store.projects().await;
                for project in &projects[printed..] {
                    println!(
                        "#{} {} [{} / {}] created {}",
                        project.id.0,
                        project.name,
                        project.modality.as_str(),
                        project.status.as_str(),
                        project.created_at
                    );
                }
                printed = projects.len();
            }
            Ok(FeedProgress::Exhausted) => {
                println!("No more data ({printed} projects).");
                return Ok(());
            }
            Ok(FeedProgress::AlreadyFetching) | Ok(FeedProgress::Discarded) => continue,
            Err(err) if err.is_auth_failure() => {
                not_logged_in();
                return Ok(());
            }
            Err(err) => {
                eprintln!("Failed to load more projects: {err}");
                return Ok(());
            }
        }
    }
}
