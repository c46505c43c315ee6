use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use shared::protocol::{UserInput, UserRole};
use storage::{Storage, UserColumn, UserFilter, UserSort};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/admin.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert sample users with rotating roles.
    Seed {
        #[arg(long, default_value_t = 25)]
        count: u32,
    },
    List {
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long)]
        role: Option<String>,
        /// Comma separated `column:asc|desc` entries.
        #[arg(long)]
        sort: Option<String>,
    },
}

const ROLES: [UserRole; 3] = [UserRole::Admin, UserRole::Editor, UserRole::Viewer];

fn parse_role(raw: &str) -> Result<UserRole> {
    match UserRole::parse(raw) {
        Some(role) => Ok(role),
        None => bail!("unknown role '{raw}'"),
    }
}

fn parse_sort(raw: &str) -> Result<Vec<UserSort>> {
    raw.split(',')
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (key, direction) = entry.split_once(':').unwrap_or((entry, "asc"));
            let Some(column) = UserColumn::parse(key) else {
                bail!("column '{key}' is not sortable");
            };
            Ok(UserSort {
                column,
                descending: direction.eq_ignore_ascii_case("desc"),
            })
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::Seed { count } => {
            let existing = storage.list_users(&UserFilter::default()).await?.total;
            for index in 0..u64::from(count) {
                let number = existing + index;
                let user = storage
                    .create_user(&UserInput {
                        name: format!("user-{number}"),
                        email: format!("user-{number}@example.com"),
                        role: ROLES[(number % 3) as usize],
                    })
                    .await?;
                println!("created user id={} email={}", user.id.0, user.email);
            }
        }
        Command::List { limit, role, sort } => {
            let filter = UserFilter {
                role: role.as_deref().map(parse_role).transpose()?,
                sort: sort.as_deref().map(parse_sort).transpose()?.unwrap_or_default(),
                limit,
                ..UserFilter::default()
            };
            let page = storage.list_users(&filter).await?;
            for user in &page.rows {
                println!(
                    "{:>5}  {:<20} {:<32} {}",
                    user.id.0,
                    user.name,
                    user.email,
                    user.role.as_str()
                );
            }
            println!("{} of {} users", page.rows.len(), page.total);
        }
    }

    Ok(())
}
