use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use grid_core::{
    http::HttpDataSource, store::MemoryStore, ComponentStore, DataSource, GridEvent, GridOptions,
    TableGrid,
};
use shared::domain::ComponentId;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::{broadcast::error::RecvError, mpsc},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod render;
mod viewer;

use commands::{parse_command, CommandError, HELP};
use viewer::{Flow, Viewer};

#[derive(Parser, Debug)]
struct Args {
    /// Viewer settings file.
    #[arg(long, default_value = "dashgrid.toml")]
    config: PathBuf,
    #[arg(long)]
    server_url: Option<String>,
    /// Dashboard component to open.
    #[arg(long)]
    component: Option<String>,
    /// Use the compact pagination layout.
    #[arg(long)]
    mobile: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(&args.config);
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(component) = args.component {
        settings.component = Some(component);
    }
    if args.mobile {
        settings.desktop_layout = false;
    }

    let store = Arc::new(MemoryStore::new(settings.desktop_layout));
    let source = Arc::new(HttpDataSource::new(
        &settings.server_url,
        Arc::clone(&store),
        settings.request_timeout(),
    )?);
    let dashboard = source
        .load_dashboard()
        .await
        .with_context(|| format!("failed to load dashboard from {}", settings.server_url))?;

    let descriptor = match settings.component.as_deref() {
        Some(name) => dashboard
            .find_component(name)
            .map(|(_, component)| component.clone())
            .with_context(|| format!("dashboard has no component '{name}'"))?,
        None => dashboard
            .pages
            .iter()
            .flat_map(|page| page.components.iter())
            .next()
            .cloned()
            .context("dashboard has no components")?,
    };
    info!(dashboard = %dashboard.name, component = %descriptor.name, "opening component");

    let mut options = GridOptions::new(ComponentId::new(descriptor.name.clone()), descriptor);
    options.messages = settings.messages.clone();
    let (presenter, mut presentation) = mpsc::unbounded_channel();
    let grid = TableGrid::new(
        options,
        Arc::clone(&source) as Arc<dyn DataSource>,
        Arc::clone(&store) as Arc<dyn ComponentStore>,
        presenter,
    );
    let mut events = grid.subscribe();
    let mut viewer = Viewer::new(
        Arc::clone(&grid),
        Arc::clone(&source) as Arc<dyn DataSource>,
        Arc::clone(&store),
    );

    println!("{HELP}");
    grid.mount().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(GridEvent::Updated(view)) => print!("{}", render::render_view(&view)),
                Ok(GridEvent::Unmounted(_)) | Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "view updates skipped"),
            },
            Some(command) = presentation.recv() => {
                if let Some(text) = viewer.present(command) {
                    println!("{text}");
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(command) => match viewer.handle(command).await {
                        Flow::Continue(Some(text)) => println!("{text}"),
                        Flow::Continue(None) => {}
                        Flow::Quit => break,
                    },
                    Err(CommandError::Empty) => {}
                    Err(err) => println!("{err}"),
                }
            }
        }
    }

    grid.unmount().await;
    Ok(())
}
