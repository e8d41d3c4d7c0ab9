use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{
    chat::SessionListView,
    render,
    ChatEvent, ChatIdentity, DispatchOutcome, FleetDesk, ListView, SessionController,
    VehicleForm, VehicleListController,
};
use shared::domain::{CarId, Role, SessionId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, prepare_base_url};

#[derive(Parser, Debug)]
#[command(name = "fleet", about = "Vehicle list and agent chat client")]
struct Cli {
    /// API base url; overrides fleet.toml and the environment.
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    app_name: Option<String>,
    #[arg(long)]
    user_id: Option<String>,
    /// Print rendered markup instead of plain lines.
    #[arg(long)]
    html: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List vehicles.
    List,
    /// Create a vehicle.
    Add(NewVehicle),
    /// Edit a vehicle, starting from its listed values.
    Edit {
        id: i64,
        #[command(flatten)]
        changes: VehicleChanges,
    },
    /// Delete a vehicle.
    Delete { id: i64 },
    /// List chat sessions.
    Sessions,
    /// Create a chat session.
    NewSession,
    /// Delete a chat session.
    DeleteSession { id: String },
    /// Send one message and print the reply.
    Send {
        #[arg(long)]
        session: Option<String>,
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Interactive chat. `/new`, `/switch <id>`, `/sessions`, `/quit`.
    Chat {
        #[arg(long)]
        session: Option<String>,
    },
}

#[derive(Args, Debug)]
struct NewVehicle {
    #[arg(long)]
    company: String,
    #[arg(long)]
    model: String,
    #[arg(long)]
    color: String,
    #[arg(long)]
    kms: String,
    #[arg(long)]
    year: String,
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    available: bool,
}

impl From<NewVehicle> for VehicleForm {
    fn from(args: NewVehicle) -> Self {
        Self {
            company: args.company,
            model: args.model,
            color: args.color,
            kms: args.kms,
            year: args.year,
            available: args.available,
        }
    }
}

#[derive(Args, Debug)]
struct VehicleChanges {
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    color: Option<String>,
    #[arg(long)]
    kms: Option<String>,
    #[arg(long)]
    year: Option<String>,
    #[arg(long)]
    available: Option<bool>,
}

impl VehicleChanges {
    fn apply(self, form: &mut VehicleForm) {
        if let Some(v) = self.company {
            form.company = v;
        }
        if let Some(v) = self.model {
            form.model = v;
        }
        if let Some(v) = self.color {
            form.color = v;
        }
        if let Some(v) = self.kms {
            form.kms = v;
        }
        if let Some(v) = self.year {
            form.year = v;
        }
        if let Some(v) = self.available {
            form.available = v;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(v) = cli.base_url.clone() {
        settings.base_url = v;
    }
    if let Some(v) = cli.app_name.clone() {
        settings.app_name = v;
    }
    if let Some(v) = cli.user_id.clone() {
        settings.user_id = v;
    }
    let base_url = prepare_base_url(&settings.base_url)?;
    info!(%base_url, app_name = %settings.app_name, user_id = %settings.user_id, "fleet: starting");

    let desk = FleetDesk::over_http(
        base_url,
        ChatIdentity {
            app_name: settings.app_name,
            user_id: settings.user_id,
        },
    );

    match cli.command {
        Command::List => {
            let view = desk.vehicles.refresh_list().await?;
            print_vehicles(&view, cli.html);
        }
        Command::Add(args) => {
            desk.vehicles.begin_create().await?;
            save_and_print(&desk.vehicles, args.into(), cli.html).await?;
        }
        Command::Edit { id, changes } => {
            let view = desk.vehicles.refresh_list().await?;
            let record = view
                .records()
                .iter()
                .find(|record| record.id == CarId(id))
                .ok_or_else(|| anyhow!("no vehicle with id {id}"))?;
            let mut form = VehicleForm::from(record);
            desk.vehicles.begin_edit(record.id, form.clone()).await?;
            changes.apply(&mut form);
            save_and_print(&desk.vehicles, form, cli.html).await?;
        }
        Command::Delete { id } => {
            desk.vehicles
                .remove(CarId(id))
                .await
                .with_context(|| format!("failed to delete vehicle {id}"))?;
            print_vehicles(&desk.vehicles.view().await, cli.html);
        }
        Command::Sessions => {
            let view = desk.chat.list_sessions().await?;
            print_sessions(&view, cli.html);
        }
        Command::NewSession => {
            desk.chat.list_sessions().await?;
            let session_id = desk.chat.create_session().await?;
            println!("created session {session_id}");
        }
        Command::DeleteSession { id } => {
            desk.chat.list_sessions().await?;
            desk.chat.delete_session(&SessionId::new(id)).await?;
            print_sessions(&desk.chat.sessions().await, cli.html);
        }
        Command::Send { session, text } => {
            open_conversation(&desk.chat, session).await?;
            let outcome = desk.chat.dispatch(&text.join(" ")).await?;
            if outcome == DispatchOutcome::Skipped {
                bail!("nothing to send");
            }
            print_transcript(&desk.chat, cli.html).await;
        }
        Command::Chat { session } => {
            open_conversation(&desk.chat, session).await?;
            run_chat(&desk.chat, cli.html).await?;
        }
    }

    Ok(())
}

async fn save_and_print(
    vehicles: &VehicleListController,
    form: VehicleForm,
    html: bool,
) -> Result<()> {
    vehicles.submit(form).await.context("vehicle was not saved")?;
    print_vehicles(&vehicles.view().await, html);
    Ok(())
}

async fn open_conversation(chat: &SessionController, session: Option<String>) -> Result<()> {
    chat.list_sessions().await?;
    if let Some(session) = session {
        chat.select_session(&SessionId::new(session)).await?;
    }
    if chat.active_session().await.is_none() {
        bail!("no chat sessions yet; create one with `fleet new-session`");
    }
    Ok(())
}

async fn run_chat(chat: &SessionController, html: bool) -> Result<()> {
    let mut events = chat.subscribe_events();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ChatEvent::MessageAppended { message, .. } if message.role == Role::Model => {
                    if html {
                        println!("{}", render::render_message(&message));
                    } else {
                        println!("agent> {}", message.text);
                    }
                }
                ChatEvent::TranscriptCleared { active: Some(active) } => {
                    println!("-- session {active} --");
                }
                _ => {}
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/new", _) => {
                if let Err(err) = chat.create_session().await {
                    eprintln!("could not create session: {err}");
                }
            }
            ("/switch", id) => {
                if let Err(err) = chat.select_session(&SessionId::new(id.trim())).await {
                    eprintln!("{err}");
                }
            }
            ("/sessions", _) => print_sessions(&chat.sessions().await, html),
            _ => {
                if let Err(err) = chat.dispatch(line).await {
                    eprintln!("{err}");
                }
            }
        }
    }

    printer.abort();
    Ok(())
}

fn print_vehicles(view: &ListView, html: bool) {
    if html {
        println!("{}", render::render_vehicle_list(view));
        return;
    }
    match view {
        ListView::Loading => println!("{}", render::LOADING_TEXT),
        ListView::Empty => println!("{}", render::EMPTY_TEXT),
        ListView::Failed(reason) => println!("{} ({reason})", render::FAILED_TEXT),
        ListView::Records(_) => {
            for card in render::vehicle_cards(view) {
                println!("{}", card.summary_line());
            }
        }
    }
}

fn print_sessions(view: &SessionListView, html: bool) {
    if html {
        println!("{}", render::render_session_list(view));
        return;
    }
    if let Some(error) = &view.error {
        println!("failed to load sessions ({error})");
        return;
    }
    if view.sessions.is_empty() {
        println!("no sessions");
    }
    for session_id in &view.sessions {
        let marker = if view.active.as_ref() == Some(session_id) {
            "*"
        } else {
            " "
        };
        println!("{marker} {session_id}");
    }
}

async fn print_transcript(chat: &SessionController, html: bool) {
    let transcript = chat.transcript().await;
    if html {
        println!("{}", render::render_transcript(&transcript));
        return;
    }
    for message in transcript {
        println!("{}> {}", message.role.as_str(), message.text);
    }
}
