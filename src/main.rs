use std::sync::Arc;

use anyhow::bail;
use chrono::{DateTime, Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hotel_booking_client::{
    config::Config,
    models::booking::{BookingDraft, GuestInfo},
    routes::Destination,
    services::{
        api::{AuthApi, HttpApi},
        booking::{BookingError, BookingService},
        oauth::{CallbackParams, OAuthCallback},
        session::{SessionManager, SessionState},
        storage::{FileStore, SessionStore},
        token,
    },
};

#[derive(Parser)]
#[command(name = "hotel-session", about = "Hotel booking session and reservation client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out and remove stored credentials
    Logout,
    /// Show the restored session
    Status,
    /// Refresh the access token if needed and reload the account profile
    Refresh,
    /// Complete a sign-in from an OAuth redirect query string
    OauthCallback {
        #[arg(long)]
        query: String,
    },
    /// Check a booking draft without sending it
    Validate(DraftArgs),
    /// Validate and submit a booking
    Book {
        #[arg(long)]
        room_type: i64,
        #[command(flatten)]
        draft: DraftArgs,
    },
    /// Confirm a pending booking
    Confirm { booking_id: i64 },
}

#[derive(Args)]
struct DraftArgs {
    /// Check-in date (YYYY-MM-DD)
    #[arg(long)]
    check_in: Option<NaiveDate>,
    /// Check-out date (YYYY-MM-DD)
    #[arg(long)]
    check_out: Option<NaiveDate>,
    #[arg(long, default_value_t = 1)]
    quantity: i64,
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    identity_card: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    special_requests: Option<String>,
}

impl From<DraftArgs> for BookingDraft {
    fn from(args: DraftArgs) -> Self {
        BookingDraft {
            check_in_date: args.check_in,
            check_out_date: args.check_out,
            quantity: args.quantity,
            guest: GuestInfo {
                full_name: args.name,
                email: args.email,
                phone_number: args.phone,
                identity_card: args.identity_card,
                address: args.address,
                special_requests: args.special_requests,
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    match Cli::parse().command {
        // Validation is purely local and needs no configuration
        Command::Validate(args) => validate(BookingDraft::from(args)),
        command => run(command).await,
    }
}

fn validate(draft: BookingDraft) -> anyhow::Result<()> {
    match draft.validate() {
        Ok(()) => {
            println!("Booking draft is valid ({} night(s))", draft.nights().unwrap_or_default());
            Ok(())
        }
        Err(errors) => {
            for e in errors.errors() {
                println!("{}: {}", e.field, e.message);
            }
            bail!("booking draft has {} error(s)", errors.errors().len())
        }
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let destinations = config.destinations();

    let api: Arc<dyn AuthApi> =
        Arc::new(HttpApi::new(config.api_base_url.clone(), config.request_timeout())?);
    let store: Arc<dyn SessionStore> = Arc::new(FileStore::open(&config.session_file)?);
    let session = Arc::new(SessionManager::new(api.clone(), store));

    session.initialize().await;
    info!(authenticated = session.is_authenticated(), "Session initialized");

    match command {
        Command::Login { email, password } => {
            let destination = session.login(&email, &password).await?;
            println!("Signed in. Continue to {}", destinations.path(destination));
        }
        Command::Logout => {
            session.logout().await;
            println!("Signed out. Continue to {}", destinations.path(Destination::Login));
        }
        Command::Status => match session.state() {
            SessionState::Authenticated(s) => {
                let roles: Vec<String> = s.user.roles.iter().map(ToString::to_string).collect();
                println!("Signed in as {} <{}>", s.user.username, s.user.email);
                println!("Roles: {}", roles.join(", "));
                if let Some(expiry) = token::expires_at(&s.access_token)
                    .ok()
                    .and_then(|exp| DateTime::from_timestamp(exp, 0))
                {
                    println!("Access token expires {}", expiry.with_timezone(&Local));
                }
            }
            _ => println!("Not signed in"),
        },
        Command::Refresh => {
            let user = session.refresh_user_data().await?;
            println!("Profile reloaded for {} <{}>", user.username, user.email);
        }
        Command::OauthCallback { query } => {
            let params = CallbackParams::from_query(&query);
            if let Some(destination) = OAuthCallback::new().handle(&session, &params).await {
                println!("Continue to {}", destinations.path(destination));
            }
        }
        Command::Book { room_type, draft } => {
            let bookings = BookingService::new(api, session.clone());
            match bookings.submit(room_type, &BookingDraft::from(draft)).await {
                Ok(booking) => println!("Booking #{} created ({})", booking.id, booking.status),
                Err(BookingError::Invalid(errors)) => {
                    for e in errors.errors() {
                        println!("{}: {}", e.field, e.message);
                    }
                    bail!("booking draft is invalid");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Confirm { booking_id } => {
            let bookings = BookingService::new(api, session.clone());
            let booking = bookings.confirm(booking_id).await?;
            println!("Booking #{} is now {}", booking.id, booking.status);
        }
        Command::Validate(draft) => validate(BookingDraft::from(draft))?,
    }

    Ok(())
}
