use std::process::ExitCode;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgMatches, ColorChoice, Command,
};
use tracing::error;

use coteacher_session::config::{load_config, print_schema, DEFAULT_CONFIG_PATH};
use coteacher_session::guard::{self, RouteDecision};
use coteacher_session::models::{RegisterRequest, Role, SessionUser};
use coteacher_session::session::{register, sign_in_with_password, SessionState};
use coteacher_session::startup::{self, Session};
use coteacher_session::utils::logger::init_logging;

fn command() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let email = Arg::new("email")
        .long("email")
        .help("Account email")
        .required(true);
    let password = Arg::new("password")
        .long("password")
        .help("Account password")
        .env("COTEACHER_PASSWORD")
        .hide_env_values(true)
        .required(true);

    Command::new("coteacher-session")
        .about("Co-Teacher session client")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to the YAML configuration file")
                .default_value(DEFAULT_CONFIG_PATH)
                .env("COTEACHER_CONFIG")
                .global(true),
        )
        .subcommand(
            Command::new("login")
                .about("Sign in with email and password")
                .arg(email.clone())
                .arg(password.clone()),
        )
        .subcommand(
            Command::new("register")
                .about("Create an account and sign in")
                .arg(
                    Arg::new("name")
                        .long("name")
                        .help("Display name")
                        .required(true),
                )
                .arg(email)
                .arg(password)
                .arg(
                    Arg::new("role")
                        .long("role")
                        .help("Account role")
                        .default_value("TEACHER"),
                ),
        )
        .subcommand(Command::new("whoami").about("Print the signed-in user"))
        .subcommand(Command::new("logout").about("Sign out and clear the stored session"))
        .subcommand(Command::new("status").about("Print the resolved session state"))
        .subcommand(
            Command::new("route")
                .about("Show what the route guard decides for a path")
                .arg(Arg::new("path").required(true)),
        )
        .subcommand(Command::new("schema").about("Print the configuration JSON schema"))
}

fn describe(user: &SessionUser) -> String {
    let name = user.display_name().unwrap_or("(unnamed)");
    let mut line = match user.email() {
        Some(email) => format!("{} <{}>", name, email),
        None => name.to_string(),
    };
    match user.role() {
        Some(role) => line.push_str(&format!(" [{}]", role)),
        None if user.is_federated() => line.push_str(" [federated]"),
        None => {}
    }
    line
}

fn print_status(state: &SessionState) {
    println!("loading:       {}", state.loading);
    println!("authenticated: {}", state.is_authenticated());
    println!("confirmed:     {}", state.is_confirmed());
    match &state.source {
        Some(source) => println!("source:        {:?}", source),
        None => println!("source:        -"),
    }
    if let Some(user) = &state.user {
        println!("user:          {}", describe(user));
    }
}

fn arg<'a>(matches: &'a ArgMatches, id: &str) -> &'a str {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .unwrap_or_default()
}

async fn run(session: &Session, matches: &ArgMatches) -> Result<(), String> {
    match matches.subcommand() {
        Some(("login", sub)) => {
            let user = sign_in_with_password(
                &session.bridge,
                &*session.api,
                arg(sub, "email"),
                arg(sub, "password"),
            )
            .await
            .map_err(|e| e.message())?;
            println!("Signed in as {}", describe(&user));
        }
        Some(("register", sub)) => {
            let request = RegisterRequest {
                name: arg(sub, "name").to_string(),
                email: arg(sub, "email").to_string(),
                password: arg(sub, "password").to_string(),
                role: Role::from(arg(sub, "role").to_string()),
            };
            let user = register(&session.bridge, &*session.api, request)
                .await
                .map_err(|e| e.message())?;
            println!("Registered and signed in as {}", describe(&user));
        }
        Some(("whoami", _)) => match session.resolved().await.user {
            Some(user) => println!("{}", describe(&user)),
            None => return Err("Not signed in.".to_string()),
        },
        Some(("logout", _)) => {
            session.bridge.logout();
            println!("Signed out.");
        }
        Some(("status", _)) => print_status(&session.resolved().await),
        Some(("route", sub)) => {
            let state = session.resolved().await;
            match guard::resolve(arg(sub, "path"), &state) {
                RouteDecision::Loading => println!("loading"),
                RouteDecision::Render(route) => println!("render {}", route),
                RouteDecision::Redirect(target) => println!("redirect {}", target),
            }
        }
        _ => return Err("unknown command".to_string()),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = command().get_matches();

    if matches.subcommand_name() == Some("schema") {
        return match print_schema() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Could not print schema: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config_path = arg(&matches, "config");
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let session = match startup::start(&config) {
        Ok(session) => session,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = run(&session, &matches).await;
    session.bridge.unmount();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}
