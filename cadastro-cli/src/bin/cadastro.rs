use anyhow::anyhow;
use cadastro::auth::parse_token_claims;
use cadastro::client::{DEFAULT_CLIENT_ID, DEFAULT_CLIENT_SECRET, DEFAULT_HOST};
use cadastro::resources::{NewCategory, NewContact, NewUser};
use cadastro::storage::{CredentialStore, FileStore, MemoryStore};
use cadastro::{ClientConfig, Console, Contacts, Page, Partition, RecordId, Types, Users};
use cadastro_cli::pretty::{page_json, pp_page};
use cadastro_cli::*;

use colored_json::to_colored_json_auto;
use log::{self, debug};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use structopt::StructOpt;
use termcolor::{Color, ColorSpec, StandardStream, WriteColor};

#[derive(StructOpt)]
#[structopt(
    rename_all = "kebab-case",
    about = "Admin console for the player registration API"
)]
struct Opt {
    #[structopt(
        global = true,
        long = "--host",
        env = "CADASTRO_HOST",
        default_value = DEFAULT_HOST
    )]
    host: String,

    /// Where the session credential is kept between runs
    ///
    /// Defaults to a file in the per-user data directory.
    #[structopt(
        global = true,
        long = "--token-file",
        env = "CADASTRO_TOKEN_FILE",
        parse(from_os_str)
    )]
    token_file: Option<PathBuf>,

    /// Use this credential for this run only, instead of the token file
    #[structopt(
        global = true,
        long = "--auth-token",
        env = "CADASTRO_AUTH_TOKEN",
        hide_env_values = true
    )]
    auth_token: Option<String>,

    #[structopt(
        global = true,
        long = "--client-id",
        env = "CADASTRO_CLIENT_ID",
        default_value = DEFAULT_CLIENT_ID
    )]
    client_id: String,

    #[structopt(
        global = true,
        long = "--client-secret",
        env = "CADASTRO_CLIENT_SECRET",
        default_value = DEFAULT_CLIENT_SECRET,
        hide_env_values = true
    )]
    client_secret: String,

    /// Request timeout, in seconds. No timeout if unset
    #[structopt(global = true, long = "--timeout", env = "CADASTRO_TIMEOUT")]
    timeout: Option<u64>,

    /// Print pages as JSON instead of tables
    #[structopt(global = true, long)]
    json: bool,

    /// Log more messages. Pass multiple times for ever more verbosity
    ///
    /// By default, it'll only report errors. Passing `-v` one time also prints
    /// warnings, `-vv` enables info logging, `-vvv` debug, and `-vvvv` trace.
    #[structopt(global = true, long, short = "v", parse(from_occurrences))]
    verbose: i8,

    #[structopt(long = "--shell-completions", hidden = true)]
    shell_completions: Option<structopt::clap::Shell>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(StructOpt)]
struct ListOpt {
    /// Only show inactive records
    #[structopt(long, conflicts_with = "all")]
    inactive: bool,

    /// Show active and inactive records
    #[structopt(long)]
    all: bool,
}

impl ListOpt {
    fn partitions(&self) -> Vec<Partition> {
        if self.all {
            Partition::BOTH.to_vec()
        } else if self.inactive {
            vec![Partition::Inactive]
        } else {
            vec![Partition::Active]
        }
    }
}

#[derive(StructOpt)]
enum UsersCommand {
    List(ListOpt),
    /// Register a new user
    Create {
        #[structopt(long, short)]
        username: String,

        #[structopt(long, short)]
        email: String,

        #[structopt(long, short)]
        password: String,
    },
    /// Flip a user between active and inactive
    Toggle { id: RecordId },
}

#[derive(StructOpt)]
enum TypesCommand {
    List(ListOpt),
    /// Register a new contact type
    Create {
        #[structopt(long, short)]
        name: String,

        #[structopt(long, short)]
        descricao: String,
    },
    Toggle { id: RecordId },
}

#[derive(StructOpt)]
enum ContactsCommand {
    List(ListOpt),
    /// Register a new contact for a user
    Create {
        #[structopt(long)]
        idtipo: String,

        #[structopt(long)]
        idusuario: String,

        #[structopt(long)]
        nome: String,

        #[structopt(long)]
        valor: String,
    },
    Toggle { id: RecordId },
}

#[derive(StructOpt)]
enum Command {
    /// Exchange a username and password for a session credential
    Login {
        #[structopt(long, short)]
        username: String,

        #[structopt(
            long,
            short,
            env = "CADASTRO_PASSWORD",
            hide_env_values = true
        )]
        password: String,
    },
    /// Forget the session credential
    Logout,
    /// Show configuration and session state, without contacting the API
    Status,
    /// Active record counts for every resource
    Dashboard,
    Users {
        #[structopt(subcommand)]
        cmd: UsersCommand,
    },
    Types {
        #[structopt(subcommand)]
        cmd: TypesCommand,
    },
    Contacts {
        #[structopt(subcommand)]
        cmd: ContactsCommand,
    },
    /// Visit a console path, as if typed in the address bar
    Open { path: String },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let opt = Opt::from_args();

    let log_level = match opt.verbose {
        std::i8::MIN..=-1 => "none",
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        4..=std::i8::MAX => "trace",
    };
    // hyper logging is very verbose, so crank that down even if everything else is more verbose
    let log_filter = format!("{},hyper=error", log_level);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter))
        .format_timestamp(None)
        .init();

    debug!("Args parsed, starting up");

    #[cfg(windows)]
    colored_json::enable_ansi_support();

    if let Some(shell) = opt.shell_completions {
        Opt::clap().gen_completions_to("cadastro", shell, &mut std::io::stdout());
        std::process::exit(0);
    }

    let notifier = TerminalNotifier::new();
    if let Err(err) = run(opt, notifier.clone()) {
        if let Some(io_err) = err.root_cause().downcast_ref::<std::io::Error>() {
            if let std::io::ErrorKind::BrokenPipe = io_err.kind() {
                debug!("got BrokenPipe error, assuming stdout closed as expected and exiting with success");
                std::process::exit(0);
            }
        }
        if already_reported(&err, &notifier) {
            debug!("exiting after reported error: {}", err);
            std::process::exit(1);
        }
        let mut color_stderr = StandardStream::stderr(color_choice(atty::Stream::Stderr));
        color_stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        eprintln!("Error: {:?}", err);
        color_stderr.set_color(&ColorSpec::new())?;
        std::process::exit(1);
    }
    Ok(())
}

fn credential_store(opt: &Opt) -> Result<Box<dyn CredentialStore>> {
    if let Some(ref token) = opt.auth_token {
        return Ok(Box::new(MemoryStore::with_credential(token)));
    }
    let path = match opt.token_file.clone().or_else(FileStore::default_path) {
        Some(path) => path,
        None => return Err(anyhow!("no per-user data directory found; pass --token-file")),
    };
    debug!("credential store: {}", path.display());
    Ok(Box::new(FileStore::new(path)))
}

fn print_status(console: &Console, opt: &Opt) -> Result<()> {
    let mut out = std::io::stdout();
    let credential = console.session().credential()?;
    let source = match (&opt.auth_token, &opt.token_file) {
        (Some(_), _) => "--auth-token".to_string(),
        (None, Some(path)) => path.display().to_string(),
        (None, None) => FileStore::default_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string()),
    };
    let claims = credential.as_deref().and_then(parse_token_claims);
    if opt.json {
        let val = serde_json::json!({
            "host": console.client().host(),
            "credential_source": source,
            "authenticated": console.session().is_authenticated(),
            "subject": claims.as_ref().and_then(|c| c.subject.clone()),
            "expires_at": claims.as_ref().and_then(|c| c.expires_at),
        });
        writeln!(&mut out, "{}", to_colored_json_auto(&val)?)?;
        return Ok(());
    }
    writeln!(&mut out, "host:        {}", console.client().host())?;
    writeln!(&mut out, "credential:  {}", source)?;
    writeln!(&mut out, "session:     {:?}", console.session().state())?;
    if let Some(claims) = claims {
        if let Some(subject) = claims.subject {
            writeln!(&mut out, "subject:     {}", subject)?;
        }
        if let Some(exp) = claims.expires_at {
            writeln!(&mut out, "expires at:  {} (unix time)", exp)?;
        }
    }
    Ok(())
}

fn run(opt: Opt, notifier: TerminalNotifier) -> Result<()> {
    let store = credential_store(&opt)?;
    if opt.auth_token.is_some() {
        if let Command::Login { .. } | Command::Logout = opt.cmd {
            log::warn!("--auth-token is set; the login state will not outlive this run");
        }
    }
    let config = ClientConfig {
        host: opt.host.clone(),
        client_id: opt.client_id.clone(),
        client_secret: opt.client_secret.clone(),
        timeout: opt.timeout.map(Duration::from_secs),
    };
    let mut console = Console::new(config, store, Arc::new(notifier))?;

    let mut show = vec![Partition::Active, Partition::Inactive];
    let mut login_expected = false;
    let page = match &opt.cmd {
        Command::Status => return print_status(&console, &opt),
        Command::Login { username, password } => console.login(username, password)?,
        Command::Logout => {
            login_expected = true;
            console.logout()?
        }
        Command::Dashboard => console.visit("/dashboard")?,
        Command::Open { path } => {
            login_expected = true;
            console.visit(path)?
        }
        Command::Users { cmd } => match cmd {
            UsersCommand::List(list) => {
                show = list.partitions();
                console.visit("/users")?
            }
            UsersCommand::Create {
                username,
                email,
                password,
            } => console.create::<Users>(&NewUser {
                username: username.clone(),
                email: email.clone(),
                password: password.clone(),
            })?,
            UsersCommand::Toggle { id } => console.toggle::<Users>(id)?,
        },
        Command::Types { cmd } => match cmd {
            TypesCommand::List(list) => {
                show = list.partitions();
                console.visit("/types")?
            }
            TypesCommand::Create { name, descricao } => {
                console.create::<Types>(&NewCategory {
                    name: name.clone(),
                    descricao: descricao.clone(),
                })?
            }
            TypesCommand::Toggle { id } => console.toggle::<Types>(id)?,
        },
        Command::Contacts { cmd } => match cmd {
            ContactsCommand::List(list) => {
                show = list.partitions();
                console.visit("/contacts")?
            }
            ContactsCommand::Create {
                idtipo,
                idusuario,
                nome,
                valor,
            } => console.create::<Contacts>(&NewContact {
                idtipo: idtipo.clone(),
                idusuario: idusuario.clone(),
                nome: nome.clone(),
                valor: valor.clone(),
            })?,
            ContactsCommand::Toggle { id } => console.toggle::<Contacts>(id)?,
        },
    };

    if opt.json {
        writeln!(
            &mut std::io::stdout(),
            "{}",
            to_colored_json_auto(&page_json(&page, &show)?)?
        )?;
    } else {
        pp_page(&page, &show)?;
    }

    if page == Page::Login && !login_expected {
        return Err(anyhow!("not logged in"));
    }
    Ok(())
}

#[test]
fn test_connection_defaults() {
    let opt = Opt::from_iter(vec!["cadastro", "status"]);
    if std::env::var_os("CADASTRO_HOST").is_none() {
        assert_eq!(opt.host, DEFAULT_HOST);
    }
    if std::env::var_os("CADASTRO_CLIENT_ID").is_none() {
        assert_eq!(opt.client_id, DEFAULT_CLIENT_ID);
    }
    if std::env::var_os("CADASTRO_CLIENT_SECRET").is_none() {
        assert_eq!(opt.client_secret, DEFAULT_CLIENT_SECRET);
    }
    assert_eq!(opt.timeout, None);
}
