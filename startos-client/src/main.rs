mod application;
mod auth;
mod interrupt;
mod logging;
mod options;
mod packages;
mod server;
mod sideload;
mod watch;

use anyhow::Result;
use clap::{CommandFactory as _, Parser, Subcommand};
use interrupt::{set_up_process_interrupt_handler, InterruptState};
use options::Options;

fn main() {
    let args = Args::parse();
    application::handle_result(run_args(args));
}

fn run_args(args: Args) -> Result<()> {
    match &args.command {
        Commands::GenerateMan => {
            let cmd = Args::command();
            let man = clap_mangen::Man::new(cmd);
            let mut buffer: Vec<u8> = Default::default();
            man.render(&mut buffer)?;
            println!("{}", String::from_utf8(buffer)?);
            Ok(())
        }
        Commands::GenerateMarkdown => {
            let opts = clap_markdown::MarkdownOptions::new().show_footer(false);
            let markdown: String = clap_markdown::help_markdown_custom::<Args>(&opts);
            println!("{}", markdown);
            Ok(())
        }
        Commands::GenerateCompletion { shell } => {
            let mut cmd = Args::command();
            clap_complete::generate(*shell, &mut cmd, "startos", &mut std::io::stdout());
            Ok(())
        }
        command => {
            logging::set_up(&logging::Options {
                verbose: args.options.verbose,
                color: args.options.use_color(),
            })?;
            let interrupt_state = set_up_process_interrupt_handler()?;
            application::runtime()?.block_on(run_command(
                &interrupt_state,
                &args.options,
                command,
            ))
        }
    }
}

async fn run_command(
    interrupt_state: &InterruptState,
    options: &Options,
    command: &Commands,
) -> Result<()> {
    match command {
        Commands::Login(args) => auth::login(options, args).await,
        Commands::Logout => auth::logout(options).await,
        Commands::State => server::state(options).await,
        Commands::Watch { paths } => watch::watch(interrupt_state, options, paths).await,
        Commands::Packages(Packages::List) => packages::list(interrupt_state, options).await,
        Commands::Package(command) => packages::run(interrupt_state, options, command).await,
        Commands::Sideload(args) => sideload::sideload(interrupt_state, options, args).await,
        Commands::Server(Server::Logs(args)) => server::logs(interrupt_state, options, args).await,
        Commands::Server(Server::Metrics) => server::metrics(options).await,
        Commands::GenerateMan | Commands::GenerateMarkdown | Commands::GenerateCompletion { .. } => {
            Ok(())
        }
    }
}

/// StartOS: manage a server from the command line
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: Options,
}

#[derive(Subcommand, Debug)]
enum Packages {
    /// List the installed packages with their lifecycle state
    List,
}

#[derive(Subcommand, Debug)]
enum Server {
    /// Show the server logs
    Logs(server::LogsArgs),
    /// Show the current resource usage of the server
    Metrics,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in with a password read from stdin, printing the session token
    Login(auth::LoginArgs),

    /// End the current session
    Logout,

    /// Show whether the server is initializing, running or in an error state
    State,

    /// Print values of the server database whenever they change
    Watch {
        /// Dot-separated paths, such as `packageData.bitcoind.stateInfo`
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Commands that operate on all packages
    #[command(subcommand)]
    Packages(Packages),

    /// Commands that operate on one package
    #[command(subcommand)]
    Package(packages::Command),

    /// Install a package from a local file
    Sideload(sideload::Args),

    /// Commands that operate on the server itself
    #[command(subcommand)]
    Server(Server),

    /// Generate markdown documentation for startos
    #[command(hide = true)]
    GenerateMarkdown,

    /// Generate a manpage for startos
    #[command(hide = true)]
    GenerateMan,

    /// Generate shell completion for startos
    #[command(hide = true)]
    GenerateCompletion {
        /// The shell to generate completion for
        #[arg(long)]
        shell: clap_complete::Shell,
    },
}
