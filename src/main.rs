use clap::Parser;
use color_eyre::Result;
use std::io::{self, Write};
use taskclock::{
    Board, Config, LocalIdentity, Profile, SqliteStore, SystemClock,
    cli::{self, Cli, Commands},
    identity::Identity,
    logging,
};

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // --dev keeps a separate config, database and session
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    let config = Config::load_with_profile(profile, cli.config.as_deref())?;
    let data_dir = config.get_data_dir();

    // Held until exit so buffered log lines are flushed
    let _log_guard = logging::init_logging(&logging::log_dir_for(&data_dir), &config.log_level)?;

    let store = SqliteStore::open(&config.get_database_path())?;
    let mut identity = LocalIdentity::open(data_dir.join("session.json"));

    let mut board = Board::new(Box::new(store), Box::new(SystemClock), taskclock::utils::today());

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => {
            let app = taskclock::tui::App::new(config, board, Box::new(identity))?;
            taskclock::tui::run_event_loop(app)?;
        }
        command => {
            board.set_user(identity.current_user())?;
            let mut out = io::stdout().lock();
            cli::run_command(command, &mut board, &mut identity, &mut out)?;
            out.flush()?;
        }
    }

    Ok(())
}
