// Entrypoint for the CLI application.
// Reads settings from the environment, then hands over to the interactive
// menu, which logs in and runs operations until the user exits.

use cloudmail_cli::{ui::main_menu, Config};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::from_env()?;
    main_menu(config)?;
    Ok(())
}
