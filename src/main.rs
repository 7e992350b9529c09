use clap::Parser;
use gopin::{
    cli::args::{CliArgs, Command},
    Gopin,
};

fn run() -> anyhow::Result<()> {
    let cli_args: CliArgs = CliArgs::parse();
    log::debug!("{:?}", cli_args);

    let mut builder = Gopin::builder().manifest_name(&cli_args.manifest_name);
    if let Some(workspace_root) = &cli_args.workspace_root {
        builder = builder.workspace_root(workspace_root);
    }
    if let Some(go_command) = cli_args.go_command {
        builder = builder.go_command(go_command);
    }
    let gopin = builder.try_build()?;

    match cli_args.cmd {
        Command::Install => gopin.install()?,
        Command::Save { packages } => gopin.save(&packages)?,
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}
