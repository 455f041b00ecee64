use anyhow::Result;
use clap::Parser;
use dynaloop::{run, Args, EnvRegistry};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let show_config = args.show_config;
    let config = args.resolve()?;

    if show_config {
        println!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }
    run(&config, &EnvRegistry::builtin())?;
    Ok(())
}
