use argh::FromArgs;
use jsh::Shell;

#[derive(FromArgs)]
/// A small interactive shell with POSIX job control.
struct Cli {
    /// print the shell version and exit
    #[argh(switch, short = 'v')]
    version: bool,
}

fn main() -> anyhow::Result<()> {
    let cli: Cli = argh::from_env();
    if cli.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut shell = Shell::new()?;
    shell.repl()
}
