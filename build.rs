//! Build script rendering the `cllama` manual pages.
//!
//! Writes `cllama.1` plus one page per subcommand (`cllama-run.1`,
//! `cllama-list.1`, `cllama-serve.1`) into the build output directory, where
//! release packaging picks them up.

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Command, CommandFactory};
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir =
        PathBuf::from(env::var_os("OUT_DIR").ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
        })?);

    let command = Cli::command();
    write_page(&out_dir, "cllama", command.clone())?;
    for subcommand in command.get_subcommands() {
        let name = format!("cllama-{}", subcommand.get_name());
        write_page(&out_dir, &name, subcommand.clone())?;
    }

    Ok(())
}

fn write_page(out_dir: &Path, name: &str, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let mut buffer = Vec::new();
    Man::new(command).title(name.to_uppercase()).render(&mut buffer)?;
    File::create(out_dir.join(format!("{name}.1")))?.write_all(&buffer)?;
    Ok(())
}
