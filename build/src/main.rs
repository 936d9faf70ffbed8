use ioscope::shell::Shell;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{App, Clap, IntoApp};
use clap_generate::{generate, generators::*};
use ioscope::cli::Opts as ParentOpts;
use ioscope::shell::Options as ShellOptions;

/// CLI version loaded from Cargo, or none if not build with cargo
pub const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

#[derive(Clap)]
#[clap(
    version = VERSION.unwrap_or("unknown"),
    author = "Joseph Azevedo",
    about = "Build tools for ioscope"
)]
pub struct Opts {
    /// Target directory to place generated completions in
    #[clap(
        parse(from_os_str),
        short = 'o',
        long = "out-dir",
        default_value = "./out"
    )]
    pub directory: PathBuf,

    // Shell output-related options
    #[clap(flatten)]
    pub shell_options: ShellOptions,
}

fn main() {
    let opts = Opts::parse();
    let shell = Shell::new(&opts.shell_options);

    if let Err(err) = fs::create_dir_all(&opts.directory) {
        shell.error(format!(
            "An error occurred while creating the output directory at {:?}: {}",
            &opts.directory, err
        ))
    }

    generate_all_completions(&opts, &shell);
}

/// Generates and writes completion files for zsh, bash, fish, elvish, and
/// PowerShell
fn generate_all_completions(opts: &Opts, shell: &Shell) {
    shell.status("Generating", "shell completion files");

    let directory = opts.directory.join("completion");
    if let Err(err) = fs::create_dir_all(&directory) {
        shell.error(format!(
            "An error occurred while creating the completion file directory at {:?}: {}",
            &opts.directory, err
        ))
    }

    let app_name = "ioscope";
    try_generate::<Bash, ParentOpts>(&directory, "bash", app_name, shell);
    try_generate::<Fish, ParentOpts>(&directory, "fish", app_name, shell);
    try_generate::<PowerShell, ParentOpts>(&directory, "powershell", app_name, shell);
    try_generate::<Elvish, ParentOpts>(&directory, "elvish", app_name, shell);
    try_generate::<Zsh, ParentOpts>(&directory, "zsh", app_name, shell);
}

/// Tries to generate the given completion file, potentially failing to do so
/// and writing result status to the console.
fn try_generate<G: Generator, A: IntoApp>(
    directory: &Path,
    generator_type: &str,
    app_name: &str,
    shell: &Shell,
) {
    let path: PathBuf = directory.join(generator_type);
    match generate_completion::<G>(A::into_app(), &path, app_name) {
        Ok(()) => shell.status(
            "Generated",
            format!(
                "{} completion file successfully at {:?}",
                generator_type, path
            ),
        ),
        Err(err) => shell.error(format!(
            "An error occurred while generating the {} completion file at {:?}: {}",
            generator_type, path, err
        )),
    }
}

/// Generates a single completion file for the given generator, consuming
/// the app instance (due to unknown mutations). If file opening/writing fails,
/// returns with an io:Error
fn generate_completion<G: Generator>(
    app: App,
    path: &Path,
    app_name: &str,
) -> Result<(), io::Error> {
    let mut app = app;
    let mut buf = Vec::new();
    generate::<G, _>(&mut app, app_name, &mut buf);

    let mut file = File::create(path)?;
    file.write_all(&buf)?;

    Ok(())
}
