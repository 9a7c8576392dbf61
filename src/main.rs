use std::io::stdout;

use anyhow::Result;
use clap::{App, AppSettings, Arg, Shell, SubCommand};

mod subcommands;
use subcommands::{CbowApp, LmfrontierApp, RnnApp};

static DEFAULT_CLAP_SETTINGS: &[AppSettings] = &[
    AppSettings::DontCollapseArgsInUsage,
    AppSettings::UnifiedHelpMessage,
    AppSettings::SubcommandRequiredElseHelp,
];

fn main() -> Result<()> {
    // Known subapplications.
    let apps = vec![CbowApp::app(), RnnApp::app()];

    let cli = App::new("lmfrontier")
        .settings(DEFAULT_CLAP_SETTINGS)
        .subcommands(apps)
        .subcommand(
            SubCommand::with_name("completions")
                .about("Generate completion scripts for your shell")
                .setting(AppSettings::ArgRequiredElseHelp)
                .arg(Arg::with_name("shell").possible_values(&Shell::variants())),
        );
    let matches = cli.clone().get_matches();
    match matches.subcommand() {
        ("completions", Some(matches)) => {
            let shell = matches
                .value_of("shell")
                .unwrap()
                .parse::<Shell>()
                .map_err(anyhow::Error::msg)?;
            write_completion_script(cli, shell);
            Ok(())
        }
        ("cbow", Some(matches)) => CbowApp::parse(matches)?.run(),
        ("rnn", Some(matches)) => RnnApp::parse(matches)?.run(),
        _unknown => unreachable!(),
    }
}

fn write_completion_script(mut cli: App, shell: Shell) {
    cli.gen_completions_to("lmfrontier", shell, &mut stdout());
}
