use super::*;

#[test]
fn parses_run_command() {
    let cli = Cli::try_parse_from(["feedtag", "run"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Commands::Run));
}

#[test]
fn parses_individual_steps() {
    for (arg, expected) in [
        ("download", "Download"),
        ("window", "Window"),
        ("tag", "Tag"),
        ("export", "Export"),
    ] {
        let cli = Cli::try_parse_from(["feedtag", arg]).expect("expected valid cli args");
        assert_eq!(format!("{:?}", cli.command), expected);
    }
}

#[test]
fn parses_corpus_init_with_default_source() {
    let cli = Cli::try_parse_from(["feedtag", "corpus", "init"]).expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Commands::Corpus {
            command: CorpusCommands::Init { from: None }
        }
    ));
}

#[test]
fn parses_corpus_init_with_explicit_source() {
    let cli = Cli::try_parse_from(["feedtag", "corpus", "init", "--from", "seed.csv"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Commands::Corpus {
            command: CorpusCommands::Init { from: Some(ref p) }
        } if p == &PathBuf::from("seed.csv")
    ));
}

#[test]
fn runs_limit_defaults_to_twenty() {
    let cli = Cli::try_parse_from(["feedtag", "runs"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Commands::Runs { limit: 20 }));

    let cli = Cli::try_parse_from(["feedtag", "runs", "--limit", "5"]).unwrap();
    assert!(matches!(cli.command, Commands::Runs { limit: 5 }));
}

#[test]
fn subcommand_is_required() {
    assert!(Cli::try_parse_from(["feedtag"]).is_err());
}

#[test]
fn unknown_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["feedtag", "collect"]).is_err());
}
