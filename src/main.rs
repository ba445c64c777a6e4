use altre_merge::file::LoadResult;
use altre_merge::{error, logging, EolStyle, FileTransform, IdentityTransform, MergeDocument, Options};
use anyhow::{bail, Context};
use std::path::PathBuf;

const USAGE: &str = "usage: altre-merge [--eol auto|dos|unix|mac] [--out DIR] [--temp] FILE FILE [FILE]";

fn main() -> anyhow::Result<()> {
    error::setup_panic_handler();
    logging::init_from_env();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(cli) = parse_args(&args)? else {
        println!("{}", USAGE);
        return Ok(());
    };
    run(cli)
}

struct CliArgs {
    eol: EolStyle,
    out_dir: Option<PathBuf>,
    temp: bool,
    files: Vec<PathBuf>,
}

/// 引数を解析する（`--help` なら None）
fn parse_args(args: &[String]) -> anyhow::Result<Option<CliArgs>> {
    let mut cli = CliArgs {
        eol: EolStyle::Automatic,
        out_dir: None,
        temp: false,
        files: Vec::new(),
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--eol" => {
                let value = iter.next().context("--eol needs a value")?;
                cli.eol = value.parse::<EolStyle>().map_err(anyhow::Error::msg)?;
                if cli.eol == EolStyle::Mixed {
                    bail!("--eol mixed is not a save policy");
                }
            }
            "--out" => {
                let value = iter.next().context("--out needs a directory")?;
                cli.out_dir = Some(PathBuf::from(value));
            }
            "--temp" => cli.temp = true,
            other if other.starts_with('-') => bail!("unknown option {}\n{}", other, USAGE),
            file => cli.files.push(PathBuf::from(file)),
        }
    }

    if !(2..=3).contains(&cli.files.len()) {
        bail!("expected 2 or 3 files, got {}\n{}", cli.files.len(), USAGE);
    }
    Ok(Some(cli))
}

fn run(cli: CliArgs) -> anyhow::Result<()> {
    let options = Options::load().context("failed to load options")?;
    let mut document = MergeDocument::new(cli.files.len(), options)?;

    for (pane, path) in cli.files.iter().enumerate() {
        let outcome = document.load_pane(pane, path, &IdentityTransform, EolStyle::Automatic, None)?;
        let buffer = document.buffer(pane)?;
        match outcome.code {
            LoadResult::Ok | LoadResult::OkImpure => println!(
                "[{}] {}: {:?}, {}, {}, {} lines{}",
                pane,
                path.display(),
                outcome.code,
                buffer.encoding().name(),
                buffer.eol_style().name(),
                buffer.line_count(),
                if outcome.read_only { " (read-only)" } else { "" }
            ),
            code => println!(
                "[{}] {}: {:?}{}",
                pane,
                path.display(),
                code,
                outcome
                    .error
                    .map(|message| format!(" ({})", message))
                    .unwrap_or_default()
            ),
        }
    }

    let Some(out_dir) = cli.out_dir else {
        return Ok(());
    };
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("cannot create {}", out_dir.display()))?;

    if cli.temp {
        for path in document.save_temp_files(&out_dir)? {
            println!("wrote {}", path.display());
        }
        return Ok(());
    }

    let transform: &dyn FileTransform = &IdentityTransform;
    for (pane, path) in cli.files.iter().enumerate() {
        let name = path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("pane{}.txt", pane)));
        let destination = out_dir.join(name);
        let outcome = document.save_pane(pane, &destination, cli.eol, Some(transform))?;
        println!(
            "[{}] {}: {:?}{}",
            pane,
            destination.display(),
            outcome.code,
            outcome
                .error
                .map(|message| format!(" ({})", message))
                .unwrap_or_default()
        );
    }
    Ok(())
}
