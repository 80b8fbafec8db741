use ctorsplit::jvm::code::Routine;
use ctorsplit::jvm::RenderDescriptor;
use ctorsplit::listing::{self, Listing};
use ctorsplit::*;

use clap::{Arg, ArgAction, Command};
use std::fs;
use std::process;

fn cli() -> Command {
    Command::new("Constructor splitter")
        .version(clap::crate_version!())
        .about("Split JVM instance initializers around their chaining call")
        .arg(
            Arg::new("frames")
                .long("frames")
                .action(ArgAction::SetTrue)
                .help("Also print the abstract frame before every instruction"),
        )
        .arg(
            Arg::new("only")
                .long("only")
                .value_name("NAME_DESCRIPTOR")
                .help("Only split the initializer with this descriptor (eg. `<init>(IZ)V`)"),
        )
        .arg(
            Arg::new("INPUT")
                .help("Listing file containing the initializers to split")
                .required(true)
                .index(1),
        )
}

fn main() {
    env_logger::init();

    let matches = cli().get_matches();

    // `get_matches` exits with a usage error when the required INPUT is missing
    let input = matches
        .get_one::<String>("INPUT")
        .expect("INPUT is required");
    let only = matches.get_one::<String>("only");
    let show_frames = matches.get_flag("frames");

    if let Err(err) = run(input, only.map(String::as_str), show_frames) {
        log::error!("{}", err);
        process::exit(1);
    }
}

fn run(input: &str, only: Option<&str>, show_frames: bool) -> Result<(), Error> {
    log::info!("Reading '{}'", input);
    let source = fs::read_to_string(input)?;
    let listing = listing::parse(&source)?;

    let mut output = Listing { routines: vec![] };
    let mut skipped = 0;
    for routine in listing.initializers() {
        let signature = format!("{}{}", routine.name, routine.descriptor.render());
        if only.map_or(false, |only| only != signature) {
            continue;
        }

        if show_frames {
            print_frames(routine)?;
        }

        match deconstruct(&routine.owner, routine) {
            Ok(split) => {
                log::info!(
                    "{}.{}: chaining call to {}.{}{}",
                    routine.owner,
                    signature,
                    split.delegation.class,
                    split.delegation.name,
                    split.delegation.descriptor.render()
                );
                output.routines.push(split.args.routine);
                output.routines.push(split.body.routine);
            }
            Err(err) if err.is_structural() => {
                log::warn!("{}.{}: cannot split ({})", routine.owner, signature, err);
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    print!("{}", output);
    if skipped > 0 {
        log::warn!("{} initializer(s) left unsplit", skipped);
    }
    Ok(())
}

fn print_frames(routine: &Routine) -> Result<(), Error> {
    let frames = analyze(&routine.owner, routine)?;
    println!("# frames for {}{}", routine.name, routine.descriptor.render());
    for (insn, frame) in routine.instructions.iter().zip(frames.iter()) {
        match frame {
            Some(frame) => println!("#   {:<40} {}", insn.to_string(), frame),
            None => println!("#   {:<40} (unreachable)", insn.to_string()),
        }
    }
    Ok(())
}
