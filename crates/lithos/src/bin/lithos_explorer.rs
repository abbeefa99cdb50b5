//! # LITHOS Explorer
//!
//! Command-line front end. Every command prints one JSON document.
//!
//! ```bash
//! lithos_explorer chunk default_seed 8 0 0 0 --debug
//! lithos_explorer slice default_seed 16 20
//! lithos_explorer mineral default_seed 1 2 3
//! lithos_explorer offsets "Mount Everest"
//! lithos_explorer --config lithos.toml mine default_seed 4 0,0,0 0,1,0
//! ```
//!
//! With `mining.overlay_dir` set, `mine` progress persists between runs.

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use lithos::procedural::{HashedLocationResolver, LocationResolver, WorldPos};
use lithos::{ExplorerConfig, ExplorerError, ExplorerSession, GenerationRequest};
use serde_json::{json, Value};

const USAGE: &str = "\
usage: lithos_explorer [--config <path>] <command> [args]

commands:
  chunk   <seed> <size> [<x> <y> <z>] [--debug]   generate a chunk
  slice   <seed> <size> <z> [<x> <y>]             classify a size×size grid at depth z
  mineral <seed> <x> <y> <z>                      classify one voxel
  offsets <location>                              resolve a location to world offsets
  mine    <seed> <size> <x,y,z>...                reveal cells of the chunk at the origin";

fn main() -> ExitCode {
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let config = match take_config(&mut args) {
        Ok(config) => config,
        Err(message) => return fail(&message),
    };

    match run(&config, &args) {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(err) => fail(&err.to_string()),
        },
        Err(message) => fail(&message),
    }
}

fn fail(message: &str) -> ExitCode {
    eprintln!("error: {message}");
    ExitCode::FAILURE
}

/// Strips `--config <path>` and loads the file, or falls back to defaults.
fn take_config(args: &mut Vec<String>) -> Result<ExplorerConfig, String> {
    let Some(at) = args.iter().position(|arg| arg == "--config") else {
        return Ok(ExplorerConfig::default());
    };
    if at + 1 >= args.len() {
        return Err(format!("--config needs a path\n\n{USAGE}"));
    }
    let path = PathBuf::from(args.remove(at + 1));
    args.remove(at);
    ExplorerConfig::load(&path).map_err(|err| err.to_string())
}

fn run(config: &ExplorerConfig, args: &[String]) -> Result<Value, String> {
    let Some((command, rest)) = args.split_first() else {
        return Err(USAGE.to_owned());
    };

    // Location lookup needs no catalog.
    if command == "offsets" {
        let location = rest.join(" ");
        let resolved = HashedLocationResolver
            .resolve(&location)
            .map_err(|err| err.to_string())?;
        return serde_json::to_value(resolved).map_err(|err| err.to_string());
    }

    let session = ExplorerSession::from_config(config).map_err(|err| err.to_string())?;
    match command.as_str() {
        "chunk" => chunk(&session, rest),
        "slice" => slice(&session, rest),
        "mineral" => mineral(&session, rest),
        "mine" => mine(&session, rest),
        other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
    }
}

fn chunk(session: &ExplorerSession, args: &[String]) -> Result<Value, String> {
    let debug = args.iter().any(|arg| arg == "--debug");
    let args: Vec<&String> = args.iter().filter(|arg| *arg != "--debug").collect();
    let (seed, size) = match args.as_slice() {
        [seed, size, ..] => (seed.as_str(), parse::<u32>(size, "size")?),
        _ => return Err(USAGE.to_owned()),
    };
    let origin = match args.as_slice() {
        [_, _] => WorldPos::default(),
        [_, _, x, y, z] => WorldPos::new(parse(x, "x")?, parse(y, "y")?, parse(z, "z")?),
        _ => return Err(USAGE.to_owned()),
    };

    let mut request = GenerationRequest::new(seed, size);
    request.world_origin = origin;
    request.debug = debug;
    let response = session.generate(&request).map_err(|err| err.to_string())?;
    serde_json::to_value(response).map_err(|err| err.to_string())
}

fn slice(session: &ExplorerSession, args: &[String]) -> Result<Value, String> {
    let (seed, size, z, x, y) = match args {
        [seed, size, z] => (seed, parse(size, "size")?, parse(z, "z")?, 0, 0),
        [seed, size, z, x, y] => (
            seed,
            parse(size, "size")?,
            parse(z, "z")?,
            parse(x, "x")?,
            parse(y, "y")?,
        ),
        _ => return Err(USAGE.to_owned()),
    };
    let slice = session
        .generator()
        .generate_slice(seed, WorldPos::new(x, y, z), size)
        .map_err(|err| err.to_string())?;
    Ok(json!({ "slice": slice.to_nested(session.catalog()) }))
}

fn mineral(session: &ExplorerSession, args: &[String]) -> Result<Value, String> {
    let [seed, x, y, z] = args else {
        return Err(USAGE.to_owned());
    };
    let pos = WorldPos::new(parse(x, "x")?, parse(y, "y")?, parse(z, "z")?);
    let kind = session.generator().mineral_at(seed, pos);
    Ok(json!({ "mineral": session.catalog().mineral_name(kind) }))
}

fn mine(session: &ExplorerSession, args: &[String]) -> Result<Value, String> {
    let [seed, size, cells @ ..] = args else {
        return Err(USAGE.to_owned());
    };
    let request = GenerationRequest::new(seed.as_str(), parse(size, "size")?);
    session.generate(&request).map_err(|err| err.to_string())?;

    let mut results = Vec::with_capacity(cells.len());
    for cell in cells {
        let (x, y, z) = parse_cell(cell)?;
        let entry = match session.reveal(x, y, z) {
            Ok(outcome) => json!({
                "cell": [x, y, z],
                "mineral": outcome.mineral,
                "frontier": outcome.frontier,
                "cleared": outcome.cleared,
            }),
            Err(err @ ExplorerError::Reveal(_)) => json!({
                "cell": [x, y, z],
                "rejected": err.to_string(),
            }),
            Err(err) => return Err(err.to_string()),
        };
        results.push(entry);
    }

    let frontier = session.frontier().map_err(|err| err.to_string())?;
    Ok(json!({ "results": results, "frontier": frontier }))
}

fn parse<T: FromStr>(value: &str, name: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("`{value}` is not a valid {name}"))
}

fn parse_cell(cell: &str) -> Result<(usize, usize, usize), String> {
    let parts: Vec<&str> = cell.split(',').collect();
    let [x, y, z] = parts.as_slice() else {
        return Err(format!("cell `{cell}` must be x,y,z"));
    };
    Ok((parse(x, "x")?, parse(y, "y")?, parse(z, "z")?))
}
