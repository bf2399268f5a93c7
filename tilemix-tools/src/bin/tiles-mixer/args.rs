use clap::{crate_authors, crate_version, value_t, values_t, App, Arg};
use inflector::Inflector;
use std::ffi::OsString;
use std::path::PathBuf;
use tilemix::geometry::RowOrder;
use tilemix::options::OutputFormat;

/// Positional argument named after `$name`.
macro_rules! arg {
    ($name:expr) => {
        Arg::with_name($name).value_name(&$name.to_screaming_snake_case())
    };
}

/// `--kebab-case` option taking a value, optionally with a
/// default that clap shows in the help.
macro_rules! opt {
    ($name:expr) => {
        Arg::with_name($name)
            .long(&$name.to_kebab_case())
            .value_name(&$name.to_screaming_snake_case())
            .takes_value(true)
    };
    ($name:expr, $default:expr) => {
        opt!($name).default_value($default)
    };
}

/// `--kebab-case` switch.
macro_rules! flag {
    ($name:expr) => {
        Arg::with_name($name).long(&$name.to_kebab_case())
    };
}

/// Program arguments
pub struct Args {
    /// Input pyramids, or their parent directory
    pub inputs: Vec<PathBuf>,
    /// Look for `*.tiles` pyramids under the single input
    pub subdirectories: bool,
    /// Output directory
    pub output: PathBuf,
    pub quality: f32,
    pub threads: Option<usize>,
    pub tile_size: (u32, u32),
    pub format: OutputFormat,
    pub priority: String,
    pub row_order: RowOrder,
}

pub fn parse_cmd_line() -> Args {
    parse_from(std::env::args_os())
}

fn parse_from<I, T>(args: I) -> Args
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    use clap::Error;
    use clap::ErrorKind::InvalidValue;
    let matches = App::new("tiles-mixer")
        .version(crate_version!())
        .author(crate_authors!())
        .about("Merge tile pyramids, back-filling gaps from coarser tiles.")
        .arg(
            arg!("inputs")
                .required(true)
                .multiple(true)
                .help("Input pyramids (directories), in priority order"),
        )
        .arg(
            opt!("output")
                .short("o")
                .required(true)
                .help("Output directory (absent or empty)"),
        )
        .arg(opt!("quality", "0.9").short("q").help("Encode quality in [0, 1]"))
        .arg(
            opt!("threads")
                .short("t")
                .help("Worker threads (default: twice the cores)"),
        )
        .arg(opt!("tile size", "256").help("Tile size, WIDTH or WIDTHxHEIGHT"))
        .arg(
            opt!("format", "jpg")
                .possible_values(&["jpg", "jpeg", "png"])
                .help("Output format"),
        )
        .arg(
            opt!("priority", "max-level")
                .possible_values(&["max-level", "input-order"])
                .help("Which source draws on top"),
        )
        .arg(
            opt!("row order", "tms")
                .possible_values(&["tms", "xyz"])
                .help("Row numbering: tms counts from the south, xyz from the north"),
        )
        .arg(
            flag!("subdirectories")
                .short("s")
                .help("Merge the *.tiles sub-directories of the single input"),
        )
        .get_matches_from(args);

    let inputs = values_t!(matches, "inputs", PathBuf).unwrap_or_else(|e| e.exit());
    let output = value_t!(matches, "output", PathBuf).unwrap_or_else(|e| e.exit());
    let subdirectories = matches.is_present("subdirectories");
    if subdirectories && inputs.len() != 1 {
        Error::with_description(
            "--subdirectories takes exactly one input directory",
            InvalidValue,
        )
        .exit();
    }

    let quality = value_t!(matches, "quality", f32).unwrap_or_else(|e| e.exit());
    let threads = if matches.is_present("threads") {
        Some(value_t!(matches, "threads", usize).unwrap_or_else(|e| e.exit()))
    } else {
        None
    };

    let tile_size = matches.value_of("tile size").unwrap_or("256");
    let tile_size = parse_tile_size(tile_size).unwrap_or_else(|| {
        Error::with_description(&format!("invalid tile size: {}", tile_size), InvalidValue)
            .exit()
    });

    let format = value_t!(matches, "format", OutputFormat).unwrap_or_else(|e| e.exit());
    let priority = matches.value_of("priority").unwrap_or("max-level").to_owned();
    let row_order = match matches.value_of("row order") {
        Some("xyz") => RowOrder::NorthToSouth,
        _ => RowOrder::SouthToNorth,
    };

    Args {
        inputs,
        subdirectories,
        output,
        quality,
        threads,
        tile_size,
        format,
        priority,
        row_order,
    }
}

/// `256` or `512x256`.
fn parse_tile_size(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.splitn(2, 'x');
    let width = parts.next()?.trim().parse().ok()?;
    let height = match parts.next() {
        Some(h) => h.trim().parse().ok()?,
        None => width,
    };
    Some((width, height))
}
