//! CLI entry point for the archsim memory-image tool.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use archsim_cli::inspect::{ImageSource, LoadedImage};
use archsim_core::{MemoryGeometry, UnitOrder};
#[cfg(test)]
use tempfile as _;
use tracing as _;
use tracing_subscriber::EnvFilter;

const USAGE_TEXT: &str = "\
Usage: archsim <command> <image> [options]

Commands:
  dump  <image> [options]  Load an image and print its memory
  check <image> [options]  Load an image and report its entry address

Geometry options:
  --addr-bits <n>      Address width in bits (default: 16)
  --unit-bits <n>      Addressable unit width in bits (default: 8)
  --max-addr <hex>     Highest valid address (default: all addresses)
  --units <n>          Units per transfer (default: 1)
  --little-endian      Least significant unit at the lowest address
  --default <hex>      Value of units the image does not cover (default: 0)

Dump options:
  --from <hex>         First address to print (default: 0)
  --to <hex>           Last address to print
  --lite               One-line `value/` format

  -h, --help           Show this help message

Examples:
  archsim check program.img --addr-bits 8
  archsim dump program.img --units 4 --little-endian --from 40 --to 5f
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Dump(DumpArgs),
    Check(ImageArgs),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ImageArgs {
    input: PathBuf,
    address_bits: u32,
    unit_bits: u32,
    max_address: Option<u64>,
    units: u32,
    little_endian: bool,
    default: u64,
}

impl ImageArgs {
    fn new(input: PathBuf) -> Self {
        Self {
            input,
            address_bits: 16,
            unit_bits: 8,
            max_address: None,
            units: 1,
            little_endian: false,
            default: 0,
        }
    }

    fn to_source(&self) -> ImageSource {
        let order = if self.little_endian {
            UnitOrder::LeastSignificantFirst
        } else {
            UnitOrder::MostSignificantFirst
        };
        let mut geometry = MemoryGeometry::new(self.address_bits, self.unit_bits)
            .with_units_per_transfer(self.units)
            .with_order(order);
        if let Some(max_address) = self.max_address {
            geometry = geometry.with_max_address(max_address);
        }
        ImageSource {
            path: self.input.clone(),
            geometry,
            default: self.default,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct DumpArgs {
    image: ImageArgs,
    from: u64,
    to: Option<u64>,
    lite: bool,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();
    let dump = match command_str.as_str() {
        "dump" => true,
        "check" => false,
        other => return Err(format!("unknown command: {other}")),
    };
    parse_command_args(args, dump).map(|parsed| parsed.map_or(ParseResult::Help, ParseResult::Command))
}

fn parse_hex(flag: &str, value: &str) -> Result<u64, String> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u64::from_str_radix(digits, 16).map_err(|_| format!("invalid hex value for {flag}: {value}"))
}

fn parse_count(flag: &str, value: &str) -> Result<u32, String> {
    value
        .parse()
        .map_err(|_| format!("invalid number for {flag}: {value}"))
}

#[allow(clippy::while_let_on_iterator)]
fn parse_command_args(
    mut args: impl Iterator<Item = OsString>,
    dump: bool,
) -> Result<Option<Command>, String> {
    let mut input: Option<PathBuf> = None;
    let mut image = ImageArgs::new(PathBuf::new());
    let mut from = 0;
    let mut to = None;
    let mut lite = false;

    while let Some(arg) = args.next() {
        let flag = arg.to_string_lossy().to_string();
        if flag == "--help" || flag == "-h" {
            return Ok(None);
        }
        if flag == "--little-endian" {
            image.little_endian = true;
            continue;
        }
        if dump && flag == "--lite" {
            lite = true;
            continue;
        }
        if !flag.starts_with('-') {
            if input.is_some() {
                return Err("multiple input paths provided".to_string());
            }
            input = Some(PathBuf::from(arg));
            continue;
        }

        let takes_value = matches!(
            flag.as_str(),
            "--addr-bits" | "--unit-bits" | "--max-addr" | "--units" | "--default"
        ) || (dump && matches!(flag.as_str(), "--from" | "--to"));
        if !takes_value {
            return Err(format!("unknown option: {flag}"));
        }
        let value = args
            .next()
            .ok_or_else(|| format!("missing value for {flag}"))?;
        let value = value.to_string_lossy();
        match flag.as_str() {
            "--addr-bits" => image.address_bits = parse_count(&flag, &value)?,
            "--unit-bits" => image.unit_bits = parse_count(&flag, &value)?,
            "--units" => image.units = parse_count(&flag, &value)?,
            "--max-addr" => image.max_address = Some(parse_hex(&flag, &value)?),
            "--default" => image.default = parse_hex(&flag, &value)?,
            "--from" => from = parse_hex(&flag, &value)?,
            _ => to = Some(parse_hex(&flag, &value)?),
        }
    }

    image.input = input.ok_or_else(|| "missing image path".to_string())?;
    Ok(Some(if dump {
        Command::Dump(DumpArgs {
            image,
            from,
            to,
            lite,
        })
    } else {
        Command::Check(image)
    }))
}

fn load(args: &ImageArgs) -> Result<LoadedImage, i32> {
    LoadedImage::load(&args.to_source()).map_err(|e| {
        eprintln!("error: {e}");
        1
    })
}

fn run_dump(args: &DumpArgs) -> Result<(), i32> {
    let image = load(&args.image)?;
    let text = image.dump(args.from, args.to, args.lite).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    println!("entry: {:#x}", image.summary().entry);
    print!("{text}");
    Ok(())
}

fn run_check(args: &ImageArgs) -> Result<(), i32> {
    let image = load(args)?;
    println!("image:         {}", args.input.display());
    println!("{}", image.summary());
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(Command::Dump(args))) => match run_dump(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Ok(ParseResult::Command(Command::Check(args))) => match run_check(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{USAGE_TEXT}");
            1
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::PathBuf;

    fn args(items: &[&str]) -> impl Iterator<Item = OsString> {
        items
            .iter()
            .map(|item| OsString::from(*item))
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn parses_dump_command() {
        let result = parse_args(args(&[
            "dump",
            "prog.img",
            "--addr-bits",
            "8",
            "--units",
            "4",
            "--little-endian",
            "--from",
            "0x40",
            "--to",
            "5f",
            "--lite",
        ]))
        .expect("valid dump args should parse");

        let ParseResult::Command(Command::Dump(dump)) = result else {
            panic!("expected dump command, got {result:?}");
        };
        assert_eq!(
            dump,
            DumpArgs {
                image: ImageArgs {
                    address_bits: 8,
                    units: 4,
                    little_endian: true,
                    ..ImageArgs::new(PathBuf::from("prog.img"))
                },
                from: 0x40,
                to: Some(0x5F),
                lite: true,
            }
        );
    }

    #[test]
    fn parses_check_with_geometry() {
        let result = parse_args(args(&["check", "--max-addr", "3ff", "prog.img", "--default", "ff"]))
            .expect("valid check args should parse");
        let ParseResult::Command(Command::Check(image)) = result else {
            panic!("expected check command, got {result:?}");
        };
        assert_eq!(image.max_address, Some(0x3FF));
        assert_eq!(image.default, 0xFF);
        assert_eq!(image.to_source().geometry.max_address, Some(0x3FF));
    }

    #[test]
    fn check_rejects_dump_options() {
        let error = parse_args(args(&["check", "prog.img", "--lite"]))
            .expect_err("check does not dump");
        assert!(error.contains("unknown option: --lite"));
    }

    #[test]
    fn parses_help_flag() {
        let result = parse_args(args(&["--help"])).expect("help should parse without error");
        assert!(matches!(result, ParseResult::Help));
        let result = parse_args(args(&["dump", "-h"])).expect("help should parse without error");
        assert!(matches!(result, ParseResult::Help));
    }

    #[test]
    fn rejects_unknown_command() {
        let error = parse_args(args(&["assemble"])).expect_err("unknown command should fail parse");
        assert!(error.contains("unknown command"));
    }

    #[test]
    fn rejects_bad_values() {
        let error = parse_args(args(&["dump", "p.img", "--from", "xyz"]))
            .expect_err("bad hex should fail");
        assert!(error.contains("invalid hex value for --from"));
        let error = parse_args(args(&["dump", "p.img", "--units"]))
            .expect_err("missing value should fail");
        assert!(error.contains("missing value for --units"));
        let error = parse_args(args(&["check"])).expect_err("missing image should fail");
        assert!(error.contains("missing image"));
    }
}
