use std::{fs, path::PathBuf, process::ExitCode};

use clap::Parser;
use nom::{
    bytes::complete::{tag_no_case, take_while_m_n},
    character::complete::multispace0,
    combinator::{all_consuming, map_res, opt},
    multi::{many0, many1},
    sequence::{preceded, terminated},
    IResult,
};
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use xe_gfx_disasm::{
    decoder::{DecodeOptions, KernelDecoder},
    ir::{Platform, SwsbEncodeMode},
    messages::{decode_message, MessageInput},
};

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    long_about = None,
    after_help = "Compacted (8-byte) instructions are not expanded. Each one is listed as an illegal \
                  instruction with an error, so a kernel emitted with compaction enabled shows mostly \
                  illegal instructions. Disable compaction in the compiler to get a full listing."
)]
struct Args {
    #[clap(value_parser)]
    path: PathBuf,

    /// Target platform, e.g. gen9, xe_lp, xe_hpg, xe2
    #[clap(long, value_parser)]
    platform: Platform,

    /// Input is hex text instead of raw bytes
    #[clap(long)]
    hex: bool,

    /// Print branch targets as relative offsets and skip block labels
    #[clap(long)]
    numeric_labels: bool,

    /// Override the platform's SWSB encode mode (single, three or four)
    #[clap(long, value_parser = parse_swsb_mode)]
    swsb_mode: Option<SwsbEncodeMode>,

    /// Decode the message descriptor of every send
    #[clap(long)]
    messages: bool,

    /// With --messages, list every descriptor field
    #[clap(long)]
    fields: bool,
}

#[derive(Debug, Error)]
enum DisasmError {
    #[error("Couldn't read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Input is not valid hex text near byte {0}")]
    BadHex(usize),
}

fn parse_swsb_mode(s: &str) -> Result<SwsbEncodeMode, String> {
    SwsbEncodeMode::from_name(s).ok_or_else(|| format!("unknown SWSB mode '{}'", s))
}

fn hex_byte(input: &str) -> IResult<&str, u8> {
    map_res(take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()), |s| {
        u8::from_str_radix(s, 16)
    })(input)
}

/// One whitespace or comma separated token: an optional `0x` and pairs of hex digits in memory order.
fn hex_token(input: &str) -> IResult<&str, Vec<u8>> {
    terminated(
        preceded(opt(tag_no_case("0x")), many1(hex_byte)),
        opt(nom::character::complete::char(',')),
    )(input)
}

fn parse_hex(text: &str) -> Result<Vec<u8>, DisasmError> {
    let tokens = all_consuming(preceded(multispace0, many0(terminated(hex_token, multispace0))))(text);
    match tokens {
        Ok((_, tokens)) => Ok(tokens.into_iter().flatten().collect()),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(DisasmError::BadHex(text.len() - e.input.len())),
        Err(nom::Err::Incomplete(_)) => Err(DisasmError::BadHex(text.len())),
    }
}

fn read_input(args: &Args) -> Result<Vec<u8>, DisasmError> {
    let io_err = |source: std::io::Error| DisasmError::Io {
        path: args.path.clone(),
        source,
    };
    if args.hex {
        parse_hex(&fs::read_to_string(&args.path).map_err(io_err)?)
    } else {
        fs::read(&args.path).map_err(io_err)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let bytes = match read_input(&args) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut options = DecodeOptions::new(args.platform).numeric_labels(args.numeric_labels);
    if let Some(mode) = args.swsb_mode {
        options = options.swsb_mode(mode);
    }
    let decoded = KernelDecoder::new(options).decode_kernel(&bytes);

    for block in decoded.kernel.blocks() {
        if !args.numeric_labels {
            println!("L{}:", block.offset);
        }
        for inst in &block.instructions {
            println!("/*{:>5}*/ {}", inst.pc, inst);
            if !args.messages {
                continue;
            }
            let Some(input) = MessageInput::from_instruction(args.platform, inst) else {
                continue;
            };
            let result = decode_message(&input);
            println!("            // {}", result.syntax.sym());
            if args.fields {
                for field in &result.fields {
                    println!("            //   {}", field);
                }
            }
            for warning in &result.warnings {
                println!("            // warning: {}", warning);
            }
            for error in &result.errors {
                println!("            // error: {}", error);
            }
        }
    }

    for warning in &decoded.diagnostics.warnings {
        eprintln!("warning: {}", warning);
    }
    for error in &decoded.diagnostics.errors {
        eprintln!("error: {}", error);
    }
    if decoded.diagnostics.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod test {
    use clap::CommandFactory;

    use super::{parse_hex, Args};

    #[test]
    fn hex_text_forms() {
        assert_eq!(parse_hex("01 02\n0x0304, ff").unwrap(), vec![1, 2, 3, 4, 0xff]);
        assert_eq!(parse_hex("  ").unwrap(), Vec::<u8>::new());
        assert!(parse_hex("012").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn help_mentions_compaction() {
        let mut out = Vec::new();
        Args::command().write_help(&mut out).unwrap();
        let help = String::from_utf8(out).unwrap();
        assert!(help.contains("Compacted"));
    }
}
