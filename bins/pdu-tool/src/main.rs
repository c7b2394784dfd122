use clap::Parser;

use lte_core::debug;

mod decoders;
use decoders::{PduKind, decode, parse_hex};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "LTE layer 2 PDU decoder",
    long_about = "Decodes a hex-encoded MAC or RLC PDU and prints its structure"
)]
struct Args {
    /// PDU kind
    #[arg(help = "PDU kind: [ ul-sch | dl-sch | rar | amd | status | umd5 | umd10 ]")]
    kind: String,

    /// PDU bytes
    #[arg(help = "PDU as a hex string, e.g. 8c00ddcddc5dc0")]
    hex: String,

    #[arg(short = 'v', long = "verbose", help = "Log parser diagnostics")]
    verbose: bool,
}

fn main() {
    eprintln!("[+] LTE PDU decoding tool");

    let args = Args::parse();
    if args.verbose {
        debug::setup_logging_verbose();
    }

    let Some(kind) = PduKind::from_name(&args.kind) else {
        eprintln!("Error: Unsupported PDU kind '{}'. Use: ul-sch, dl-sch, rar, amd, status, umd5, umd10", args.kind);
        std::process::exit(1);
    };
    let data = match parse_hex(&args.hex) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!("{:?}, {} bytes: {}", kind, data.len(), debug::hex(&data));
    match decode(kind, &data) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            println!("[!] Parse error: {}", e);
            std::process::exit(2);
        }
    }
}
