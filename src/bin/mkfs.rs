use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Arg, Command};
use log::error;

fn main() -> ExitCode {
    env_logger::init();

    let matches = Command::new("wfs-mkfs")
        .about("Format a wfs disk image")
        .arg(Arg::new("image").required(true).value_parser(clap::value_parser!(PathBuf)))
        .arg(
            Arg::new("inodes")
                .short('i')
                .long("inodes")
                .default_value("32")
                .value_parser(clap::value_parser!(u64))
                .help("Number of inodes (rounded up to a multiple of 8)"),
        )
        .arg(
            Arg::new("blocks")
                .short('b')
                .long("blocks")
                .default_value("64")
                .value_parser(clap::value_parser!(u64))
                .help("Number of data blocks (rounded up to a multiple of 8)"),
        )
        .get_matches();

    let image_path: &PathBuf = matches.get_one("image").unwrap();
    let inodes = *matches.get_one::<u64>("inodes").unwrap();
    let blocks = *matches.get_one::<u64>("blocks").unwrap();

    let img = match wfs::mkfs(inodes, blocks) {
        Ok(img) => img,
        Err(e) => {
            error!("mkfs failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = img.save(image_path) {
        error!("cannot write {}: {e}", image_path.display());
        return ExitCode::FAILURE;
    }
    println!("formatted {}", image_path.display());
    ExitCode::SUCCESS
}
