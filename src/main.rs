use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Arg, ArgAction, Command};
use fuser::MountOption;
use log::error;

use wfs::fuse::WfsFuse;
use wfs::{Image, Wfs};

fn main() -> ExitCode {
    env_logger::init();

    let matches = Command::new("wfs-fuse")
        .about("Mount a wfs disk image through FUSE")
        .arg(Arg::new("image").required(true).value_parser(clap::value_parser!(PathBuf)))
        .arg(Arg::new("mountpoint").required(true).value_parser(clap::value_parser!(PathBuf)))
        .arg(
            Arg::new("auto-unmount")
                .long("auto-unmount")
                .action(ArgAction::SetTrue)
                .help("Unmount automatically when the process exits"),
        )
        .get_matches();

    let image_path: &PathBuf = matches.get_one("image").unwrap();
    let mountpoint: &PathBuf = matches.get_one("mountpoint").unwrap();

    let img = match Image::load(image_path) {
        Ok(img) => img,
        Err(e) => {
            error!("cannot read {}: {e}", image_path.display());
            return ExitCode::FAILURE;
        }
    };
    let fs = match Wfs::mount(img) {
        Ok(fs) => fs,
        Err(e) => {
            error!("cannot mount {}: {e}", image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let mut options = vec![MountOption::FSName("wfs".to_string()), MountOption::DefaultPermissions];
    if matches.get_flag("auto-unmount") {
        options.push(MountOption::AutoUnmount);
    }

    let bridge = WfsFuse::new(fs, image_path.clone());
    if let Err(e) = fuser::mount2(bridge, mountpoint, &options) {
        error!("mount failed: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
