use std::{env, path::Path, process};

use ringfit::{locator::Locator, oracle::OnnxOracle, pipeline::process_files};

const USAGE: &str = "Usage: ringfit <hand_image_path> <ring_image_path> <output_path>";

fn main() -> anyhow::Result<()> {
    ringfit::init_logger!();

    let args = env::args_os().skip(1).collect::<Vec<_>>();
    let [hand, ring, output] = match <[_; 3]>::try_from(args) {
        Ok(args) => args,
        Err(_) => {
            println!("{}", USAGE);
            process::exit(1);
        }
    };

    let locator = Locator::new(OnnxOracle::default());
    process_files(
        &locator,
        Path::new(&hand),
        Path::new(&ring),
        Path::new(&output),
    )?;

    Ok(())
}
