use std::{path::PathBuf, thread};

use pico_args::Arguments;
use read_loader::{ChannelSink, DataLoader, LoaderConfig};

const HELP: &str = "\
Print a summary line for every read in a directory of POD5/FAST5 files

USAGE:
  load-reads [OPTIONS] <DIR>

OPTIONS:
  -t, --threads N     Worker threads for POD5 decoding [default: all CPUs]
  -n, --max-reads N   Stop after N reads, 0 for all [default: 0]
  -d, --device NAME   Device string carried by the loader [default: cpu]
  -h, --help          Print this help
";

fn main() -> eyre::Result<()> {
    env_logger::init();

    let mut args = Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let mut config = LoaderConfig::default();
    if let Some(threads) = args.opt_value_from_str(["-t", "--threads"])? {
        config.num_worker_threads = threads;
    }
    if let Some(max_reads) = args.opt_value_from_str(["-n", "--max-reads"])? {
        config = config.with_max_reads(max_reads);
    }
    if let Some(device) = args.opt_value_from_str::<_, String>(["-d", "--device"])? {
        config = config.with_device(device);
    }
    let path: PathBuf = args.free_from_str()?;

    let (sink, receiver) = ChannelSink::new();
    let printer = thread::spawn(move || {
        println!("read_id\tfilename\tchannel\tread_number\tmux\tnum_samples\tstart_time");
        let mut samples = 0;
        for read in receiver {
            samples += read.num_samples();
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                read.read_id,
                read.attributes.filename,
                read.attributes.channel_number,
                read.attributes.read_number,
                read.attributes.mux,
                read.num_samples(),
                read.attributes.start_time,
            );
        }
        samples
    });

    let mut loader = DataLoader::new(sink, config)?;
    let loaded = loader.load_reads(&path);
    let samples = printer
        .join()
        .map_err(|_| eyre::eyre!("printer thread panicked"))?;
    let loaded = loaded?;
    log::info!("{loaded} reads, {samples} samples on device {}", loader.device());
    Ok(())
}
