use std::fs;
use std::io::{self, prelude::*};
use std::path;

use env_logger;
use log;

use line_sort::{ExternalSorter, ExternalSorterBuilder, RmpPartition};

fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    let input_reader = io::BufReader::new(fs::File::open("input.txt").unwrap());
    let mut output_writer = io::BufWriter::new(fs::File::create("output.txt").unwrap());

    let sorter: ExternalSorter<RmpPartition> = ExternalSorterBuilder::new()
        .with_chunk_size(1_000_000)
        .with_rw_buf_size(1 << 20)
        .with_tmp_dir(path::Path::new("./"))
        .build()
        .unwrap();

    let sorted = sorter.sort(input_reader.lines()).unwrap();
    log::info!("input split into {} partitions", sorted.partitions());

    for line in sorted.map(Result::unwrap) {
        output_writer.write_all(format!("{}\n", line).as_bytes()).unwrap();
    }
    output_writer.flush().unwrap();
}
