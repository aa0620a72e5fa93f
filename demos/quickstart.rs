use std::path;

use env_logger;
use log;

use line_sort::{ExternalSorter, ExternalSorterBuilder};

fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    let sorter: ExternalSorter = ExternalSorterBuilder::new()
        .with_chunk_size(100_000)
        .with_tmp_dir(path::Path::new("./temp"))
        .build()
        .unwrap();

    let stats = sorter
        .sort_file(path::Path::new("input_file.txt"), path::Path::new("sorted_output.txt"))
        .unwrap();

    log::info!("{} lines sorted using {} partitions", stats.records, stats.partitions);
}
