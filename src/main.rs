use std::path;
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use line_sort::{ExternalSorter, ExternalSorterBuilder, LinePartition, PartitionFormat, RmpPartition, SortError};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let format: Format = arg_parser.value_of_t_or_exit("format");
    let chunk_size: usize = arg_parser.value_of_t_or_exit("chunk_size");
    let tmp_dir: Option<&str> = arg_parser.value_of("tmp_dir");
    let rw_buf_size: Option<usize> = arg_parser
        .value_of("rw_buf_size")
        .map(|buf_size| parse_buf_size(buf_size).expect("value is pre-validated"));

    let input = path::Path::new(arg_parser.value_of("input").expect("value is required"));
    let output = path::Path::new(arg_parser.value_of("output").expect("value is required"));

    let result = match format {
        Format::Lines => run::<LinePartition>(chunk_size, tmp_dir, rw_buf_size, input, output),
        Format::Rmp => run::<RmpPartition>(chunk_size, tmp_dir, rw_buf_size, input, output),
    };

    if let Err(err) = result {
        log::error!("data sorting error: {}", err);
        process::exit(1);
    }
}

fn run<F: PartitionFormat>(
    chunk_size: usize,
    tmp_dir: Option<&str>,
    rw_buf_size: Option<usize>,
    input: &path::Path,
    output: &path::Path,
) -> Result<(), SortError> {
    let mut sorter_builder = ExternalSorterBuilder::<F>::new().with_chunk_size(chunk_size);

    if let Some(tmp_dir) = tmp_dir {
        sorter_builder = sorter_builder.with_tmp_dir(path::Path::new(tmp_dir));
    }

    if let Some(rw_buf_size) = rw_buf_size {
        sorter_builder = sorter_builder.with_rw_buf_size(rw_buf_size);
    }

    let sorter: ExternalSorter<F> = sorter_builder.build()?;
    sorter.sort_file(input, output)?;

    return Ok(());
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum Format {
    Lines,
    Rmp,
}

impl Format {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Format::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Format as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("line-sort")
        .about("external line sorter")
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("file to be sorted")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("chunk_size")
                .short('c')
                .long("chunk-size")
                .help("number of lines sorted in memory at once")
                .takes_value(true)
                .default_value("100000")
                .validator(|v| match v.parse::<usize>() {
                    Ok(0) => Err("Chunk size must be at least 1".to_string()),
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("Chunk size format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary data")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("rw_buf_size")
                .short('b')
                .long("rw-buf-size")
                .help("partition file read/write buffer size")
                .takes_value(true)
                .validator(|v| parse_buf_size(v).map(|_| ())),
        )
        .arg(
            clap::Arg::new("format")
                .short('f')
                .long("format")
                .help("partition file format")
                .takes_value(true)
                .default_value("lines")
                .possible_values(Format::possible_values()),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .get_matches()
}

fn parse_buf_size(value: &str) -> Result<usize, String> {
    let buf_size = value
        .parse::<ByteSize>()
        .map_err(|err| format!("Buffer size format incorrect: {}", err))?;

    match usize::try_from(buf_size.as_u64()) {
        Ok(0) => Err("Buffer size must be at least 1 byte".to_string()),
        Ok(buf_size) => Ok(buf_size),
        Err(_) => Err(format!("Buffer size {} is too large for this platform", buf_size)),
    }
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::parse_buf_size;

    #[rstest]
    #[case("1", Ok(1))]
    #[case("64KiB", Ok(64 * 1024))]
    #[case("0", Err(()))]
    #[case("0KiB", Err(()))]
    #[case("lots", Err(()))]
    fn test_parse_buf_size(#[case] value: &str, #[case] expected: Result<usize, ()>) {
        assert_eq!(parse_buf_size(value).map_err(|_| ()), expected);
    }
}
