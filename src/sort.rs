//! External sorter.

use log;
use std::fmt;
use std::fs;
use std::io::{self, prelude::*};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::merger::BinaryHeapMerger;
use crate::partition::{LinePartition, Partition, PartitionFormat};
use crate::{ChunkBuffer, ChunkBufferBuilder, LimitedBufferBuilder};

/// Number of lines per partition used when no chunk size is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// Run directory name prefix. Every sort run gets its own uniquely named directory.
const RUN_DIR_PREFIX: &str = ".line-sort-";

/// Prefix of the file the output is written to before it is renamed over the output path.
const OUTPUT_FILE_PREFIX: &str = ".line-sort-output-";

/// Sort run phase, used to report where a storage failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Input is split into sorted partitions.
    Partition,
    /// Partitions are merged into a single sorted stream.
    Merge,
    /// Sorted stream is written to the output.
    Output,
    /// Run directory is removed.
    Cleanup,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Partition => "partition",
            Phase::Merge => "merge",
            Phase::Output => "output",
            Phase::Cleanup => "cleanup",
        })
    }
}

/// Sorting error.
#[derive(Debug, thiserror::Error)]
pub enum SortError {
    /// Chunk size must allow at least one line per partition.
    #[error("chunk size must be at least 1 line")]
    InvalidChunkSize,
    /// Read/write buffer must be able to hold at least one byte.
    #[error("read/write buffer size must be at least 1 byte")]
    InvalidBufferSize,
    /// Temporary directory creation error.
    #[error("temporary directory not created: {0}")]
    TempDir(#[source] io::Error),
    /// Input data stream error.
    #[error("input data stream error: {0}")]
    InputError(#[source] io::Error),
    /// File or directory could not be created, read, written or removed.
    #[error("{phase} phase failed: {source}")]
    Storage {
        phase: Phase,
        #[source]
        source: io::Error,
    },
}

impl SortError {
    fn storage(phase: Phase) -> impl FnOnce(io::Error) -> SortError {
        move |source| SortError::Storage { phase, source }
    }
}

/// Sort run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortStats {
    /// Number of lines written to the output.
    pub records: u64,
    /// Number of partitions the input was split into.
    pub partitions: usize,
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone)]
pub struct ExternalSorterBuilder<F = LinePartition>
where
    F: PartitionFormat,
{
    /// Maximum number of lines in a single partition.
    chunk_size: usize,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Partition file read/write buffer size.
    rw_buf_size: Option<usize>,

    /// Partition format type.
    partition_format: PhantomData<F>,
}

impl<F> ExternalSorterBuilder<F>
where
    F: PartitionFormat,
{
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter<F>, SortError> {
        ExternalSorter::new(self.chunk_size, self.tmp_dir.as_deref(), self.rw_buf_size)
    }

    /// Sets maximum number of lines in a single partition.
    /// Larger values mean fewer partitions and higher peak memory usage.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> ExternalSorterBuilder<F> {
        self.chunk_size = chunk_size;
        return self;
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder<F> {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets partition read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder<F> {
        self.rw_buf_size = Some(buf_size);
        return self;
    }
}

impl<F> Default for ExternalSorterBuilder<F>
where
    F: PartitionFormat,
{
    fn default() -> Self {
        ExternalSorterBuilder {
            chunk_size: DEFAULT_CHUNK_SIZE,
            tmp_dir: None,
            rw_buf_size: None,
            partition_format: PhantomData,
        }
    }
}

/// External sorter.
///
/// Every sort run stages its partitions in a fresh uniquely named subdirectory of the temporary directory,
/// so several runs may share the same temporary directory.
pub struct ExternalSorter<F = LinePartition>
where
    F: PartitionFormat,
{
    /// Directory run directories are created in.
    tmp_dir: PathBuf,
    /// Chunk buffer builder.
    buffer_builder: LimitedBufferBuilder,
    /// Partition file read/write buffer size.
    rw_buf_size: Option<usize>,

    /// Partition format type.
    partition_format: PhantomData<F>,
}

impl<F> ExternalSorter<F>
where
    F: PartitionFormat,
{
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `chunk_size` - Maximum number of lines in a single partition, must be positive.
    /// * `tmp_path` - Directory to be used to store temporary data. If paramater is [`None`] default OS temporary
    ///   directory will be used.
    /// * `rw_buf_size` - Partitions file read/write buffer size, must be positive if set.
    pub fn new(chunk_size: usize, tmp_path: Option<&Path>, rw_buf_size: Option<usize>) -> Result<Self, SortError> {
        if chunk_size == 0 {
            return Err(SortError::InvalidChunkSize);
        }
        if rw_buf_size == Some(0) {
            return Err(SortError::InvalidBufferSize);
        }

        let tmp_dir = match tmp_path {
            Some(tmp_path) => tmp_path.to_path_buf(),
            None => std::env::temp_dir(),
        };

        return Ok(ExternalSorter {
            tmp_dir,
            rw_buf_size,
            buffer_builder: LimitedBufferBuilder::new(chunk_size, false),
            partition_format: PhantomData,
        });
    }

    /// Returns maximum number of lines in a single partition.
    pub fn chunk_size(&self) -> usize {
        self.buffer_builder.limit()
    }

    fn init_run_directory(&self) -> Result<tempfile::TempDir, SortError> {
        fs::create_dir_all(&self.tmp_dir).map_err(SortError::TempDir)?;

        let run_dir = tempfile::Builder::new()
            .prefix(RUN_DIR_PREFIX)
            .tempdir_in(&self.tmp_dir)
            .map_err(SortError::TempDir)?;

        log::info!("using {} as a temporary directory", run_dir.path().display());

        return Ok(run_dir);
    }

    /// Sorts lines from the input.
    /// Returns an iterator that can be used to get sorted lines stream.
    /// The iterator owns the run directory, partitions are removed when it is dropped or closed.
    ///
    /// # Arguments
    /// * `input` - Input lines stream
    pub fn sort<I>(&self, input: I) -> Result<SortedLines<F>, SortError>
    where
        I: IntoIterator<Item = io::Result<String>>,
    {
        // dropping the run directory on an early return removes partitions written so far
        let run_dir = self.init_run_directory()?;
        let partitions = self.partition(run_dir.path(), input)?;
        let merger = self.merge(&partitions)?;

        return Ok(SortedLines {
            merger,
            partitions: partitions.len(),
            run_dir,
        });
    }

    /// Splits input into sorted partitions stored in `dir`.
    /// Partitions are numbered in input order starting from zero.
    ///
    /// # Arguments
    /// * `dir` - Directory partition files are created in
    /// * `input` - Input lines stream
    pub fn partition<I>(&self, dir: &Path, input: I) -> Result<Vec<Partition<F>>, SortError>
    where
        I: IntoIterator<Item = io::Result<String>>,
    {
        let mut chunk_buf = self.buffer_builder.build();
        let mut partitions = Vec::new();

        for line in input.into_iter() {
            match line {
                Ok(line) => chunk_buf.push(line),
                Err(err) => return Err(SortError::InputError(err)),
            }

            if chunk_buf.is_full() {
                partitions.push(self.create_partition(dir, partitions.len(), chunk_buf)?);
                chunk_buf = self.buffer_builder.build();
            }
        }

        if !chunk_buf.is_empty() {
            partitions.push(self.create_partition(dir, partitions.len(), chunk_buf)?);
        }

        log::debug!("external sort preparation done (partitions: {})", partitions.len());

        return Ok(partitions);
    }

    fn create_partition(
        &self,
        dir: &Path,
        index: usize,
        mut buffer: impl ChunkBuffer,
    ) -> Result<Partition<F>, SortError> {
        log::debug!("sorting chunk data (lines: {}) ...", buffer.len());
        buffer.sort();

        log::debug!("saving partition {}", index);
        let partition =
            Partition::build(dir, index, buffer, self.rw_buf_size).map_err(SortError::storage(Phase::Partition))?;

        return Ok(partition);
    }

    /// Opens a merge cursor for every partition and returns the merged sorted lines stream.
    /// Zero partitions produce an empty stream.
    ///
    /// # Arguments
    /// * `partitions` - Sorted partitions to be merged
    pub fn merge(
        &self,
        partitions: &[Partition<F>],
    ) -> Result<BinaryHeapMerger<String, io::Error, F::Reader>, SortError> {
        log::debug!("merging {} partitions", partitions.len());

        let readers = partitions
            .iter()
            .map(Partition::open)
            .collect::<io::Result<Vec<_>>>()
            .map_err(SortError::storage(Phase::Merge))?;

        return Ok(BinaryHeapMerger::new(readers));
    }

    /// Sorts lines read from `input` and writes them to `output`, each followed by a `\n`.
    /// The output is flushed before the function returns.
    pub fn sort_to_writer<R, W>(&self, input: R, output: W) -> Result<SortStats, SortError>
    where
        R: BufRead,
        W: Write,
    {
        self.sort(input.lines())?.write_to(output)
    }

    /// Sorts the `input` file into the `output` file.
    ///
    /// The result is written to a temporary file next to `output` and renamed over it only when the whole
    /// input is sorted, so `output` is either complete or left untouched.
    pub fn sort_file(&self, input: &Path, output: &Path) -> Result<SortStats, SortError> {
        let input_file = fs::File::open(input).map_err(SortError::storage(Phase::Partition))?;
        let input_stream = match self.rw_buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, input_file),
            None => io::BufReader::new(input_file),
        };

        let output_dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let output_file = create_output_file(output_dir, output).map_err(SortError::storage(Phase::Output))?;
        let mut output_stream = match self.rw_buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, output_file),
            None => io::BufWriter::new(output_file),
        };

        // an early return drops the temporary output file, which removes it
        let stats = self.sort_to_writer(input_stream, &mut output_stream)?;

        let output_file = output_stream
            .into_inner()
            .map_err(|err| SortError::storage(Phase::Output)(err.into_error()))?;
        output_file
            .persist(output)
            .map_err(|err| SortError::storage(Phase::Output)(err.error))?;

        log::info!(
            "sorted {} lines into {} using {} partitions",
            stats.records,
            output.display(),
            stats.partitions
        );

        return Ok(stats);
    }
}

/// Creates the temporary output file in `dir`.
/// It gets the permissions of the existing `output` file, or the ones a newly created file would get.
fn create_output_file(dir: &Path, output: &Path) -> io::Result<tempfile::NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(OUTPUT_FILE_PREFIX);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        // the mode is passed to open(2), so the process umask still applies
        match fs::metadata(output) {
            Ok(metadata) => builder.permissions(metadata.permissions()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                builder.permissions(fs::Permissions::from_mode(0o666))
            }
            Err(err) => return Err(err),
        };
    }
    #[cfg(not(unix))]
    let _ = output;

    builder.tempfile_in(dir)
}

/// Sorted lines stream of a single sort run.
///
/// Owns the run directory: partition files are removed when the stream is dropped,
/// whether or not it was read to the end.
pub struct SortedLines<F: PartitionFormat> {
    // declared before the run directory so partition files are closed before the directory is removed
    merger: BinaryHeapMerger<String, io::Error, F::Reader>,
    partitions: usize,
    run_dir: tempfile::TempDir,
}

impl<F: PartitionFormat> SortedLines<F> {
    /// Returns the number of partitions the input was split into.
    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Returns the run directory partitions are stored in.
    pub fn run_dir(&self) -> &Path {
        self.run_dir.path()
    }

    /// Writes the remaining sorted lines to `output`, each followed by a `\n`, and removes the run directory.
    /// The output is flushed before the function returns.
    pub fn write_to<W: Write>(mut self, mut output: W) -> Result<SortStats, SortError> {
        let mut stats = SortStats {
            records: 0,
            partitions: self.partitions,
        };

        for line in &mut self {
            let line = line.map_err(SortError::storage(Phase::Merge))?;
            output.write_all(line.as_bytes()).map_err(SortError::storage(Phase::Output))?;
            output.write_all(b"\n").map_err(SortError::storage(Phase::Output))?;
            stats.records += 1;
        }
        output.flush().map_err(SortError::storage(Phase::Output))?;

        self.close().map_err(SortError::storage(Phase::Cleanup))?;

        return Ok(stats);
    }

    /// Closes partition files and removes the run directory.
    pub fn close(self) -> io::Result<()> {
        let SortedLines { merger, run_dir, .. } = self;
        drop(merger);

        let path = run_dir.path().to_path_buf();
        run_dir.close().map_err(|err| {
            log::warn!("temporary directory {} not removed: {}", path.display(), err);
            err
        })
    }
}

impl<F: PartitionFormat> Iterator for SortedLines<F> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.merger.next()
    }
}
