//! Sorted partitions stored on the file system.

use std::fs;
use std::io;
use std::io::prelude::*;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Partition storage format. Defines how sorted lines are written to a partition file and read back from it.
pub trait PartitionFormat {
    /// Partition file extension.
    const EXTENSION: &'static str;

    /// Partition line stream.
    type Reader: Iterator<Item = io::Result<String>>;

    /// Dumps lines to a partition file.
    fn dump(writer: &mut io::BufWriter<fs::File>, lines: impl IntoIterator<Item = String>) -> io::Result<()>;

    /// Creates a line stream reading a partition file from the beginning.
    fn reader(reader: io::Take<io::BufReader<fs::File>>) -> Self::Reader;
}

/// Plain text partition format. Every line is followed by a `\n` terminator.
#[derive(Debug, Clone, Copy)]
pub struct LinePartition;

impl PartitionFormat for LinePartition {
    const EXTENSION: &'static str = "txt";

    type Reader = LineReader;

    fn dump(writer: &mut io::BufWriter<fs::File>, lines: impl IntoIterator<Item = String>) -> io::Result<()> {
        for line in lines.into_iter() {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }

        return Ok(());
    }

    fn reader(reader: io::Take<io::BufReader<fs::File>>) -> Self::Reader {
        LineReader { reader }
    }
}

/// Plain text partition line stream.
/// Only the `\n` terminator is stripped, so a line ending with `\r` is read back unchanged.
pub struct LineReader {
    reader: io::Take<io::BufReader<fs::File>>,
}

impl Iterator for LineReader {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                if line.ends_with('\n') {
                    line.pop();
                }
                Some(Ok(line))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

/// RMP (Rust MessagePack) partition format.
/// Every line is stored as a MessagePack string.
/// For more information see https://msgpack.org/.
#[derive(Debug, Clone, Copy)]
pub struct RmpPartition;

impl PartitionFormat for RmpPartition {
    const EXTENSION: &'static str = "rmp";

    type Reader = RmpReader;

    fn dump(writer: &mut io::BufWriter<fs::File>, lines: impl IntoIterator<Item = String>) -> io::Result<()> {
        for line in lines.into_iter() {
            rmp_serde::encode::write(writer, &line)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        }

        return Ok(());
    }

    fn reader(reader: io::Take<io::BufReader<fs::File>>) -> Self::Reader {
        RmpReader { reader }
    }
}

/// MessagePack partition line stream.
pub struct RmpReader {
    reader: io::Take<io::BufReader<fs::File>>,
}

impl Iterator for RmpReader {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reader.limit() == 0 {
            None
        } else {
            match rmp_serde::decode::from_read(&mut self.reader) {
                Ok(line) => Some(Ok(line)),
                Err(err) => Some(Err(io::Error::new(io::ErrorKind::InvalidData, err))),
            }
        }
    }
}

/// Partition handle: a sorted, read-only sequence of lines stored in a run directory.
/// The file itself is removed together with the run directory that owns it.
#[derive(Debug)]
pub struct Partition<F: PartitionFormat> {
    index: usize,
    path: PathBuf,
    len: usize,
    buf_size: Option<usize>,

    format: PhantomData<F>,
}

impl<F: PartitionFormat> Partition<F> {
    /// Writes lines to a new partition file inside `dir`.
    /// Lines must already be sorted; the order is preserved as is.
    ///
    /// # Arguments
    /// * `dir` - Run directory the partition file is created in
    /// * `index` - Partition ordinal, used to name the file
    /// * `lines` - Sorted lines to be stored
    /// * `buf_size` - Partition file read/write buffer size
    pub fn build(
        dir: &Path,
        index: usize,
        lines: impl IntoIterator<Item = String>,
        buf_size: Option<usize>,
    ) -> io::Result<Self> {
        let path = dir.join(format!("partition_{:06}.{}", index, F::EXTENSION));
        let file = fs::OpenOptions::new().write(true).create_new(true).open(&path)?;

        let mut writer = match buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, file),
            None => io::BufWriter::new(file),
        };

        let mut len = 0;
        F::dump(&mut writer, lines.into_iter().inspect(|_| len += 1))?;
        writer.flush()?;

        return Ok(Partition {
            index,
            path,
            len,
            buf_size,
            format: PhantomData,
        });
    }

    /// Opens a new line stream positioned at the first line of the partition.
    pub fn open(&self) -> io::Result<F::Reader> {
        let file = fs::File::open(&self.path)?;
        let file_len = file.metadata()?.len();

        let reader = match self.buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        };

        return Ok(F::reader(reader.take(file_len)));
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of lines stored in the partition.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod test {
    use std::io;

    use rstest::*;

    use super::{LinePartition, Partition, PartitionFormat, RmpPartition};

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    fn round_trip<F: PartitionFormat>(tmp_dir: &tempfile::TempDir, saved: Vec<String>) -> Vec<String> {
        let partition: Partition<F> = Partition::build(tmp_dir.path(), 3, saved.clone(), None).unwrap();
        assert_eq!(partition.len(), saved.len());
        assert_eq!(partition.index(), 3);

        let restored: io::Result<Vec<String>> = partition.open().unwrap().collect();
        restored.unwrap()
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec!["apple", "banana", "cherry"])]
    #[case(vec!["", "", "apple"])]
    #[case(vec![""])]
    #[case(vec!["apple\r", "apple "])]
    fn test_line_partition(tmp_dir: tempfile::TempDir, #[case] saved: Vec<&str>) {
        let saved = lines(&saved);
        assert_eq!(round_trip::<LinePartition>(&tmp_dir, saved.clone()), saved);
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec!["apple", "banana", "cherry"])]
    #[case(vec!["", "", "apple"])]
    fn test_rmp_partition(tmp_dir: tempfile::TempDir, #[case] saved: Vec<&str>) {
        let saved = lines(&saved);
        assert_eq!(round_trip::<RmpPartition>(&tmp_dir, saved.clone()), saved);
    }

    #[rstest]
    fn test_partition_file_layout(tmp_dir: tempfile::TempDir) {
        let partition: Partition<LinePartition> =
            Partition::build(tmp_dir.path(), 7, lines(&["a", "b"]), Some(16)).unwrap();

        assert_eq!(partition.path(), tmp_dir.path().join("partition_000007.txt"));
        assert_eq!(std::fs::read_to_string(partition.path()).unwrap(), "a\nb\n");
    }

    #[rstest]
    fn test_partition_never_overwrites(tmp_dir: tempfile::TempDir) {
        let _first: Partition<LinePartition> = Partition::build(tmp_dir.path(), 0, lines(&["a"]), None).unwrap();
        let second: io::Result<Partition<LinePartition>> = Partition::build(tmp_dir.path(), 0, lines(&["b"]), None);

        assert_eq!(second.unwrap_err().kind(), io::ErrorKind::AlreadyExists);
    }

    #[rstest]
    fn test_partition_open_is_restartable(tmp_dir: tempfile::TempDir) {
        let partition: Partition<RmpPartition> = Partition::build(tmp_dir.path(), 0, lines(&["x", "y"]), None).unwrap();

        let first: Vec<String> = partition.open().unwrap().map(Result::unwrap).collect();
        let second: Vec<String> = partition.open().unwrap().map(Result::unwrap).collect();
        assert_eq!(first, second);
    }
}
