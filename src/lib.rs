//! `line-sort` is a bounded-memory external sort for line-oriented text files.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data. External sorting
//! is required when the data being sorted do not fit into the main memory (RAM) of a computer and instead must be
//! resided in slower external memory, usually a hard disk drive. Sorting is achieved in two passes. During the
//! first pass it sorts chunks of lines that each fit in RAM and stores them as partitions, during the second pass
//! it merges the sorted partitions together. For more information see
//! [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! * **Bounded memory:**
//!   at most `chunk_size` lines are held in memory while partitioning, and only one line per partition
//!   while merging.
//! * **Bytewise ordering:**
//!   lines are ordered by bytewise lexicographic comparison, duplicates are preserved.
//! * **Scoped temporary storage:**
//!   every run stages its partitions in its own uniquely named directory which is removed on every exit path,
//!   so concurrent runs can share the same temporary directory.
//! * **Complete output or none:**
//!   [`ExternalSorter::sort_file`] renames the result over the output file only after the whole input is sorted.
//! * **Pluggable partition format:**
//!   partitions are plain text files by default, [`RmpPartition`] stores them in `MessagePack` instead.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use line_sort::{ExternalSorter, ExternalSorterBuilder};
//!
//! fn main() {
//!     let sorter: ExternalSorter = ExternalSorterBuilder::new()
//!         .with_chunk_size(100_000)
//!         .with_tmp_dir(Path::new("./"))
//!         .build()
//!         .unwrap();
//!
//!     let stats = sorter
//!         .sort_file(Path::new("input.txt"), Path::new("sorted_output.txt"))
//!         .unwrap();
//!
//!     println!("{} lines sorted into {} partitions", stats.records, stats.partitions);
//! }
//! ```
//!
//! # Usage constraints
//!
//! A run that is killed mid-way leaves its run directory (prefixed with `.line-sort-`) behind,
//! it has to be removed manually.

pub mod buffer;
pub mod merger;
pub mod partition;
pub mod sort;

pub use buffer::{ChunkBuffer, ChunkBufferBuilder, LimitedBuffer, LimitedBufferBuilder};
pub use merger::BinaryHeapMerger;
pub use partition::{LinePartition, Partition, PartitionFormat, RmpPartition};
pub use sort::{ExternalSorter, ExternalSorterBuilder, Phase, SortError, SortStats, SortedLines, DEFAULT_CHUNK_SIZE};
