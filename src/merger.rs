//! Binary heap merger.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::error::Error;
use std::mem;

/// Read position in one of the merged inputs.
/// Holds the next unread item of the input together with the rest of the input stream.
struct MergeCursor<T, I> {
    head: T,
    index: usize,
    rest: I,
}

impl<T: Ord, I> PartialEq for MergeCursor<T, I> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Ord, I> Eq for MergeCursor<T, I> {}

impl<T: Ord, I> PartialOrd for MergeCursor<T, I> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord, I> Ord for MergeCursor<T, I> {
    // binary heap is max-heap by default so the order is reversed to convert it to min-heap.
    // equal heads are taken from the lowest input index first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.head.cmp(&self.head).then(other.index.cmp(&self.index))
    }
}

/// Binary heap merger implementation.
/// Merges multiple sorted inputs into a single sorted output.
/// Only one item per input is held in memory at a time.
/// Time complexity is *m* \* log(*n*) in worst case where *m* is the number of items,
/// *n* is the number of chunks (inputs).
pub struct BinaryHeapMerger<T, E, C>
where
    T: Ord,
    E: Error,
    C: IntoIterator<Item = Result<T, E>>,
{
    cursors: BinaryHeap<MergeCursor<T, C::IntoIter>>,
    pending: Vec<C::IntoIter>,
    error: Option<E>,
    done: bool,
}

impl<T, E, C> BinaryHeapMerger<T, E, C>
where
    T: Ord,
    E: Error,
    C: IntoIterator<Item = Result<T, E>>,
{
    /// Creates an instance of a binary heap merger using chunks as inputs.
    /// Chunk items should be sorted in ascending order otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `chunks` - Chunks to be merged in a single sorted one
    pub fn new<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
    {
        let pending = Vec::from_iter(chunks.into_iter().map(|c| c.into_iter()));
        let cursors = BinaryHeap::with_capacity(pending.len());

        return BinaryHeapMerger {
            cursors,
            pending,
            error: None,
            done: false,
        };
    }

    /// Reads the first item of every input. Inputs are consumed in index order.
    fn init(&mut self) -> Result<(), E> {
        for (index, mut rest) in mem::take(&mut self.pending).into_iter().enumerate() {
            if let Some(item) = rest.next() {
                self.cursors.push(MergeCursor { head: item?, index, rest });
            }
        }

        return Ok(());
    }

    /// Pops the smallest head and moves its cursor forward.
    /// A read error is kept aside and reported by the following call.
    fn advance(&mut self) -> Option<Result<T, E>> {
        let mut cursor = self.cursors.pop()?;

        let result = match cursor.rest.next() {
            Some(Ok(item)) => {
                let result = mem::replace(&mut cursor.head, item);
                self.cursors.push(cursor);
                result
            }
            Some(Err(err)) => {
                self.error = Some(err);
                cursor.head
            }
            None => cursor.head,
        };

        return Some(Ok(result));
    }
}

impl<T, E, C> Iterator for BinaryHeapMerger<T, E, C>
where
    T: Ord,
    E: Error,
    C: IntoIterator<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    /// Returns the next item from the inputs in ascending order.
    /// The first input error is returned once, after that the merger is exhausted.
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(err) = self.error.take() {
            self.done = true;
            self.cursors.clear();
            return Some(Err(err));
        }

        if !self.pending.is_empty() {
            if let Err(err) = self.init() {
                self.done = true;
                return Some(Err(err));
            }
        }

        let result = self.advance();
        if result.is_none() {
            self.done = true;
        }

        return result;
    }
}

#[cfg(test)]
mod test {
    use rstest::*;
    use std::error::Error;
    use std::io::{self, ErrorKind};

    use super::BinaryHeapMerger;

    #[rstest]
    #[case(
        vec![],
        vec![],
    )]
    #[case(
        vec![
            vec![],
            vec![]
        ],
        vec![],
    )]
    #[case(
        vec![
            vec![Ok(4), Ok(5), Ok(7)],
            vec![Ok(1), Ok(6)],
            vec![Ok(3)],
            vec![],
        ],
        vec![Ok(1), Ok(3), Ok(4), Ok(5), Ok(6), Ok(7)],
    )]
    #[case(
        vec![
            vec![Result::Err(io::Error::new(ErrorKind::Other, "test error"))]
        ],
        vec![
            Result::Err(io::Error::new(ErrorKind::Other, "test error"))
        ],
    )]
    #[case(
        vec![
            vec![Ok(3), Result::Err(io::Error::new(ErrorKind::Other, "test error"))],
            vec![Ok(1), Ok(2)],
        ],
        vec![
            Ok(1),
            Ok(2),
            Ok(3),
            Result::Err(io::Error::new(ErrorKind::Other, "test error")),
        ],
    )]
    fn test_merger(
        #[case] chunks: Vec<Vec<Result<i32, io::Error>>>,
        #[case] expected_result: Vec<Result<i32, io::Error>>,
    ) {
        let merger = BinaryHeapMerger::new(chunks);
        let actual_result = merger.collect();
        assert!(
            compare_vectors_of_result::<_, io::Error>(&actual_result, &expected_result),
            "actual={:?}, expected={:?}",
            actual_result,
            expected_result
        );
    }

    #[rstest]
    #[case(
        vec![
            vec!["apple", "apple", "banana"],
            vec!["apple", "banana", "banana"],
        ],
        vec!["apple", "apple", "apple", "banana", "banana", "banana"],
    )]
    #[case(
        vec![
            vec!["", "b"],
            vec!["", "a"],
            vec![],
        ],
        vec!["", "", "a", "b"],
    )]
    #[case(
        vec![
            vec!["B", "a"],
            vec!["b", "äpple"],
        ],
        vec!["B", "a", "b", "äpple"],
    )]
    fn test_merger_lines(#[case] chunks: Vec<Vec<&str>>, #[case] expected_result: Vec<&str>) {
        let chunks = chunks.into_iter().map(|chunk| {
            Vec::from_iter(chunk.into_iter().map(|line| Ok::<_, io::Error>(line.to_string())))
        });

        let actual_result: Vec<String> = BinaryHeapMerger::new(chunks).map(Result::unwrap).collect();
        assert_eq!(actual_result, expected_result);
    }

    #[test]
    fn test_merger_stops_after_error() {
        let chunks: Vec<Vec<Result<i32, io::Error>>> = vec![
            vec![Ok(1), Err(io::Error::new(ErrorKind::Other, "broken chunk")), Ok(5)],
            vec![Ok(2), Ok(3), Ok(4)],
        ];

        let mut merger = BinaryHeapMerger::new(chunks);
        assert_eq!(merger.next().unwrap().unwrap(), 1);
        assert_eq!(merger.next().unwrap().unwrap_err().to_string(), "broken chunk");
        assert!(merger.next().is_none());
        assert!(merger.next().is_none());
    }

    #[test]
    fn test_merger_takes_equal_items_from_lowest_chunk_first() {
        // items compare equal by the first field only, the second one marks the source chunk
        #[derive(Debug, PartialEq, Eq)]
        struct Tagged(&'static str, usize);

        impl PartialOrd for Tagged {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for Tagged {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                self.0.cmp(other.0)
            }
        }

        let chunks: Vec<Vec<Result<Tagged, io::Error>>> = vec![
            vec![Ok(Tagged("apple", 0)), Ok(Tagged("cherry", 0))],
            vec![Ok(Tagged("apple", 1)), Ok(Tagged("banana", 1))],
            vec![Ok(Tagged("apple", 2))],
        ];

        let actual_result: Vec<Tagged> = BinaryHeapMerger::new(chunks).map(Result::unwrap).collect();
        assert_eq!(
            actual_result,
            vec![
                Tagged("apple", 0),
                Tagged("apple", 1),
                Tagged("apple", 2),
                Tagged("banana", 1),
                Tagged("cherry", 0),
            ]
        );
    }

    fn compare_vectors_of_result<T: PartialEq, E: Error + 'static>(
        actual: &Vec<Result<T, E>>,
        expected: &Vec<Result<T, E>>,
    ) -> bool {
        actual.len() == expected.len()
            && actual
                .into_iter()
                .zip(expected)
                .all(
                    |(actual_result, expected_result)| match (actual_result, expected_result) {
                        (Ok(actual_result), Ok(expected_result)) if actual_result == expected_result => true,
                        (Err(actual_err), Err(expected_err)) => actual_err.to_string() == expected_err.to_string(),
                        _ => false,
                    },
                )
    }
}
