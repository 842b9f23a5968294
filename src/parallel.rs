//! Chunked worker-pool dispatch
//!
//! The grand-product fills operate on disjoint chunks of an evaluation
//! vector addressed by `(chunk_index, chunk_size)`; a callback can recover
//! any element's global index as `chunk_index * chunk_size + offset`.
//! Chunks are independent, so no synchronization happens within one
//! invocation; the call itself is the barrier between phases.
//!
//! With the `parallel` feature the chunks are dispatched on the rayon pool;
//! without it the same code runs as a single chunk, which is the scalar
//! fallback exercised by `--no-default-features` test runs.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Run `f(chunk, chunk_index, chunk_size)` over disjoint chunks of `v`.
///
/// The chunk size is the same for every chunk except possibly the last, so
/// `chunk_index * chunk_size` is always the global offset of `chunk[0]`.
pub fn parallelize<T, Fun>(v: &mut [T], f: Fun)
where
    T: Send,
    Fun: Fn(&mut [T], usize, usize) + Send + Sync,
{
    if v.is_empty() {
        return;
    }

    #[cfg(feature = "parallel")]
    {
        let workers = rayon::current_num_threads().max(1);
        let chunk_size = (v.len() + workers - 1) / workers;
        v.par_chunks_mut(chunk_size)
            .enumerate()
            .for_each(|(chunk_index, chunk)| f(chunk, chunk_index, chunk_size));
    }

    #[cfg(not(feature = "parallel"))]
    {
        let chunk_size = v.len();
        f(v, 0, chunk_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_indexing_covers_every_slot_once() {
        let mut v = vec![0u64; 1013]; // deliberately not a multiple of any pool size
        parallelize(&mut v, |chunk, chunk_index, chunk_size| {
            let mut i = chunk_index * chunk_size;
            for slot in chunk.iter_mut() {
                *slot += i as u64 + 1;
                i += 1;
            }
        });
        for (i, slot) in v.iter().enumerate() {
            assert_eq!(*slot, i as u64 + 1);
        }
    }

    #[test]
    fn empty_slice_is_a_no_op() {
        let mut v: Vec<u64> = Vec::new();
        parallelize(&mut v, |_, _, _| panic!("callback must not run"));
    }
}
