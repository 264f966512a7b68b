//! Row-parallel evaluation of table texels on scoped worker threads.

use crate::lut::Texel;

/// Number of worker threads used to fill a table.
pub fn worker_count() -> usize {
    num_cpus::get().max(1)
}

/// Split `texels` into rows of `row_len` and hand each row to `fill` on one
/// of up to [`worker_count`] scoped threads.
///
/// Rows are independent, so the result does not depend on the thread count.
pub(crate) fn for_each_row<F>(texels: &mut [Texel], row_len: usize, fill: F)
where
    F: Fn(usize, &mut [Texel]) + Sync,
{
    if row_len == 0 || texels.is_empty() {
        return;
    }
    let rows = texels.len() / row_len;
    let workers = worker_count().min(rows).max(1);
    if workers == 1 {
        for (y, row) in texels.chunks_mut(row_len).enumerate() {
            fill(y, row);
        }
        return;
    }

    let rows_per_worker = rows.div_ceil(workers);
    let fill = &fill;
    std::thread::scope(|scope| {
        for (chunk_index, chunk) in texels.chunks_mut(rows_per_worker * row_len).enumerate() {
            std::thread::Builder::new()
                .name("lut-worker".into())
                .spawn_scoped(scope, move || {
                    let first_row = chunk_index * rows_per_worker;
                    for (offset, row) in chunk.chunks_mut(row_len).enumerate() {
                        fill(first_row + offset, row);
                    }
                })
                .expect("failed to spawn LUT worker thread");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_row_visited_once() {
        let row_len = 7;
        let rows = 53;
        let mut texels = vec![[0.0_f32; 4]; row_len * rows];
        for_each_row(&mut texels, row_len, |y, row| {
            for (x, texel) in row.iter_mut().enumerate() {
                texel[0] += y as f32;
                texel[1] += x as f32;
                texel[2] += 1.0;
            }
        });
        for (i, texel) in texels.iter().enumerate() {
            assert_eq!(texel[0], (i / row_len) as f32);
            assert_eq!(texel[1], (i % row_len) as f32);
            assert_eq!(texel[2], 1.0, "texel {i} written more than once");
        }
    }

    #[test]
    fn test_empty_input_is_noop() {
        let mut texels: Vec<Texel> = Vec::new();
        for_each_row(&mut texels, 4, |_, _| panic!("no rows to fill"));
        let mut texels = vec![[0.0; 4]; 4];
        for_each_row(&mut texels, 0, |_, _| panic!("zero-length rows"));
    }

    #[test]
    fn test_worker_count_positive() {
        assert!(worker_count() >= 1);
    }
}
