pub mod inspect;
pub mod prepare;
pub mod split;
pub mod trim;

/// Size the global rayon pool, returning the number of threads used.
pub fn init_threads(num_threads: Option<usize>) -> eyre::Result<usize> {
    if let Some(n) = num_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()?;
        Ok(n)
    } else {
        Ok(num_cpus::get())
    }
}
