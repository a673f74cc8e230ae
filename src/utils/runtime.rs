use anyhow::Result;

/// The timer only ever needs one thread: a tick, a command channel and a signal listener.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
