use std::future::Future;

/// Exit status for a run stopped by Ctrl+C.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Run `task` until it completes or Ctrl+C is pressed.
///
/// Collection files are replaced atomically and the checkpoint only moves
/// after a whole window, so stopping mid-window loses at most that window.
pub(crate) async fn run_until_interrupted<F>(task: F) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    tokio::select! {
        result = task => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::warn!("Shutdown requested, exiting");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    }
}
